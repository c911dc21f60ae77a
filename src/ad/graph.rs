// src/ad/graph.rs

use std::cell::RefCell;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    BetaSample,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Neg,
    Exp,
    Log,
    Sigmoid,
    LGamma,
}

#[derive(Debug, Clone)]
pub enum ADNode {
    Input { value: f64 },
    Constant { value: f64 },
    Binary {
        op: BinaryOp,
        lhs: usize,
        rhs: usize,
        value: f64,
    },
    Unary {
        op: UnaryOp,
        arg: usize,
        value: f64,
    },
}

impl ADNode {
    pub fn value(&self) -> f64 {
        match self {
            ADNode::Input { value }
            | ADNode::Constant { value }
            | ADNode::Binary { value, .. }
            | ADNode::Unary { value, .. } => *value,
        }
    }
}

#[derive(Debug, Default)]
pub struct Tape {
    pub nodes: RefCell<Vec<ADNode>>,
}

impl Tape {
    pub fn new() -> Self {
        Self {
            nodes: RefCell::new(Vec::new()),
        }
    }

    pub fn push(&self, node: ADNode) -> usize {
        let mut nodes = self.nodes.borrow_mut();
        let id = nodes.len();
        nodes.push(node);
        id
    }
}
