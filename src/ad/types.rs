// src/ad/types.rs

use std::collections::HashMap;
use std::ops::{Add, Div, Mul, Neg, Sub};

use crate::ad::graph::{ADNode, BinaryOp, Tape, UnaryOp};
use crate::ad::with_tape;

#[derive(Debug, Clone, Copy)]
pub enum ADFloat {
    Concrete(f64),

    Dual {
        value: f64,
        tape_id: usize,
        node_id: usize,
    },
}

impl ADFloat {
    pub fn value(&self) -> f64 {
        match self {
            ADFloat::Concrete(v) => *v,
            ADFloat::Dual { value, .. } => *value,
        }
    }

    pub fn new_input(value: f64, tape_id: usize) -> Self {
        let node_id = with_tape(tape_id, |tape| tape.push(ADNode::Input { value }));
        ADFloat::Dual {
            value,
            tape_id,
            node_id,
        }
    }

    pub fn node_id(&self) -> Option<usize> {
        match self {
            ADFloat::Dual { node_id, .. } => Some(*node_id),
            ADFloat::Concrete(_) => None,
        }
    }

    pub fn tape_id(&self) -> Option<usize> {
        match self {
            ADFloat::Dual { tape_id, .. } => Some(*tape_id),
            ADFloat::Concrete(_) => None,
        }
    }

    pub fn is_dual(&self) -> bool {
        matches!(self, ADFloat::Dual { .. })
    }

    /// Cuts the value out of the graph: gradients do not flow through the
    /// result.
    pub fn detach(&self) -> Self {
        ADFloat::Concrete(self.value())
    }

    /// Node id of `self` on `tape`, pushing a constant when it has none.
    fn node_on(self, tape: &Tape) -> usize {
        match self {
            ADFloat::Dual { node_id, .. } => node_id,
            ADFloat::Concrete(value) => tape.push(ADNode::Constant { value }),
        }
    }

    fn unary_op(self, op: UnaryOp, f: fn(f64) -> f64) -> Self {
        let value = f(self.value());
        let ADFloat::Dual {
            tape_id, node_id, ..
        } = self
        else {
            return ADFloat::Concrete(value);
        };
        let node_id = with_tape(tape_id, |tape| {
            tape.push(ADNode::Unary {
                op,
                arg: node_id,
                value,
            })
        });
        ADFloat::Dual {
            value,
            tape_id,
            node_id,
        }
    }

    pub fn exp(self) -> Self {
        self.unary_op(UnaryOp::Exp, f64::exp)
    }

    pub fn ln(self) -> Self {
        self.unary_op(UnaryOp::Log, f64::ln)
    }

    pub fn sigmoid(self) -> Self {
        self.unary_op(UnaryOp::Sigmoid, |x| 1.0 / (1.0 + (-x).exp()))
    }

    pub fn lgamma(self) -> Self {
        use statrs::function::gamma::ln_gamma;
        self.unary_op(UnaryOp::LGamma, ln_gamma)
    }

    /// Records a Beta draw `z` as a differentiable function of `(self, rhs)`
    /// = `(alpha, beta)`.
    pub fn beta_sample(self, rhs: Self, z: f64) -> Self {
        record_binary(BinaryOp::BetaSample, self, rhs, z)
    }

    pub fn backward(&self) -> HashMap<usize, f64> {
        match self {
            ADFloat::Concrete(_) => HashMap::new(),
            ADFloat::Dual {
                node_id, tape_id, ..
            } => with_tape(*tape_id, |tape| crate::ad::backward::backward(tape, *node_id)),
        }
    }
}

impl PartialEq for ADFloat {
    fn eq(&self, other: &Self) -> bool {
        self.value() == other.value()
    }
}

impl From<f64> for ADFloat {
    fn from(v: f64) -> Self {
        ADFloat::Concrete(v)
    }
}

/// Pushes `op(lhs, rhs) = value` onto the tape shared by the operands.
/// Two concrete operands stay off the tape.
fn record_binary(op: BinaryOp, lhs: ADFloat, rhs: ADFloat, value: f64) -> ADFloat {
    let tape_id = match (lhs.tape_id(), rhs.tape_id()) {
        (None, None) => return ADFloat::Concrete(value),
        (Some(a), Some(b)) if a != b => {
            panic!("ADFloat: {:?} across different tapes is unsupported", op)
        }
        (Some(t), _) | (None, Some(t)) => t,
    };
    let node_id = with_tape(tape_id, |tape| {
        let lhs = lhs.node_on(tape);
        let rhs = rhs.node_on(tape);
        tape.push(ADNode::Binary {
            op,
            lhs,
            rhs,
            value,
        })
    });
    ADFloat::Dual {
        value,
        tape_id,
        node_id,
    }
}

macro_rules! arith_op {
    ($trait:ident, $method:ident, $op:expr, $f:expr) => {
        impl $trait for ADFloat {
            type Output = ADFloat;

            fn $method(self, rhs: ADFloat) -> ADFloat {
                let f: fn(f64, f64) -> f64 = $f;
                record_binary($op, self, rhs, f(self.value(), rhs.value()))
            }
        }

        impl $trait<f64> for ADFloat {
            type Output = ADFloat;

            fn $method(self, rhs: f64) -> ADFloat {
                <ADFloat as $trait>::$method(self, ADFloat::Concrete(rhs))
            }
        }

        impl $trait<ADFloat> for f64 {
            type Output = ADFloat;

            fn $method(self, rhs: ADFloat) -> ADFloat {
                <ADFloat as $trait>::$method(ADFloat::Concrete(self), rhs)
            }
        }
    };
}

arith_op!(Add, add, BinaryOp::Add, |a, b| a + b);
arith_op!(Sub, sub, BinaryOp::Sub, |a, b| a - b);
arith_op!(Mul, mul, BinaryOp::Mul, |a, b| a * b);
arith_op!(Div, div, BinaryOp::Div, |a, b| a / b);

impl Neg for ADFloat {
    type Output = ADFloat;

    fn neg(self) -> ADFloat {
        self.unary_op(UnaryOp::Neg, |x| -x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ad::create_tape;

    fn approx_eq(a: f64, b: f64, eps: f64) -> bool {
        (a - b).abs() < eps
    }

    #[test]
    fn test_concrete_arithmetic() {
        let a = ADFloat::Concrete(3.0);
        let b = ADFloat::Concrete(2.0);

        assert!(approx_eq((a + b).value(), 5.0, 1e-10));
        assert!(approx_eq((a - b).value(), 1.0, 1e-10));
        assert!(approx_eq((a * b).value(), 6.0, 1e-10));
        assert!(approx_eq((a / b).value(), 1.5, 1e-10));
        assert!(approx_eq((-a).value(), -3.0, 1e-10));
        assert!(!(2.0 * a + 1.0).is_dual());
        assert!(approx_eq((1.0 - a / 2.0).value(), -0.5, 1e-10));
    }

    #[test]
    fn test_mixed_operands_push_constants() {
        // f(x) = (2 - x) / 4, df/dx = -1/4
        let tape_id = create_tape();
        let x = ADFloat::new_input(1.0, tape_id);
        let z = (2.0 - x) / 4.0;

        assert!(approx_eq(z.value(), 0.25, 1e-12));
        assert_eq!(z.tape_id(), Some(tape_id));
        assert!(approx_eq(z.backward()[&x.node_id().unwrap()], -0.25, 1e-12));
    }

    #[test]
    fn test_gradient_mul() {
        // f(x, y) = x * y, df/dx = y, df/dy = x
        let tape_id = create_tape();
        let x = ADFloat::new_input(3.0, tape_id);
        let y = ADFloat::new_input(4.0, tape_id);
        let z = x * y;

        assert!(approx_eq(z.value(), 12.0, 1e-10));

        let grads = z.backward();
        let dx = grads[&x.node_id().unwrap()];
        let dy = grads[&y.node_id().unwrap()];

        assert!(approx_eq(dx, 4.0, 1e-10));
        assert!(approx_eq(dy, 3.0, 1e-10));
    }

    #[test]
    fn test_gradient_div() {
        // f(x, y) = x / y, df/dx = 1/y, df/dy = -x/y^2
        let tape_id = create_tape();
        let x = ADFloat::new_input(6.0, tape_id);
        let y = ADFloat::new_input(2.0, tape_id);
        let z = x / y;

        let grads = z.backward();
        assert!(approx_eq(grads[&x.node_id().unwrap()], 0.5, 1e-10));
        assert!(approx_eq(grads[&y.node_id().unwrap()], -1.5, 1e-10));
    }

    #[test]
    fn test_gradient_exp_ln() {
        // f(x) = ln(exp(x) + 1), df/dx = sigmoid(x)
        let tape_id = create_tape();
        let x = ADFloat::new_input(0.7, tape_id);
        let z = (x.exp() + 1.0).ln();

        let grads = z.backward();
        let expected = 1.0 / (1.0 + (-0.7_f64).exp());
        assert!(approx_eq(grads[&x.node_id().unwrap()], expected, 1e-10));
    }

    #[test]
    fn test_gradient_sigmoid() {
        let tape_id = create_tape();
        let x = ADFloat::new_input(1.0, tape_id);
        let sig_val = 1.0 / (1.0 + (-1.0_f64).exp());

        let grads = x.sigmoid().backward();
        assert!(approx_eq(
            grads[&x.node_id().unwrap()],
            sig_val * (1.0 - sig_val),
            1e-10
        ));
    }

    #[test]
    fn test_detach_blocks_gradient() {
        // f(x) = detach(x) * x, df/dx = x (not 2x)
        let tape_id = create_tape();
        let x = ADFloat::new_input(3.0, tape_id);
        let z = x.detach() * x;

        assert!(!x.detach().is_dual());
        let grads = z.backward();
        assert!(approx_eq(grads[&x.node_id().unwrap()], 3.0, 1e-10));
    }

    #[test]
    fn test_fold_of_duals() {
        let tape_id = create_tape();
        let xs: Vec<ADFloat> = (1..=3).map(|i| ADFloat::new_input(i as f64, tape_id)).collect();
        let total = xs
            .iter()
            .fold(ADFloat::Concrete(0.0), |acc, x| acc + *x * *x);

        assert!(approx_eq(total.value(), 14.0, 1e-10));
        let grads = total.backward();
        for x in &xs {
            assert!(approx_eq(grads[&x.node_id().unwrap()], 2.0 * x.value(), 1e-10));
        }
    }
}
