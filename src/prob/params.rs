// src/prob/params.rs

use crate::ad::types::ADFloat;
use crate::prob::{ProbError, ProbResult};
use ndarray::ArrayD;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// A named array of trainable values together with its accumulated gradient.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub data: ArrayD<f64>,
    pub grad: ArrayD<f64>,
}

impl Parameter {
    pub fn new(data: ArrayD<f64>) -> Self {
        let grad = ArrayD::zeros(data.raw_dim());
        Self { data, grad }
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn zero_grad(&mut self) {
        self.grad.fill(0.0);
    }
}

#[derive(Debug)]
struct Binding {
    tape_id: usize,
    leaves: Vec<ADFloat>,
}

/// Parameters outlive individual steps; bindings to a tape do not.
#[derive(Debug, Default)]
pub struct ParamStore {
    params: BTreeMap<String, Parameter>,
    bindings: HashMap<String, Binding>,
}

impl ParamStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the stored parameter, creating it from `init` on first use.
    /// An existing parameter keeps its value; only the shape is checked.
    pub fn get_or_init(&mut self, name: &str, init: ArrayD<f64>) -> ProbResult<&Parameter> {
        if let Some(existing) = self.params.get(name) {
            if existing.shape() != init.shape() {
                return Err(ProbError::ShapeMismatch {
                    name: name.to_string(),
                    expected: existing.shape().to_vec(),
                    found: init.shape().to_vec(),
                });
            }
        } else {
            self.params.insert(name.to_string(), Parameter::new(init));
        }
        self.get_checked(name)
    }

    pub fn insert(&mut self, name: &str, data: ArrayD<f64>) {
        self.bindings.remove(name);
        self.params.insert(name.to_string(), Parameter::new(data));
    }

    /// Binds every element of `name` as an autodiff input on `tape_id`.
    /// Repeated calls on the same tape return the same leaves.
    pub fn bind(&mut self, name: &str, tape_id: usize) -> ProbResult<Vec<ADFloat>> {
        if let Some(binding) = self.bindings.get(name) {
            if binding.tape_id == tape_id {
                return Ok(binding.leaves.clone());
            }
        }
        let param = self.get_checked(name)?;
        let leaves: Vec<ADFloat> = param
            .data
            .iter()
            .map(|v| ADFloat::new_input(*v, tape_id))
            .collect();
        self.bindings.insert(
            name.to_string(),
            Binding {
                tape_id,
                leaves: leaves.clone(),
            },
        );
        Ok(leaves)
    }

    /// Adds the gradients found in `grads` (node id -> derivative) onto the
    /// bound leaves of each named parameter.
    pub fn accumulate_grads(
        &mut self,
        names: &BTreeSet<String>,
        grads: &HashMap<usize, f64>,
    ) -> ProbResult<()> {
        for name in names {
            let Some(binding) = self.bindings.get(name) else {
                continue;
            };
            let param = self
                .params
                .get_mut(name)
                .ok_or_else(|| ProbError::ParamNotFound { name: name.clone() })?;
            for (g, leaf) in param.grad.iter_mut().zip(binding.leaves.iter()) {
                if let Some(d) = leaf.node_id().and_then(|id| grads.get(&id)) {
                    *g += d;
                }
            }
        }
        Ok(())
    }

    pub fn zero_grads<'a>(&mut self, names: impl IntoIterator<Item = &'a String>) {
        for name in names {
            if let Some(param) = self.params.get_mut(name) {
                param.zero_grad();
            }
        }
    }

    pub fn release_bindings(&mut self) {
        self.bindings.clear();
    }

    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.params.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Parameter> {
        self.params.get_mut(name)
    }

    fn get_checked(&self, name: &str) -> ProbResult<&Parameter> {
        self.params.get(name).ok_or_else(|| ProbError::ParamNotFound {
            name: name.to_string(),
        })
    }

    /// First element of the parameter; the whole value for scalars.
    pub fn scalar(&self, name: &str) -> ProbResult<f64> {
        let param = self.get_checked(name)?;
        param
            .data
            .iter()
            .next()
            .copied()
            .ok_or_else(|| ProbError::ShapeMismatch {
                name: name.to_string(),
                expected: vec![],
                found: param.shape().to_vec(),
            })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.params.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Parameter)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}
