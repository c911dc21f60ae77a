// src/infer/optim.rs

use crate::prob::ParamStore;
use ndarray::{ArrayD, Zip};
use std::collections::{BTreeSet, HashMap};

/// Applies one update to the named parameters using their accumulated
/// gradients. Updates descend the loss.
pub trait OptimStep {
    fn step(&mut self, store: &mut ParamStore, params: &BTreeSet<String>);
}

impl<F> OptimStep for F
where
    F: FnMut(&mut ParamStore, &BTreeSet<String>),
{
    fn step(&mut self, store: &mut ParamStore, params: &BTreeSet<String>) {
        self(store, params)
    }
}

#[derive(Debug, Clone)]
pub struct Sgd {
    pub lr: f64,
}

impl Sgd {
    pub fn new(lr: f64) -> Self {
        Self { lr }
    }
}

impl OptimStep for Sgd {
    fn step(&mut self, store: &mut ParamStore, params: &BTreeSet<String>) {
        for name in params {
            if let Some(param) = store.get_mut(name) {
                let lr = self.lr;
                Zip::from(&mut param.data)
                    .and(&param.grad)
                    .for_each(|w, &g| *w -= lr * g);
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct Adam {
    lr: f64,
    beta1: f64,
    beta2: f64,
    eps: f64,
    m: HashMap<String, ArrayD<f64>>,
    v: HashMap<String, ArrayD<f64>>,
    t: usize,
}

impl Adam {
    pub fn new(lr: f64) -> Self {
        Self::with_betas(lr, 0.9, 0.999, 1e-8)
    }

    pub fn with_betas(lr: f64, beta1: f64, beta2: f64, eps: f64) -> Self {
        Self {
            lr,
            beta1,
            beta2,
            eps,
            m: HashMap::new(),
            v: HashMap::new(),
            t: 0,
        }
    }

    pub fn steps_taken(&self) -> usize {
        self.t
    }
}

impl OptimStep for Adam {
    fn step(&mut self, store: &mut ParamStore, params: &BTreeSet<String>) {
        self.t += 1;
        let t = self.t as i32;
        // Bias correction factors
        let bias_correction1 = 1.0 - self.beta1.powi(t);
        let bias_correction2 = 1.0 - self.beta2.powi(t);

        let step_size = self.lr * bias_correction2.sqrt() / bias_correction1;
        let (beta1, beta2, eps) = (self.beta1, self.beta2, self.eps);

        for name in params {
            let Some(param) = store.get_mut(name) else {
                continue;
            };
            let m = self
                .m
                .entry(name.clone())
                .or_insert_with(|| ArrayD::zeros(param.data.raw_dim()));
            let v = self
                .v
                .entry(name.clone())
                .or_insert_with(|| ArrayD::zeros(param.data.raw_dim()));
            // A parameter re-inserted with a new shape restarts its moments.
            if m.shape() != param.data.shape() {
                *m = ArrayD::zeros(param.data.raw_dim());
                *v = ArrayD::zeros(param.data.raw_dim());
            }

            Zip::from(&mut param.data)
                .and(&param.grad)
                .and(m)
                .and(v)
                .for_each(|w, &g, m, v| {
                    *m = beta1 * *m + (1.0 - beta1) * g;
                    *v = beta2 * *v + (1.0 - beta2) * g * g;
                    *w -= step_size * *m / (v.sqrt() + eps);
                });
        }
    }
}

/// The optimizers selectable from configuration.
#[derive(Debug, Clone)]
pub enum Optimizer {
    Sgd(Sgd),
    Adam(Adam),
}

impl OptimStep for Optimizer {
    fn step(&mut self, store: &mut ParamStore, params: &BTreeSet<String>) {
        match self {
            Optimizer::Sgd(o) => o.step(store, params),
            Optimizer::Adam(o) => o.step(store, params),
        }
    }
}
