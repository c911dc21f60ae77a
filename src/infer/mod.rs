// src/infer/mod.rs

pub mod optim;
pub mod svi;

pub use optim::{Adam, OptimStep, Optimizer, Sgd};
pub use svi::{elbo_surrogate, trainable_params, Svi};
