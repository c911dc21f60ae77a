// src/prob/mod.rs

pub mod context;
pub mod distributions;
pub mod error;
pub mod params;
pub mod trace;

pub use context::{run_traced, ProbContext, Program};
pub use distributions::{Bernoulli, Beta, DistributionTrait, Exponential, Normal, Uniform};
pub use error::{ProbError, ProbResult};
pub use params::{ParamStore, Parameter};
pub use trace::{Site, SiteKind, SiteValue, Trace};
