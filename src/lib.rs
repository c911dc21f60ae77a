// svi - stochastic variational inference over a traced probabilistic runtime

pub mod ad;
pub mod config;
pub mod demos;
pub mod error;
pub mod infer;
pub mod logging;
pub mod prob;


// Re-export main types for convenience
pub use ad::types::ADFloat;
pub use config::{OptimizerConfig, SviConfig};
pub use error::{Error, SviResult};
pub use infer::{Adam, OptimStep, Optimizer, Sgd, Svi};
pub use prob::{ParamStore, ProbContext, ProbError, ProbResult, Trace};

// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
