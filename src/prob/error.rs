// src/prob/error.rs

use thiserror::Error;

pub type ProbResult<T> = Result<T, ProbError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProbError {
    #[error("Distribution error: {message}")]
    InvalidDistribution { message: String },

    #[error("Site '{name}' not found in {trace} trace")]
    MissingSite { name: String, trace: &'static str },

    #[error("Site '{name}' recorded twice in the same trace")]
    DuplicateSite { name: String },

    #[error("Parameter '{name}' has shape {found:?}, expected {expected:?}")]
    ShapeMismatch {
        name: String,
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    #[error("Parameter '{name}' not found in store")]
    ParamNotFound { name: String },

    #[error("Program error: {0}")]
    Program(String),
}
