// Unified error handling for the svi crate
//
// Inference failures and configuration failures both surface through this
// type at the binary boundary.

use crate::config::ConfigError;
use crate::prob::ProbError;
use std::fmt;

#[derive(Debug)]
pub enum Error {
    // Tracing, density or parameter failures raised during a step
    Prob(ProbError),

    // Configuration loading (including reading the file) or validation
    Config(ConfigError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Prob(e) => write!(f, "Inference Error: {}", e),
            Error::Config(e) => write!(f, "Config Error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Prob(e) => Some(e),
            Error::Config(e) => Some(e),
        }
    }
}

impl From<ProbError> for Error {
    fn from(e: ProbError) -> Self {
        Error::Prob(e)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::Config(e)
    }
}

pub type SviResult<T> = Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversions_keep_source() {
        let err: Error = ProbError::ParamNotFound { name: "loc".into() }.into();
        assert_eq!(
            err.to_string(),
            "Inference Error: Parameter 'loc' not found in store"
        );
        assert!(std::error::Error::source(&err).is_some());

        let err: Error = ConfigError::Invalid("steps must be positive".into()).into();
        assert!(err.to_string().starts_with("Config Error: "));
        assert!(std::error::Error::source(&err).is_some());
    }
}
