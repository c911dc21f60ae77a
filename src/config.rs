// src/config.rs

use crate::infer::optim::{Adam, Optimizer, Sgd};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SviConfig {
    pub steps: usize,
    pub seed: Option<u64>,
    pub log_every: usize,
    pub model_fixed: bool,
    pub guide_fixed: bool,
    pub optimizer: OptimizerConfig,
}

impl Default for SviConfig {
    fn default() -> Self {
        Self {
            steps: 1000,
            seed: None,
            log_every: 100,
            model_fixed: false,
            guide_fixed: false,
            optimizer: OptimizerConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum OptimizerConfig {
    Sgd {
        #[serde(default = "default_lr")]
        lr: f64,
    },
    Adam {
        #[serde(default = "default_lr")]
        lr: f64,
        #[serde(default = "default_beta1")]
        beta1: f64,
        #[serde(default = "default_beta2")]
        beta2: f64,
        #[serde(default = "default_eps")]
        eps: f64,
    },
}

fn default_lr() -> f64 {
    0.01
}

fn default_beta1() -> f64 {
    0.9
}

fn default_beta2() -> f64 {
    0.999
}

fn default_eps() -> f64 {
    1e-8
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        OptimizerConfig::Adam {
            lr: default_lr(),
            beta1: default_beta1(),
            beta2: default_beta2(),
            eps: default_eps(),
        }
    }
}

impl OptimizerConfig {
    pub fn build(&self) -> Optimizer {
        match *self {
            OptimizerConfig::Sgd { lr } => Optimizer::Sgd(Sgd::new(lr)),
            OptimizerConfig::Adam {
                lr,
                beta1,
                beta2,
                eps,
            } => Optimizer::Adam(Adam::with_betas(lr, beta1, beta2, eps)),
        }
    }

    pub fn lr(&self) -> f64 {
        match *self {
            OptimizerConfig::Sgd { lr } | OptimizerConfig::Adam { lr, .. } => lr,
        }
    }
}

impl SviConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: SviConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.steps == 0 {
            return Err(ConfigError::Invalid("steps must be at least 1".into()));
        }
        let lr = self.optimizer.lr();
        if !(lr > 0.0 && lr.is_finite()) {
            return Err(ConfigError::Invalid(format!(
                "learning rate must be positive, got {}",
                lr
            )));
        }
        if let OptimizerConfig::Adam { beta1, beta2, .. } = self.optimizer {
            if !(0.0..1.0).contains(&beta1) || !(0.0..1.0).contains(&beta2) {
                return Err(ConfigError::Invalid(format!(
                    "adam betas must lie in [0, 1), got beta1={}, beta2={}",
                    beta1, beta2
                )));
            }
        }
        Ok(())
    }
}
