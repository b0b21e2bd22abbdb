//! Error types for the control boundary.
//!
//! The numeric core never fails; everything here is about rejecting bad
//! input before it can reach tick state.

use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid config: {0}")]
    Invalid(&'static str),

    #[error("failed to read config file: {0}")]
    Io(#[from] io::Error),

    #[cfg(feature = "serde")]
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("tick period must be positive, got {0:?}")]
    InvalidPeriod(std::time::Duration),

    #[error("curiosity rate must be a number")]
    InvalidCuriosityRate,

    #[error("engine has been shut down")]
    ShutDown,

    #[error("failed to spawn ticker thread: {0}")]
    Spawn(#[source] io::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
