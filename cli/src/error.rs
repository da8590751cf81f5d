use planloop_core::error::{LoopError, StoreError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("config error: {0}")]
    Config(String),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("loop failed: {0}")]
    Loop(#[from] LoopError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0:#}")]
    Anyhow(#[from] anyhow::Error),
}

impl CliError {
    // 0: success
    // 11: config error
    // 20: store / IO error
    // 30: loop error
    // 50: internal/uncategorized
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config(_) => 11,
            CliError::Store(_) | CliError::Io(_) => 20,
            CliError::Loop(LoopError::Store(_)) => 20,
            CliError::Loop(_) => 30,
            CliError::Anyhow(_) => 50,
        }
    }
}
