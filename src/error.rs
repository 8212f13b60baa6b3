// src/error.rs
use thiserror::Error;

use crate::validation::ValidationError;

#[derive(Debug, Error)]
pub enum ConvergeError {
    #[error("invalid zone: {0}")]
    Validation(#[from] ValidationError),

    #[error("transport failure: {0:#}")]
    Transport(anyhow::Error),

    #[error("failed to stage file locally: {0}")]
    Staging(#[from] std::io::Error),

    #[error("invalid deployment plan: {0}")]
    Plan(String),

    #[error("convergence task did not finish: {0}")]
    Task(String),
}

impl ConvergeError {
    pub fn transport(err: anyhow::Error) -> Self {
        ConvergeError::Transport(err)
    }

    pub fn plan(msg: impl Into<String>) -> Self {
        ConvergeError::Plan(msg.into())
    }

    pub fn task(msg: impl Into<String>) -> Self {
        ConvergeError::Task(msg.into())
    }

    /// Validation errors abort before anything touches the target host.
    pub fn is_validation(&self) -> bool {
        matches!(self, ConvergeError::Validation(_))
    }
}
