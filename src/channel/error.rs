use serde::Serialize;
use thiserror::Error;

use crate::transfer::TransferError;

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("{0}")]
    Argument(String),
    #[error("method '{0}' is not implemented")]
    NotImplemented(String),
    #[error("failed to start tracking: {0}")]
    StartFailed(String),
    #[error("failed to stop tracking: {0}")]
    StopFailed(String),
    #[error(transparent)]
    Transfer(#[from] TransferError),
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl ChannelError {
    pub fn code(&self) -> &'static str {
        match self {
            ChannelError::Argument(_) => "ARG_ERROR",
            ChannelError::NotImplemented(_) => "NOT_IMPLEMENTED",
            ChannelError::StartFailed(_) => "START_FAILED",
            ChannelError::StopFailed(_) => "STOP_FAILED",
            ChannelError::Transfer(err) => err.code(),
            ChannelError::Storage(_) => "STORAGE_ERROR",
        }
    }

    pub(crate) fn argument(message: impl Into<String>) -> Self {
        ChannelError::Argument(message.into())
    }

    pub fn failure(&self) -> ChannelFailure {
        ChannelFailure {
            code: self.code(),
            message: self.to_string(),
        }
    }
}

/// Wire form of a failed call.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ChannelFailure {
    pub code: &'static str,
    pub message: String,
}
