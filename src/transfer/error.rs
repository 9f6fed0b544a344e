use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("document is not valid JSON: {0}")]
    InvalidDocument(String),
    #[error("unsupported schema '{0}'")]
    UnsupportedSchema(String),
    #[error("unsupported schema version {found}, expected {expected}")]
    UnsupportedSchemaVersion { found: i64, expected: i64 },
    #[error("validation failed: {0}")]
    Validation(String),
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl TransferError {
    pub fn code(&self) -> &'static str {
        match self {
            TransferError::InvalidDocument(_) => "INVALID_DOCUMENT",
            TransferError::UnsupportedSchema(_) => "UNSUPPORTED_SCHEMA",
            TransferError::UnsupportedSchemaVersion { .. } => "UNSUPPORTED_SCHEMA_VERSION",
            TransferError::Validation(_) => "VALIDATION_FAILED",
            TransferError::Storage(_) => "STORAGE_ERROR",
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        TransferError::Validation(message.into())
    }
}
