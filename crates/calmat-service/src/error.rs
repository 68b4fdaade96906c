use serde::Serialize;
use thiserror::Error;

/// Service layer errors - combines all error types
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Structural error: {0}")]
    StructuralError(String),

    #[error("Input of {size} bytes exceeds the {limit} byte limit")]
    InputTooLarge { size: usize, limit: usize },

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    RfcError(#[from] calmat_rfc::error::RfcError),

    #[error(transparent)]
    CoreError(#[from] calmat_core::error::CoreError),

    #[error("Parse cancelled")]
    Cancelled,

    #[error("Invalid component: {0}")]
    InvalidComponent(String),

    #[error("Invalid recurrence rule: {0}")]
    InvalidRule(String),
}

impl ServiceError {
    /// Maps the error onto the caller-facing failure taxonomy.
    #[must_use]
    pub const fn kind(&self) -> FailureKind {
        match self {
            Self::InputTooLarge { .. } => FailureKind::InputTooLarge,
            Self::IoError(_) => FailureKind::Io,
            Self::Cancelled => FailureKind::Cancelled,
            Self::StructuralError(_)
            | Self::RfcError(_)
            | Self::CoreError(_)
            | Self::InvalidComponent(_)
            | Self::InvalidRule(_) => FailureKind::Structural,
        }
    }
}

/// Why a whole parse call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Missing envelope markers or unparseable top-level structure.
    Structural,
    /// Input above the hard byte ceiling.
    InputTooLarge,
    Cancelled,
    /// The reader failed or produced invalid UTF-8.
    Io,
}

pub type ServiceResult<T> = std::result::Result<T, ServiceError>;
