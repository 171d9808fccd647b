//! The module contains the error the engine can return.
//!
//! Only collaborator faults travel as errors. Split-balance problems live on
//! the transaction itself ([`TransactionError`]), unparsable input degrades to
//! "no change", and stray requests are no-ops.
//!
//!  [`TransactionError`]: crate::TransactionError
use thiserror::Error;

use crate::navigator::Field;

/// Engine custom errors.
#[derive(Error, Debug, Clone)]
pub enum EngineError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("\"{0}\" key not found!")]
    KeyNotFound(String),
    #[error("{message}")]
    MissingField { field: Field, message: String },
    #[error("Rejected by store: {0}")]
    Rejected(String),
    #[error("Unsupported currency: {0}")]
    InvalidCurrency(String),
    #[error("Expansion cache error: {0}")]
    Cache(String),
}

impl EngineError {
    /// Field the user should be sent back to, if the fault names one.
    #[must_use]
    pub fn field(&self) -> Option<Field> {
        match self {
            Self::MissingField { field, .. } => Some(*field),
            _ => None,
        }
    }
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::InvalidAmount(a), Self::InvalidAmount(b)) => a == b,
            (Self::KeyNotFound(a), Self::KeyNotFound(b)) => a == b,
            (
                Self::MissingField {
                    field: fa,
                    message: ma,
                },
                Self::MissingField {
                    field: fb,
                    message: mb,
                },
            ) => fa == fb && ma == mb,
            (Self::Rejected(a), Self::Rejected(b)) => a == b,
            (Self::InvalidCurrency(a), Self::InvalidCurrency(b)) => a == b,
            (Self::Cache(a), Self::Cache(b)) => a == b,
            _ => false,
        }
    }
}
