//! Unified error types and result handling.
//!
//! Every fallible operation in the crate returns [`Result`]. Callers that need
//! to translate failures into a protocol response (exit code, HTTP status)
//! should match on [`Error::kind`] rather than on individual variants.

use rust_decimal::Decimal;
use sea_orm::DbErr;
use thiserror::Error;

/// Coarse classification of an [`Error`] for caller-facing translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed request; retrying the same input will fail again
    InvalidInput,
    /// A referenced purchase, material or product does not exist
    NotFound,
    /// The acting user does not own the resource
    Forbidden,
    /// A reversal would drive stock negative in strict mode
    InsufficientStock,
    /// Storage failed mid-transition; state is unchanged and a retry is safe
    TransactionFailed,
    /// Configuration, I/O or storage failure outside a transition
    Internal,
}

/// Error type for all stockbook operations
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or out-of-range input
    #[error("Invalid input: {message}")]
    InvalidInput {
        /// What was wrong with the input
        message: String,
    },

    /// Purchase does not exist
    #[error("Purchase not found: {id}")]
    PurchaseNotFound {
        /// Requested purchase id
        id: i64,
    },

    /// Material does not exist (or belongs to another user)
    #[error("Material not found: {id}")]
    MaterialNotFound {
        /// Requested material id
        id: i64,
    },

    /// Product does not exist (or belongs to another user)
    #[error("Product not found: {id}")]
    ProductNotFound {
        /// Requested product id
        id: i64,
    },

    /// Acting user does not own the purchase
    #[error("User {user_id} is not allowed to modify purchase {purchase_id}")]
    Forbidden {
        /// User that attempted the operation
        user_id: String,
        /// Purchase the user attempted to modify
        purchase_id: i64,
    },

    /// Strict stock mode rejected a decrement below zero
    #[error("Insufficient stock for {target}: current {current}, required {required}")]
    InsufficientStock {
        /// Human-readable target, e.g. `material 3`
        target: String,
        /// Stock before the rejected decrement
        current: Decimal,
        /// Quantity the decrement needed
        required: Decimal,
    },

    /// Storage failed inside a transition; everything was rolled back
    #[error("Transaction failed: {message}")]
    TransactionFailed {
        /// Underlying cause
        message: String,
    },

    /// Storage error outside a transition
    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    /// Configuration could not be loaded
    #[error("Configuration error: {message}")]
    Config {
        /// What went wrong
        message: String,
    },

    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding/decoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Classifies the error into the caller-facing taxonomy.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput { .. } => ErrorKind::InvalidInput,
            Self::PurchaseNotFound { .. }
            | Self::MaterialNotFound { .. }
            | Self::ProductNotFound { .. } => ErrorKind::NotFound,
            Self::Forbidden { .. } => ErrorKind::Forbidden,
            Self::InsufficientStock { .. } => ErrorKind::InsufficientStock,
            Self::TransactionFailed { .. } => ErrorKind::TransactionFailed,
            Self::Database(_) | Self::Config { .. } | Self::Io(_) | Self::Json(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// Re-labels an error raised inside a transactional body.
    ///
    /// Storage errors become [`Error::TransactionFailed`] carrying the cause;
    /// domain errors keep their identity so callers can still tell a missing
    /// material from a dropped connection.
    #[must_use]
    pub fn within_transaction(self) -> Self {
        match self {
            Self::Database(err) => Self::TransactionFailed {
                message: err.to_string(),
            },
            other => other,
        }
    }

    /// Shorthand for storage errors raised while opening or committing a
    /// transaction.
    #[must_use]
    pub fn transaction(err: DbErr) -> Self {
        Self::TransactionFailed {
            message: err.to_string(),
        }
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_groups_not_found_variants() {
        assert_eq!(Error::PurchaseNotFound { id: 1 }.kind(), ErrorKind::NotFound);
        assert_eq!(Error::MaterialNotFound { id: 1 }.kind(), ErrorKind::NotFound);
        assert_eq!(Error::ProductNotFound { id: 1 }.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_within_transaction_wraps_storage_errors_only() {
        let wrapped = Error::Database(DbErr::Custom("disk full".to_string())).within_transaction();
        match wrapped {
            Error::TransactionFailed { message } => assert!(message.contains("disk full")),
            other => panic!("unexpected error: {other:?}"),
        }

        let kept = Error::Forbidden {
            user_id: "alice".to_string(),
            purchase_id: 7,
        }
        .within_transaction();
        assert_eq!(kept.kind(), ErrorKind::Forbidden);
    }
}
