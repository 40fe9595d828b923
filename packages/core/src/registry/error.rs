//! Error types for device registry operations

use thiserror::Error;

use crate::registry::types::DeviceId;

/// Errors that can occur while reading or writing device records.
///
/// Callers branch on the variant: a missing record is `NotFound`, never a
/// silent `false` or an empty default record.
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Store unreachable: {message}")]
    Connection { message: String },

    #[error("Schema setup failed: {message}")]
    Schema { message: String },

    #[error("Device {id} not found")]
    NotFound { id: DeviceId },

    #[error("Constraint violation: {message}")]
    ConstraintViolation { message: String },

    #[error("Query failed: {message}")]
    Query { message: String },

    #[error("Store write failed: {message}")]
    Store { message: String },

    #[error("Write to device {id} abandoned after {waited_ms}ms")]
    Timeout { id: DeviceId, waited_ms: u128 },
}

impl RegistryError {
    pub fn not_found(id: DeviceId) -> Self {
        Self::NotFound { id }
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection { message: message.into() }
    }

    pub fn schema(message: impl Into<String>) -> Self {
        Self::Schema { message: message.into() }
    }

    /// `true` for the `Timeout` variant.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// `true` for the `NotFound` variant.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Map an sqlx failure raised on a read path.
    pub(crate) fn from_read(err: sqlx::Error) -> Self {
        Self::classify(err).unwrap_or_else(|err| Self::Query {
            message: err.to_string(),
        })
    }

    /// Map an sqlx failure raised on a write path.
    pub(crate) fn from_write(err: sqlx::Error) -> Self {
        Self::classify(err).unwrap_or_else(|err| Self::Store {
            message: err.to_string(),
        })
    }

    // Connection and constraint failures look the same on both paths;
    // anything else is handed back for the caller to label.
    fn classify(err: sqlx::Error) -> Result<Self, sqlx::Error> {
        match err {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => Ok(Self::connection(err.to_string())),
            sqlx::Error::Database(ref db_err)
                if db_err.is_unique_violation()
                    || db_err.is_foreign_key_violation()
                    || db_err.is_check_violation() =>
            {
                Ok(Self::ConstraintViolation {
                    message: db_err.message().to_string(),
                })
            }
            other => Err(other),
        }
    }
}

/// Result type for registry operations
pub type RegistryResult<T> = Result<T, RegistryError>;
