use std::fmt;
use std::error::Error;

use crate::registry::RegistryError;

/// Unified application error for the demo binary.
///
/// The library reports setup failures as values; whether they are fatal
/// is decided here, at the process boundary.
#[derive(Debug)]
pub enum AppError {
    Config(String),
    Registry(RegistryError),
    Metrics(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(msg) => write!(f, "Config error: {}", msg),
            AppError::Registry(err) => write!(f, "Registry error: {}", err),
            AppError::Metrics(msg) => write!(f, "Metrics error: {}", msg),
        }
    }
}

impl Error for AppError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            AppError::Registry(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RegistryError> for AppError {
    fn from(err: RegistryError) -> Self {
        AppError::Registry(err)
    }
}
