//! Conversion implementations for error types

use super::types::Error;

// Bare io::Error carries no operation, so tag it generically
impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Error::Io {
            operation: "unknown".to_string(),
            source: error,
        }
    }
}
