//! Extension traits for error handling

use super::types::{Error, Result};

/// Extension trait for adding context to I/O results
pub trait ResultExt<T> {
    /// Tag an I/O failure with the operation that produced it
    fn context(self, operation: impl Into<String>) -> Result<T>;

    /// Tag with a lazily built operation name
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for std::result::Result<T, std::io::Error> {
    fn context(self, operation: impl Into<String>) -> Result<T> {
        self.map_err(|e| Error::io(operation, e))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| Error::io(f(), e))
    }
}
