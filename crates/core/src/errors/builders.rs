//! Builder methods for creating errors with context

use super::types::Error;

// Helper methods for creating errors with context
impl Error {
    /// Create an I/O error tagged with the operation that failed
    #[must_use]
    pub fn io(operation: impl Into<String>, source: std::io::Error) -> Self {
        Error::Io {
            operation: operation.into(),
            source,
        }
    }

    /// Create a protocol error for the named stream
    #[must_use]
    pub fn protocol(stream: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Protocol {
            stream: stream.into(),
            message: message.into(),
        }
    }

    /// Create an outbound size rejection
    #[must_use]
    pub fn message_too_large(length: usize, limit: usize) -> Self {
        Error::MessageTooLarge { length, limit }
    }

    /// Create a spawn error for a job
    #[must_use]
    pub fn spawn(job: impl Into<String>, source: std::io::Error) -> Self {
        Error::Spawn {
            job: job.into(),
            source,
        }
    }

    /// Create a capacity error
    #[must_use]
    pub fn capacity(resource: impl Into<String>, limit: usize) -> Self {
        Error::Capacity {
            resource: resource.into(),
            limit,
        }
    }

    /// Create a not-found error
    #[must_use]
    pub fn not_found(kind: impl Into<String>, id: impl ToString) -> Self {
        Error::NotFound {
            kind: kind.into(),
            id: id.to_string(),
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
        }
    }

    /// Create a signal registration error
    #[must_use]
    pub fn signal(signal: i32, source: std::io::Error) -> Self {
        Error::Signal { signal, source }
    }
}
