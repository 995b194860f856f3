//! Core error type definitions

/// Result type alias for jobd operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for jobd operations
///
/// The variants follow the failure classes of the server: per-connection and
/// per-job failures (`Io`, `Protocol`, `MessageTooLarge`, `Spawn`, `Capacity`,
/// `NotFound`) are reported and contained, while `Configuration` and `Signal`
/// are raised while the server is being set up.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Read, write or accept failure on a live descriptor
    #[error("I/O error during {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: std::io::Error,
    },

    /// Oversized or malformed line on a stream
    #[error("protocol error on {stream}: {message}")]
    Protocol { stream: String, message: String },

    /// Outbound message does not fit in one protocol line
    #[error("message too large: {length} bytes exceeds limit of {limit}")]
    MessageTooLarge { length: usize, limit: usize },

    /// Pipe, fork or exec failure while launching a job
    #[error("failed to spawn job '{job}': {source}")]
    Spawn {
        job: String,
        #[source]
        source: std::io::Error,
    },

    /// Client or job table is full
    #[error("{resource} capacity of {limit} exceeded")]
    Capacity { resource: String, limit: usize },

    /// Kill or watch target does not exist
    #[error("{kind} {id} not found")]
    NotFound { kind: String, id: String },

    /// Invalid or unreadable configuration
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// Signal handler registration failed
    #[error("failed to register handler for signal {signal}: {source}")]
    Signal {
        signal: i32,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// Whether this error only affects a single connection or job.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Error::Configuration { .. } | Error::Signal { .. })
    }
}
