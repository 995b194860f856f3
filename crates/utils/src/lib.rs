//! Shared utilities for jobd
//!
//! Process-wide plumbing that every binary and integration test needs but
//! that has nothing to do with the job-control protocol itself: tracing
//! initialisation and the async-signal-safe wakeup used by the event loop.

pub mod signals;
pub mod tracing;

pub use self::signals::*;
pub use self::tracing::*;
