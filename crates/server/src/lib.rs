//! The jobd server
//!
//! A single control thread owns every client connection and every job. It
//! blocks in exactly one place, the `poll` in [`watch::WatchSet::wait`], and
//! reacts to readiness in a fixed order each time it wakes:
//!
//! 1. accept a pending connection
//! 2. forward job output to watchers
//! 3. execute complete client command lines
//! 4. drop clients that disconnected or misbehaved
//! 5. reap terminated jobs when the child-exit pipe fired
//!
//! Signal handlers never touch this state; see `jobd_utils::signals`.

pub mod announce;
pub mod client;
pub mod job;
pub mod jobs;
pub mod reap;
pub mod server;
pub mod watch;

pub use announce::{Announcer, Delivery};
pub use client::{Client, ClientTable};
pub use job::{DrainReport, Job, StreamKind};
pub use jobs::JobTable;
pub use reap::{ExitReason, Termination};
pub use server::Server;
