//! The jobd line protocol
//!
//! Clients talk to the server in `\r\n` terminated lines; jobs talk to the
//! server through pipes in `\n` terminated lines. Both directions go through
//! the same [`StreamBuffer`], which tolerates arbitrary partial reads.
//!
//! - **`buffer`**: fixed-capacity accumulator with incremental line extraction
//! - **`command`**: parsing of a client line into a [`Command`]
//! - **`messages`**: every line the server ever sends, in one place

pub mod buffer;
pub mod command;
pub mod messages;

pub use buffer::{Delimiter, Fill, StreamBuffer};
pub use command::{Command, Verb};
