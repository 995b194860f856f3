//! Core domain types, errors, and constants for `jobd`.
//!
//! ## Key Components
//!
//! - **`errors`**: the `Error` enum and `Result` alias shared by every crate in
//!   the workspace, one variant per failure class of the server.
//! - **`types`**: `Pid` and `ClientId` newtypes.
//! - **`constants`**: default limits, buffer sizing, and environment variable
//!   names.

pub mod constants;
pub mod errors;
pub mod types;

pub use self::{
    constants::*,
    errors::{Error, Result, ResultExt},
    types::*,
};
