//! Error types and result extensions for jobd operations

mod builders;
mod conversions;
mod extensions;
mod types;

pub use extensions::ResultExt;
pub use types::{Error, Result};
