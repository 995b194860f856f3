//! Server configuration for jobd
//!
//! `ServerConfig` is immutable once built and is handed to the server by
//! value. `ConfigLoader` layers an optional JSON file, environment variables
//! and explicit overrides on top of the built-in defaults.

pub mod config;
pub mod loader;

#[cfg(test)]
mod config_tests;

pub use config::ServerConfig;
pub use loader::ConfigLoader;
