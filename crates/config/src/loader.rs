//! Configuration loader for jobd
//!
//! Precedence, highest first: explicit overrides (CLI flags), environment
//! variables, the JSON config file, built-in defaults.

use crate::config::ServerConfig;
use jobd_core::{
    constants::{JOBD_JOBS_DIR_VAR, JOBD_PORT_VAR},
    Error, Result,
};
use std::path::{Path, PathBuf};

/// Configuration loader that layers all startup configuration sources
#[derive(Debug, Default)]
pub struct ConfigLoader {
    file: Option<PathBuf>,
    read_env: bool,
    port: Option<u16>,
    max_clients: Option<usize>,
    max_jobs: Option<usize>,
    jobs_dir: Option<PathBuf>,
    buffer_capacity: Option<usize>,
}

impl ConfigLoader {
    /// Create a new configuration loader that also consults the environment
    pub fn new() -> Self {
        Self {
            read_env: true,
            ..Self::default()
        }
    }

    /// Load a JSON config file before applying overrides
    pub fn file(mut self, path: PathBuf) -> Self {
        self.file = Some(path);
        self
    }

    /// Skip `JOBD_*` environment variables
    pub fn ignore_env(mut self) -> Self {
        self.read_env = false;
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn max_clients(mut self, max: usize) -> Self {
        self.max_clients = Some(max);
        self
    }

    pub fn max_jobs(mut self, max: usize) -> Self {
        self.max_jobs = Some(max);
        self
    }

    pub fn jobs_dir(mut self, dir: PathBuf) -> Self {
        self.jobs_dir = Some(dir);
        self
    }

    pub fn buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = Some(capacity);
        self
    }

    /// Build and validate the configuration
    pub fn load(self) -> Result<ServerConfig> {
        let mut config = match &self.file {
            Some(path) => read_file(path)?,
            None => ServerConfig::default(),
        };

        if self.read_env {
            apply_env(&mut config)?;
        }

        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(max) = self.max_clients {
            config.max_clients = max;
        }
        if let Some(max) = self.max_jobs {
            config.max_jobs = max;
        }
        if let Some(dir) = self.jobs_dir {
            config.jobs_dir = dir;
        }
        if let Some(capacity) = self.buffer_capacity {
            config.buffer_capacity = capacity;
        }

        config.validate()?;
        tracing::debug!(?config, "configuration loaded");
        Ok(config)
    }
}

fn read_file(path: &Path) -> Result<ServerConfig> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        Error::configuration(format!("failed to read '{}': {e}", path.display()))
    })?;
    serde_json::from_str(&contents).map_err(|e| {
        Error::configuration(format!("failed to parse '{}': {e}", path.display()))
    })
}

fn apply_env(config: &mut ServerConfig) -> Result<()> {
    if let Ok(port) = std::env::var(JOBD_PORT_VAR) {
        config.port = port.parse().map_err(|_| {
            Error::configuration(format!("{JOBD_PORT_VAR} is not a valid port: '{port}'"))
        })?;
    }
    if let Some(dir) = std::env::var_os(JOBD_JOBS_DIR_VAR) {
        config.jobs_dir = PathBuf::from(dir);
    }
    Ok(())
}
