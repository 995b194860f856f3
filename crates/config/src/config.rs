//! The `ServerConfig` struct and its validation rules

use jobd_core::{
    constants::{
        DEFAULT_BIND_ADDRESS, DEFAULT_BUFFER_CAPACITY, DEFAULT_JOBS_DIR, DEFAULT_MAX_CLIENTS,
        DEFAULT_MAX_JOBS, DEFAULT_PORT, MIN_BUFFER_CAPACITY,
    },
    Error, Result,
};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

/// Everything the server needs to know before it binds its listener.
///
/// Missing fields in a JSON config file fall back to the defaults, so a file
/// only needs to name what it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Address the listener binds to
    pub bind_address: IpAddr,

    /// TCP port; 0 asks the OS for an ephemeral port
    pub port: u16,

    /// Upper bound on simultaneously connected clients
    pub max_clients: usize,

    /// Upper bound on jobs held in the job table, dead or alive
    pub max_jobs: usize,

    /// Directory job names are resolved against
    pub jobs_dir: PathBuf,

    /// Capacity in bytes of every stream buffer
    pub buffer_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDRESS
                .parse()
                .unwrap_or(IpAddr::from([127, 0, 0, 1])),
            port: DEFAULT_PORT,
            max_clients: DEFAULT_MAX_CLIENTS,
            max_jobs: DEFAULT_MAX_JOBS,
            jobs_dir: PathBuf::from(DEFAULT_JOBS_DIR),
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
        }
    }
}

impl ServerConfig {
    /// Socket address the listener should bind
    #[must_use]
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }

    /// Path of the executable for a job name. The name must already have been
    /// checked for path separators.
    #[must_use]
    pub fn job_executable(&self, name: &str) -> PathBuf {
        self.jobs_dir.join(name)
    }

    /// Check the limits and the jobs directory
    pub fn validate(&self) -> Result<()> {
        if self.max_clients == 0 {
            return Err(Error::configuration("max_clients must be at least 1"));
        }
        if self.max_jobs == 0 {
            return Err(Error::configuration("max_jobs must be at least 1"));
        }
        if self.buffer_capacity < MIN_BUFFER_CAPACITY {
            return Err(Error::configuration(format!(
                "buffer_capacity must be at least {MIN_BUFFER_CAPACITY} bytes, got {}",
                self.buffer_capacity
            )));
        }
        check_jobs_dir(&self.jobs_dir)
    }
}

fn check_jobs_dir(dir: &Path) -> Result<()> {
    match std::fs::metadata(dir) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(Error::configuration(format!(
            "jobs directory '{}' is not a directory",
            dir.display()
        ))),
        Err(e) => Err(Error::configuration(format!(
            "jobs directory '{}' is not accessible: {e}",
            dir.display()
        ))),
    }
}
