/// Constants used throughout the jobd codebase
// Buffer sizing
pub const DEFAULT_BUFFER_CAPACITY: usize = 4096;
pub const MIN_BUFFER_CAPACITY: usize = 16;

// Bytes of `\r\n` framing appended to every outbound protocol line
pub const NETWORK_NEWLINE_LEN: usize = 2;

// Admission limits
pub const DEFAULT_MAX_CLIENTS: usize = 20;
pub const DEFAULT_MAX_JOBS: usize = 32;

// Listener defaults
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 55555;

// Directory job executables are resolved against
pub const DEFAULT_JOBS_DIR: &str = "jobs";

// Environment variable names
pub const JOBD_LOG_VAR: &str = "JOBD_LOG";
pub const JOBD_PORT_VAR: &str = "JOBD_PORT";
pub const JOBD_JOBS_DIR_VAR: &str = "JOBD_JOBS_DIR";
