//! Every line the server sends to clients or writes to its own log.
//!
//! The text here is the wire format; clients match on these prefixes.

use jobd_core::{ClientId, Pid};

pub fn job_created(pid: Pid) -> String {
    format!("[SERVER] Job {pid} created")
}

pub fn job_list(pids: &[Pid]) -> String {
    if pids.is_empty() {
        return NO_JOBS.to_string();
    }
    let joined = pids
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ");
    format!("[SERVER] {joined}")
}

pub const NO_JOBS: &str = "[SERVER] No currently running jobs";
pub const MAX_JOBS_EXCEEDED: &str = "[SERVER] MAXJOBS exceeded";
pub const SHUTTING_DOWN: &str = "[SERVER] Shutting down";

pub fn invalid_command(line: &str) -> String {
    format!("[SERVER] Invalid command: {line}")
}

pub fn job_not_found(pid: Pid) -> String {
    format!("[SERVER] Job {pid} not found")
}

pub fn spawn_failed(name: &str) -> String {
    format!("[SERVER] Failed to start job {name}")
}

pub fn watching(pid: Pid) -> String {
    format!("[SERVER] Watching job {pid}")
}

pub fn not_watching(pid: Pid) -> String {
    format!("[SERVER] No longer watching job {pid}")
}

pub fn job_stdout(pid: Pid, line: &str) -> String {
    format!("[JOB {pid}] {line}")
}

pub fn job_stderr(pid: Pid, line: &str) -> String {
    format!("*(JOB {pid})* {line}")
}

pub fn job_exited(pid: Pid, code: i32) -> String {
    format!("[JOB {pid}] Exited with status {code}")
}

pub fn job_signalled(pid: Pid) -> String {
    format!("[JOB {pid}] Exited due to signal")
}

pub fn job_overflow(pid: Pid) -> String {
    format!("*(SERVER)* Buffer from job {pid} is full. Aborting job.")
}

// Log-only lines, never sent to a client

pub fn client_connected(id: ClientId) -> String {
    format!("[SERVER] Client {id} connected")
}

pub fn client_disconnected(id: ClientId) -> String {
    format!("[SERVER] Client {id} disconnected")
}

pub fn client_said(id: ClientId, line: &str) -> String {
    format!("[CLIENT {id}] {line}")
}

pub fn client_overflow(id: ClientId) -> String {
    format!("[SERVER] Line from client {id} exceeds buffer. Dropping connection.")
}
