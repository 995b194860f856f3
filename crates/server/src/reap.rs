//! Deferred reaping of terminated jobs
//!
//! The SIGCHLD handler only makes the child-exit pipe readable. Everything
//! here runs later on the control thread: poll every live job without
//! blocking, record what terminated, then mark those jobs dead. Removal and
//! announcement are left to [`JobTable::remove_dead`].

use crate::jobs::JobTable;
use jobd_core::Pid;
use jobd_protocol::messages;
use std::os::unix::process::ExitStatusExt;
use std::process::ExitStatus;

/// How a job's process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    Exited(i32),
    Signalled(Option<i32>),
}

impl From<ExitStatus> for ExitReason {
    fn from(status: ExitStatus) -> Self {
        match status.code() {
            Some(code) => ExitReason::Exited(code),
            None => ExitReason::Signalled(status.signal()),
        }
    }
}

impl ExitReason {
    /// The line announced to a job's watchers when it is removed.
    pub fn announcement(self, pid: Pid) -> String {
        match self {
            ExitReason::Exited(code) => messages::job_exited(pid, code),
            ExitReason::Signalled(_) => messages::job_signalled(pid),
        }
    }
}

/// A termination observed but not yet applied to the job table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Termination {
    pub pid: Pid,
    pub status: ExitStatus,
}

/// Collect every live job whose process has terminated.
pub fn collect(jobs: &mut JobTable) -> Vec<Termination> {
    let mut pending = Vec::new();
    for job in jobs.iter_mut().filter(|job| !job.is_dead()) {
        match job.try_wait() {
            Ok(Some(status)) => pending.push(Termination {
                pid: job.pid(),
                status,
            }),
            Ok(None) => {}
            Err(e) => tracing::warn!(pid = %job.pid(), error = %e, "failed to poll job status"),
        }
    }
    pending
}

/// One reap pass: collect terminations and apply them. Returns how many jobs
/// were newly marked dead.
pub fn reap(jobs: &mut JobTable) -> usize {
    let mut marked = 0;
    for termination in collect(jobs) {
        if jobs.mark_terminated(termination.pid, termination.status) {
            tracing::debug!(
                pid = %termination.pid,
                reason = ?ExitReason::from(termination.status),
                "job terminated"
            );
            marked += 1;
        } else {
            tracing::debug!(pid = %termination.pid, "reaped unknown pid");
        }
    }
    marked
}
