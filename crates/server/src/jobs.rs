//! The job table

use crate::job::Job;
use indexmap::IndexMap;
use jobd_core::{ClientId, Error, Pid, Result};
use std::process::ExitStatus;

/// Capacity-bounded table of jobs keyed by pid, in creation order.
///
/// A job stays in the table after its process terminates until
/// [`remove_dead`](Self::remove_dead) has flushed its output and announced the
/// exit. Until then it still counts towards capacity but is hidden from
/// listings and commands.
#[derive(Debug)]
pub struct JobTable {
    jobs: IndexMap<Pid, Job>,
    max_jobs: usize,
}

impl JobTable {
    pub fn new(max_jobs: usize) -> Self {
        Self {
            jobs: IndexMap::with_capacity(max_jobs),
            max_jobs,
        }
    }

    pub fn has_capacity(&self) -> bool {
        self.jobs.len() < self.max_jobs
    }

    /// Callers check [`has_capacity`](Self::has_capacity) before spawning.
    /// A job that arrives at a full table anyway is killed and reaped.
    pub fn insert(&mut self, job: Job) -> Result<Pid> {
        if !self.has_capacity() {
            job.discard();
            return Err(Error::capacity("jobs", self.max_jobs));
        }
        let pid = job.pid();
        self.jobs.insert(pid, job);
        Ok(pid)
    }

    pub fn get(&self, pid: Pid) -> Option<&Job> {
        self.jobs.get(&pid)
    }

    pub fn get_mut(&mut self, pid: Pid) -> Option<&mut Job> {
        self.jobs.get_mut(&pid)
    }

    /// A job that is still running. Dead jobs awaiting removal are invisible
    /// to clients.
    fn live_mut(&mut self, pid: Pid) -> Result<&mut Job> {
        self.jobs
            .get_mut(&pid)
            .filter(|job| !job.is_dead())
            .ok_or_else(|| Error::not_found("job", pid))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Job> {
        self.jobs.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Job> {
        self.jobs.values_mut()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Pids of running jobs, oldest first.
    pub fn live_pids(&self) -> Vec<Pid> {
        self.jobs
            .values()
            .filter(|job| !job.is_dead())
            .map(Job::pid)
            .collect()
    }

    /// Record that `pid` terminated. Returns `false` for an unknown pid or a
    /// job already marked.
    pub fn mark_terminated(&mut self, pid: Pid, status: ExitStatus) -> bool {
        self.jobs
            .get_mut(&pid)
            .is_some_and(|job| job.mark_terminated(status))
    }

    pub fn kill(&mut self, pid: Pid) -> Result<()> {
        self.live_mut(pid)?.kill()
    }

    /// Toggle whether `client` watches `pid`. Returns whether it watches now.
    pub fn toggle_watch(&mut self, pid: Pid, client: ClientId) -> Result<bool> {
        Ok(self.live_mut(pid)?.toggle_watcher(client))
    }

    /// Drop `client` from every watcher set. Returns how many jobs it watched.
    pub fn forget_client(&mut self, client: ClientId) -> usize {
        self.jobs
            .values_mut()
            .filter_map(|job| job.remove_watcher(client).then_some(()))
            .count()
    }

    /// Remove every dead job, handing each to `finish` first so its last
    /// output and exit can be announced. Returns the removed pids.
    pub fn remove_dead<F>(&mut self, mut finish: F) -> Vec<Pid>
    where
        F: FnMut(&mut Job),
    {
        let mut removed = Vec::new();
        self.jobs.retain(|pid, job| {
            if !job.is_dead() {
                return true;
            }
            finish(job);
            removed.push(*pid);
            false
        });
        removed
    }
}
