//! A single job: child process, its two output streams, and its watchers

use crate::announce::Announcer;
use crate::client::ClientTable;
use crate::reap::ExitReason;
use indexmap::IndexSet;
use jobd_core::{ClientId, Error, Pid, Result};
use jobd_protocol::{messages, Delimiter, Fill, StreamBuffer};
use nix::fcntl::{fcntl, FcntlArg, OFlag};
use std::fmt;
use std::fs::File;
use std::io;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, OwnedFd};
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};

/// Which of a job's output pipes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Stdout,
    Stderr,
}

impl StreamKind {
    fn frame(self, pid: Pid, line: &str) -> String {
        match self {
            StreamKind::Stdout => messages::job_stdout(pid, line),
            StreamKind::Stderr => messages::job_stderr(pid, line),
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StreamKind::Stdout => "stdout",
            StreamKind::Stderr => "stderr",
        })
    }
}

/// Read end of one output pipe plus its line buffer. `source` becomes `None`
/// once the pipe reports end of stream, which also closes the descriptor.
#[derive(Debug)]
struct OutputStream {
    source: Option<File>,
    buffer: StreamBuffer,
}

impl OutputStream {
    fn new(fd: OwnedFd, capacity: usize) -> io::Result<Self> {
        set_nonblocking(&fd)?;
        Ok(Self {
            source: Some(File::from(fd)),
            buffer: StreamBuffer::new(capacity),
        })
    }
}

fn set_nonblocking(fd: &OwnedFd) -> io::Result<()> {
    let raw = fd.as_raw_fd();
    let flags = fcntl(raw, FcntlArg::F_GETFL).map_err(io::Error::from)?;
    let flags = OFlag::from_bits_truncate(flags) | OFlag::O_NONBLOCK;
    fcntl(raw, FcntlArg::F_SETFL(flags)).map_err(io::Error::from)?;
    Ok(())
}

/// Result of one [`Job::drain_output`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Bytes read from the pipe
    pub read: usize,
    /// Lines forwarded to watchers
    pub lines: usize,
    /// The pipe reached end of stream
    pub closed: bool,
    /// A line longer than the buffer was found and the job was aborted
    pub overflowed: bool,
}

#[derive(Debug)]
pub struct Job {
    pid: Pid,
    name: String,
    child: Child,
    stdout: OutputStream,
    stderr: OutputStream,
    status: Option<ExitStatus>,
    watchers: IndexSet<ClientId>,
    aborted: bool,
}

impl Job {
    /// Launch `executable` with `argv[0]` set to `name`, stdout and stderr on
    /// separate pipes, and stdin detached. `creator` becomes the first watcher.
    pub fn spawn(
        name: &str,
        executable: &Path,
        args: &[&str],
        buffer_capacity: usize,
        creator: ClientId,
    ) -> Result<Self> {
        let mut child = Command::new(executable)
            .arg0(name)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::spawn(name, e))?;

        let streams = child
            .stdout
            .take()
            .zip(child.stderr.take())
            .ok_or_else(|| io::Error::other("output pipes missing"))
            .and_then(|(out, err)| {
                Ok((
                    OutputStream::new(OwnedFd::from(out), buffer_capacity)?,
                    OutputStream::new(OwnedFd::from(err), buffer_capacity)?,
                ))
            });

        let (stdout, stderr) = match streams {
            Ok(streams) => streams,
            Err(e) => {
                // Never leave a process behind that nobody can observe
                let _ = child.kill();
                let _ = child.wait();
                return Err(Error::spawn(name, e));
            }
        };

        let mut watchers = IndexSet::new();
        watchers.insert(creator);

        Ok(Self {
            pid: Pid::new(child.id()),
            name: name.to_string(),
            child,
            stdout,
            stderr,
            status: None,
            watchers,
            aborted: false,
        })
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn is_dead(&self) -> bool {
        self.status.is_some()
    }

    pub fn exit_reason(&self) -> Option<ExitReason> {
        self.status.map(ExitReason::from)
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    pub fn watchers(&self) -> impl Iterator<Item = ClientId> + '_ {
        self.watchers.iter().copied()
    }

    pub fn is_watched_by(&self, client: ClientId) -> bool {
        self.watchers.contains(&client)
    }

    /// Add `client` as a watcher, or remove it if it already is one.
    /// Returns whether the client is watching afterwards.
    pub fn toggle_watcher(&mut self, client: ClientId) -> bool {
        if self.watchers.shift_remove(&client) {
            false
        } else {
            self.watchers.insert(client);
            true
        }
    }

    pub fn remove_watcher(&mut self, client: ClientId) -> bool {
        self.watchers.shift_remove(&client)
    }

    /// The read end of a still-open output pipe.
    pub fn stream_fd(&self, kind: StreamKind) -> Option<BorrowedFd<'_>> {
        self.stream(kind).source.as_ref().map(AsFd::as_fd)
    }

    /// Record termination. Returns `false` if the job was already dead.
    pub fn mark_terminated(&mut self, status: ExitStatus) -> bool {
        if self.status.is_some() {
            return false;
        }
        self.status = Some(status);
        true
    }

    /// Send SIGKILL. Death is only observed later through the reap path.
    pub fn kill(&mut self) -> Result<()> {
        self.child
            .kill()
            .map_err(|e| Error::io(format!("signal job {}", self.pid), e))
    }

    pub(crate) fn try_wait(&mut self) -> io::Result<Option<ExitStatus>> {
        self.child.try_wait()
    }

    /// Kill and reap a job that never entered the table.
    pub(crate) fn discard(mut self) {
        if let Err(e) = self.kill() {
            tracing::warn!(pid = %self.pid, error = %e, "failed to kill discarded job");
        }
        if let Err(e) = self.child.wait() {
            tracing::warn!(pid = %self.pid, error = %e, "failed to reap discarded job");
        }
    }

    /// Read what is ready on one pipe and forward every complete line to the
    /// watchers.
    ///
    /// A buffer still saturated after extracting lines holds a single line
    /// longer than the buffer; the watchers are told and the job is killed.
    /// Output of an aborted job is read and discarded.
    pub fn drain_output(
        &mut self,
        kind: StreamKind,
        announcer: &mut Announcer,
        clients: &ClientTable,
    ) -> Result<DrainReport> {
        let pid = self.pid;
        let aborted = self.aborted;
        let mut report = DrainReport::default();
        let mut lines = Vec::new();

        {
            let stream = self.stream_mut(kind);
            let Some(source) = stream.source.as_mut() else {
                report.closed = true;
                return Ok(report);
            };

            match stream.buffer.fill(source) {
                Ok(Fill::Read(n)) => report.read = n,
                Ok(Fill::Closed) => report.closed = true,
                Ok(Fill::Saturated) => {}
                Err(e) => {
                    stream.source = None;
                    return Err(Error::io(format!("read {kind} of job {pid}"), e));
                }
            }

            while let Some(message) = stream.buffer.next_message(Delimiter::Unix) {
                lines.push(String::from_utf8_lossy(message).into_owned());
            }
            stream.buffer.compact();

            if report.closed {
                stream.source = None;
                if let Some(tail) = stream.buffer.remainder() {
                    lines.push(String::from_utf8_lossy(&tail).into_owned());
                }
            } else if stream.buffer.is_saturated() {
                stream.buffer.clear();
                report.overflowed = !aborted;
            }

            if aborted {
                stream.buffer.clear();
                lines.clear();
            }
        }

        for line in &lines {
            let text = announcer.fit(kind.frame(pid, line));
            announcer.broadcast(clients, self.watchers(), &text);
        }
        report.lines = lines.len();

        if report.overflowed {
            self.abort(announcer, clients)?;
        }
        Ok(report)
    }

    /// Forward what is still sitting in both pipes. Used once the process is
    /// known to be dead, right before the job is removed.
    ///
    /// At most one buffer of bytes is taken from each pipe. A background
    /// process the job left behind may keep writing forever, and the control
    /// loop cannot wait for it.
    pub fn flush_output(&mut self, announcer: &mut Announcer, clients: &ClientTable) {
        for kind in [StreamKind::Stdout, StreamKind::Stderr] {
            let budget = self.stream(kind).buffer.capacity();
            let mut taken = 0;
            loop {
                match self.drain_output(kind, announcer, clients) {
                    Ok(report) if report.read > 0 && !report.closed => {
                        taken += report.read;
                        if taken >= budget {
                            tracing::debug!(
                                pid = %self.pid,
                                job = %self.name,
                                stream = %kind,
                                "pipe still written after exit, closing it"
                            );
                            break;
                        }
                    }
                    Ok(_) => break,
                    Err(e) => {
                        tracing::warn!(pid = %self.pid, error = %e, "failed to flush job output");
                        break;
                    }
                }
            }

            // A grandchild may still hold the pipe open; what arrived is final
            let aborted = self.aborted;
            let stream = self.stream_mut(kind);
            stream.source = None;
            if let Some(tail) = stream.buffer.remainder() {
                if !aborted {
                    let line = String::from_utf8_lossy(&tail).into_owned();
                    let text = announcer.fit(kind.frame(self.pid, &line));
                    announcer.broadcast(clients, self.watchers(), &text);
                }
            }
        }
    }

    fn abort(&mut self, announcer: &mut Announcer, clients: &ClientTable) -> Result<()> {
        self.aborted = true;
        let notice = messages::job_overflow(self.pid);
        announcer.broadcast(clients, self.watchers(), &notice);
        tracing::warn!(pid = %self.pid, job = %self.name, "job output line exceeds buffer, killing job");
        self.kill()
    }

    fn stream(&self, kind: StreamKind) -> &OutputStream {
        match kind {
            StreamKind::Stdout => &self.stdout,
            StreamKind::Stderr => &self.stderr,
        }
    }

    fn stream_mut(&mut self, kind: StreamKind) -> &mut OutputStream {
        match kind {
            StreamKind::Stdout => &mut self.stdout,
            StreamKind::Stderr => &mut self.stderr,
        }
    }
}
