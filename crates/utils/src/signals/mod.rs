//! Async-signal-safe wakeups for a poll-based event loop
//!
//! Signal handlers registered here never touch server state. They either
//! write a single byte into a non-blocking self-pipe or flip an atomic flag;
//! the event loop polls the read end of the pipe and does the real work on
//! its own thread once it wakes up.

use jobd_core::{Error, Result, ResultExt};
use signal_hook::SigId;
use std::io::{ErrorKind, Read, Write};
use std::os::fd::{AsFd, BorrowedFd};
use std::os::unix::net::UnixStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub use signal_hook::consts::{SIGCHLD, SIGINT, SIGTERM};

/// A self-pipe whose read end becomes readable whenever one of the signals
/// it was registered for is delivered.
#[derive(Debug)]
pub struct WakePipe {
    reader: UnixStream,
    writer: UnixStream,
    registrations: Vec<SigId>,
}

impl WakePipe {
    pub fn new() -> Result<Self> {
        let (reader, writer) = UnixStream::pair().context("create wake pipe")?;
        reader
            .set_nonblocking(true)
            .context("set wake pipe reader non-blocking")?;
        writer
            .set_nonblocking(true)
            .context("set wake pipe writer non-blocking")?;
        Ok(Self {
            reader,
            writer,
            registrations: Vec::new(),
        })
    }

    /// Write a byte into this pipe every time `signal` is delivered.
    pub fn notify_on(&mut self, signal: i32) -> Result<()> {
        let writer = self
            .writer
            .try_clone()
            .context("clone wake pipe writer")?;
        let id = signal_hook::low_level::pipe::register(signal, writer)
            .map_err(|e| Error::signal(signal, e))?;
        self.registrations.push(id);
        ::tracing::debug!(signal, "wake pipe registered");
        Ok(())
    }

    /// A handle that can wake the pipe from ordinary code.
    pub fn waker(&self) -> Result<Waker> {
        let writer = self
            .writer
            .try_clone()
            .context("clone wake pipe writer")?;
        Ok(Waker {
            writer: Arc::new(writer),
        })
    }

    /// Consume every pending wakeup byte. Returns how many were pending.
    pub fn drain(&mut self) -> usize {
        let mut total = 0;
        let mut scratch = [0u8; 64];
        loop {
            match self.reader.read(&mut scratch) {
                Ok(0) => break,
                Ok(n) => total += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(_) => break,
            }
        }
        total
    }
}

impl AsFd for WakePipe {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.reader.as_fd()
    }
}

impl Drop for WakePipe {
    fn drop(&mut self) {
        for id in self.registrations.drain(..) {
            signal_hook::low_level::unregister(id);
        }
    }
}

/// Cloneable handle that wakes a `WakePipe` from any thread.
#[derive(Debug, Clone)]
pub struct Waker {
    writer: Arc<UnixStream>,
}

impl Waker {
    pub fn wake(&self) {
        // A full pipe already guarantees a pending wakeup
        let _ = (&*self.writer).write(&[1]);
    }
}

/// Shared flag for requesting an orderly shutdown of the event loop.
///
/// Setting the flag alone is not enough for a loop blocked in `poll`, so the
/// handle also carries a `Waker` for the loop's control pipe.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    requested: Arc<AtomicBool>,
    waker: Waker,
}

impl ShutdownHandle {
    pub fn new(waker: Waker) -> Self {
        Self {
            requested: Arc::new(AtomicBool::new(false)),
            waker,
        }
    }

    /// Ask the loop to shut down at the top of its next iteration.
    pub fn request(&self) {
        self.requested.store(true, Ordering::SeqCst);
        self.waker.wake();
    }

    #[must_use]
    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Route SIGINT and SIGTERM into this handle.
    ///
    /// The flag is registered before the pipe write so that a loop woken by
    /// the byte always observes the flag already set.
    pub fn install_termination_signals(&self, pipe: &mut WakePipe) -> Result<()> {
        for signal in [SIGINT, SIGTERM] {
            signal_hook::flag::register(signal, Arc::clone(&self.requested))
                .map_err(|e| Error::signal(signal, e))?;
            pipe.notify_on(signal)?;
        }
        Ok(())
    }
}
