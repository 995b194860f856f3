//! The descriptor set the control loop blocks on
//!
//! A `WatchSet` is rebuilt from the tables on every iteration and borrows
//! every descriptor it holds, so it can never outlive a client or job that
//! was removed during the previous dispatch.

use crate::job::StreamKind;
use jobd_core::{ClientId, Error, Pid, Result};
use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, RawFd};

/// What a ready descriptor belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    Listener,
    /// Programmatic wakeups and termination signals
    Control,
    /// SIGCHLD notifications
    ChildExit,
    Client(ClientId),
    Job(Pid, StreamKind),
}

/// Outcome of one blocking wait.
#[derive(Debug, PartialEq, Eq)]
pub enum Wake {
    /// Tokens of every descriptor with events, in registration order
    Ready(Vec<Token>),
    /// A signal arrived while blocked
    Interrupted,
}

#[derive(Debug, Default)]
pub struct WatchSet<'fd> {
    fds: Vec<PollFd<'fd>>,
    tokens: Vec<Token>,
    highest: Option<RawFd>,
}

impl<'fd> WatchSet<'fd> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, fd: BorrowedFd<'fd>, token: Token) {
        let raw = fd.as_raw_fd();
        self.highest = Some(self.highest.map_or(raw, |h| h.max(raw)));
        self.fds.push(PollFd::new(fd, PollFlags::POLLIN));
        self.tokens.push(token);
    }

    pub fn add_source<S: AsFd>(&mut self, source: &'fd S, token: Token) {
        self.add(source.as_fd(), token);
    }

    pub fn len(&self) -> usize {
        self.fds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fds.is_empty()
    }

    pub fn highest_fd(&self) -> Option<RawFd> {
        self.highest
    }

    /// Block until at least one descriptor has events or a signal interrupts.
    ///
    /// Hangup and error conditions count as ready: the owner finds out what
    /// happened on its next read.
    pub fn wait(&mut self) -> Result<Wake> {
        match poll(&mut self.fds, PollTimeout::NONE) {
            Ok(_) => {}
            Err(Errno::EINTR) => return Ok(Wake::Interrupted),
            Err(errno) => return Err(Error::io("poll", errno.into())),
        }

        let ready = self
            .fds
            .iter()
            .zip(&self.tokens)
            .filter(|(fd, _)| fd.revents().is_some_and(|events| !events.is_empty()))
            .map(|(_, token)| *token)
            .collect();
        Ok(Wake::Ready(ready))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::os::unix::net::UnixStream;

    #[test]
    fn test_only_readable_descriptors_are_reported() {
        let (quiet, _quiet_peer) = UnixStream::pair().unwrap();
        let (loud, mut loud_peer) = UnixStream::pair().unwrap();
        loud_peer.write_all(b"x").unwrap();

        let mut set = WatchSet::new();
        set.add_source(&quiet, Token::Control);
        set.add_source(&loud, Token::Client(ClientId::new(3)));
        assert_eq!(set.len(), 2);
        assert_eq!(
            set.highest_fd(),
            Some(quiet.as_raw_fd().max(loud.as_raw_fd()))
        );

        assert_eq!(
            set.wait().unwrap(),
            Wake::Ready(vec![Token::Client(ClientId::new(3))])
        );
    }

    #[test]
    fn test_hangup_counts_as_ready() {
        let (stream, peer) = UnixStream::pair().unwrap();
        drop(peer);

        let mut set = WatchSet::new();
        set.add_source(&stream, Token::Job(Pid::new(9), StreamKind::Stderr));
        assert_eq!(
            set.wait().unwrap(),
            Wake::Ready(vec![Token::Job(Pid::new(9), StreamKind::Stderr)])
        );
    }
}
