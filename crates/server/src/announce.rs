//! Delivery of protocol lines to clients, mirrored to the server log
//!
//! Delivery is at-most-once: a short or would-block write is reported as
//! [`Delivery::Incomplete`] and the rest of the line is dropped. Nothing is
//! queued or retried.

use crate::client::ClientTable;
use jobd_core::{constants::NETWORK_NEWLINE_LEN, ClientId, Error, Result};
use std::fmt;
use std::io::{ErrorKind, Write};

/// Outcome of writing one line to one client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Complete,
    Incomplete,
}

pub struct Announcer {
    log: Box<dyn Write + Send>,
    max_line: usize,
}

impl fmt::Debug for Announcer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Announcer")
            .field("max_line", &self.max_line)
            .finish_non_exhaustive()
    }
}

impl Announcer {
    /// `buffer_capacity` is the stream buffer size; one line may use all of it
    /// except the `\r\n` framing.
    pub fn new(log: Box<dyn Write + Send>, buffer_capacity: usize) -> Self {
        Self {
            log,
            max_line: buffer_capacity.saturating_sub(NETWORK_NEWLINE_LEN),
        }
    }

    pub fn max_line(&self) -> usize {
        self.max_line
    }

    /// Write a server-only event to the log stream.
    pub fn log_line(&mut self, text: &str) {
        if let Err(e) = writeln!(self.log, "{text}").and_then(|()| self.log.flush()) {
            tracing::warn!(error = %e, "failed to write server log");
        }
    }

    /// Cut `text` down to one line's worth of bytes on a char boundary.
    pub fn fit(&self, mut text: String) -> String {
        if text.len() > self.max_line {
            let mut cut = self.max_line;
            while !text.is_char_boundary(cut) {
                cut -= 1;
            }
            text.truncate(cut);
        }
        text
    }

    /// Send one line to `dest` and mirror it to the log.
    pub fn send_line<W: Write>(&mut self, dest: W, text: &str) -> Result<Delivery> {
        self.check_len(text)?;
        self.log_line(text);
        Self::deliver(dest, text)
    }

    /// Render, silently truncate, then [`send_line`](Self::send_line).
    pub fn send_formatted<W: Write>(
        &mut self,
        dest: W,
        args: fmt::Arguments<'_>,
    ) -> Result<Delivery> {
        let text = self.fit(fmt::format(args));
        self.send_line(dest, &text)
    }

    /// Send one line to every watcher still connected.
    ///
    /// The line is logged once however many watchers receive it, and one
    /// watcher's failure never prevents delivery to the rest. Returns how many
    /// watchers got the whole line.
    pub fn broadcast<I>(&mut self, clients: &ClientTable, watchers: I, text: &str) -> usize
    where
        I: IntoIterator<Item = ClientId>,
    {
        if let Err(e) = self.check_len(text) {
            tracing::warn!(error = %e, "broadcast rejected");
            return 0;
        }
        self.log_line(text);

        let mut delivered = 0;
        for id in watchers {
            let Some(client) = clients.get(id) else {
                continue;
            };
            match Self::deliver(client.stream(), text) {
                Ok(Delivery::Complete) => delivered += 1,
                Ok(Delivery::Incomplete) => {
                    tracing::warn!(client_id = %id, "incomplete write to watcher");
                }
                Err(e) => tracing::warn!(client_id = %id, error = %e, "write to watcher failed"),
            }
        }
        delivered
    }

    fn check_len(&self, text: &str) -> Result<()> {
        if text.len() > self.max_line {
            return Err(Error::message_too_large(text.len(), self.max_line));
        }
        Ok(())
    }

    fn deliver<W: Write>(mut dest: W, text: &str) -> Result<Delivery> {
        let mut framed = Vec::with_capacity(text.len() + NETWORK_NEWLINE_LEN);
        framed.extend_from_slice(text.as_bytes());
        framed.extend_from_slice(b"\r\n");

        match dest.write(&framed) {
            Ok(n) if n == framed.len() => Ok(Delivery::Complete),
            Ok(_) => Ok(Delivery::Incomplete),
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::Interrupted) => {
                Ok(Delivery::Incomplete)
            }
            Err(e) => Err(Error::io("write to client", e)),
        }
    }
}
