//! Connected clients

use indexmap::IndexMap;
use jobd_core::{ClientId, Error, Result};
use jobd_protocol::StreamBuffer;
use std::net::{SocketAddr, TcpStream};
use std::os::fd::{AsFd, BorrowedFd};

/// One accepted connection and its inbound line buffer.
#[derive(Debug)]
pub struct Client {
    id: ClientId,
    peer: SocketAddr,
    pub(crate) stream: TcpStream,
    pub(crate) buffer: StreamBuffer,
}

impl Client {
    pub fn id(&self) -> ClientId {
        self.id
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn stream(&self) -> &TcpStream {
        &self.stream
    }
}

impl AsFd for Client {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.stream.as_fd()
    }
}

/// Capacity-bounded table of clients in accept order.
#[derive(Debug)]
pub struct ClientTable {
    clients: IndexMap<ClientId, Client>,
    next_id: u64,
    max_clients: usize,
    buffer_capacity: usize,
}

impl ClientTable {
    pub fn new(max_clients: usize, buffer_capacity: usize) -> Self {
        Self {
            clients: IndexMap::with_capacity(max_clients),
            next_id: 1,
            max_clients,
            buffer_capacity,
        }
    }

    pub fn has_capacity(&self) -> bool {
        self.clients.len() < self.max_clients
    }

    /// Register an accepted stream. The stream is switched to non-blocking so
    /// that a client that stops reading can never stall the control loop.
    pub fn insert(&mut self, stream: TcpStream, peer: SocketAddr) -> Result<ClientId> {
        if !self.has_capacity() {
            return Err(Error::capacity("clients", self.max_clients));
        }
        stream
            .set_nonblocking(true)
            .map_err(|e| Error::io(format!("configure connection from {peer}"), e))?;

        let id = ClientId::new(self.next_id);
        self.next_id += 1;
        self.clients.insert(
            id,
            Client {
                id,
                peer,
                stream,
                buffer: StreamBuffer::new(self.buffer_capacity),
            },
        );
        Ok(id)
    }

    /// Unregister a client; dropping the returned value closes its socket.
    pub fn remove(&mut self, id: ClientId) -> Option<Client> {
        self.clients.shift_remove(&id)
    }

    pub fn get(&self, id: ClientId) -> Option<&Client> {
        self.clients.get(&id)
    }

    pub fn get_mut(&mut self, id: ClientId) -> Option<&mut Client> {
        self.clients.get_mut(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Client> {
        self.clients.values()
    }

    pub fn ids(&self) -> Vec<ClientId> {
        self.clients.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Remove every client, in accept order.
    pub fn drain(&mut self) -> impl Iterator<Item = Client> + '_ {
        self.clients.drain(..).map(|(_, client)| client)
    }
}
