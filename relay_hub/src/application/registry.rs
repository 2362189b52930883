use std::{collections::BTreeMap, fmt, sync::Arc};

use actix::prelude::*;
use relay_client::message::{encode, PeerId};
use tracing::{debug, info, warn};

use super::events::Notifier;

/// Name the hub gives an accepted connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionName(u64);

impl fmt::Display for ConnectionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "user{}", self.0)
    }
}

/// What the registry asks a connection to put on its socket.
#[derive(Message, Debug, Clone, PartialEq, Eq)]
#[rtype(result = "()")]
pub enum Outgoing {
    Text(String),
    Close,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum Error {
    #[error("Hub is shutting down")]
    ShuttingDown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registered {
    pub name: ConnectionName,
    /// Connections including the new one.
    pub count: usize,
}

#[derive(Message)]
#[rtype(result = "Result<Registered, Error>")]
pub struct Register {
    pub addr: Recipient<Outgoing>,
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct Unregister {
    pub name: ConnectionName,
}

/// Raw text for every registered connection, the sender included.
#[derive(Message)]
#[rtype(result = "usize")]
pub struct Broadcast(pub String);

/// Closes every connection and refuses new registrations.
#[derive(Message)]
#[rtype(result = "usize")]
pub struct Shutdown;

#[derive(Message)]
#[rtype(result = "usize")]
pub struct Count;

/// Live connections of a running hub.
///
/// Every mutation goes through the actor mailbox, so membership changes are
/// serialized while the socket writes happen in each connection's own actor.
pub struct Registry {
    next_id: u64,
    connections: BTreeMap<ConnectionName, Recipient<Outgoing>>,
    closed: bool,
    notifier: Arc<Notifier>,
}

impl Registry {
    pub fn new(notifier: Arc<Notifier>) -> Self {
        Self {
            next_id: 0,
            connections: BTreeMap::new(),
            closed: false,
            notifier,
        }
    }

    /// Hands `msg` to every connection. Connections whose actor is gone are
    /// dropped from the registry.
    fn deliver(&mut self, msg: Outgoing) -> usize {
        let mut delivered = 0;
        let mut dead = Vec::new();
        for (name, recipient) in &self.connections {
            match recipient.try_send(msg.clone()) {
                Ok(()) => delivered += 1,
                Err(SendError::Full(msg)) => {
                    recipient.do_send(msg);
                    delivered += 1;
                }
                Err(SendError::Closed(_)) => {
                    warn!(%name, "Connection gone, dropping it");
                    dead.push(*name);
                }
            }
        }
        for name in dead {
            self.connections.remove(&name);
            self.notifier.log("server", format!("Removing {name}!"));
        }
        delivered
    }
}

impl Actor for Registry {
    type Context = Context<Self>;
}

impl Handler<Register> for Registry {
    type Result = Result<Registered, Error>;

    fn handle(&mut self, msg: Register, _: &mut Self::Context) -> Self::Result {
        if self.closed {
            return Err(Error::ShuttingDown);
        }
        let name = ConnectionName(self.next_id);
        self.next_id += 1;
        self.connections.insert(name, msg.addr);
        let count = self.connections.len();
        info!(%name, count, "Connection registered");
        self.notifier.log("server", "server client added");
        Ok(Registered { name, count })
    }
}

impl Handler<Unregister> for Registry {
    type Result = ();

    fn handle(&mut self, msg: Unregister, _: &mut Self::Context) -> Self::Result {
        if self.connections.remove(&msg.name).is_none() {
            debug!(name = %msg.name, "Already unregistered");
            return;
        }
        info!(name = %msg.name, count = self.connections.len(), "Connection unregistered");
        self.notifier.log("server", format!("Removing {}!", msg.name));
        if !self.closed {
            let notice = encode(&PeerId::system(), &format!("exits {}", msg.name));
            self.deliver(Outgoing::Text(notice));
        }
    }
}

impl Handler<Broadcast> for Registry {
    type Result = usize;

    fn handle(&mut self, msg: Broadcast, _: &mut Self::Context) -> Self::Result {
        let delivered = self.deliver(Outgoing::Text(msg.0));
        debug!(delivered, "Broadcast");
        delivered
    }
}

impl Handler<Shutdown> for Registry {
    type Result = usize;

    fn handle(&mut self, _: Shutdown, _: &mut Self::Context) -> Self::Result {
        self.closed = true;
        let closed = self.deliver(Outgoing::Close);
        self.connections.clear();
        info!(closed, "Registry shut down");
        closed
    }
}

impl Handler<Count> for Registry {
    type Result = usize;

    fn handle(&mut self, _: Count, _: &mut Self::Context) -> Self::Result {
        self.connections.len()
    }
}
