//! Per-socket endpoint registry.
//!
//! An endpoint is one bound or connected attachment of a socket. Ids are
//! monotonically increasing within the owning socket's lifetime and are never
//! reused after shutdown, so a stale id always fails `UnknownEndpoint`
//! instead of silently naming a newer endpoint.

use crate::address::Address;
use crate::transport::Listener;
use std::collections::BTreeMap;
use std::fmt;

/// Identifier of an endpoint, unique within its owning socket's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EndpointId(u32);

impl EndpointId {
    /// The raw integer value.
    #[must_use]
    pub const fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Whether an endpoint listens or dials.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Passive: created by `bind`, owns a transport listener.
    Bind,
    /// Active: created by `connect`, its link lives in the socket's peer set.
    Connect,
}

/// One live endpoint owned by a socket.
pub(crate) struct Endpoint {
    pub id: EndpointId,
    pub direction: Direction,
    pub address: Address,
    /// Present for `Bind` endpoints only.
    pub listener: Option<Box<dyn Listener>>,
}

/// The socket's endpoint table. Insertion order is id order.
#[derive(Default)]
pub(crate) struct EndpointRegistry {
    entries: BTreeMap<EndpointId, Endpoint>,
    next_id: u32,
}

impl EndpointRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an endpoint, assigning the next id. Ids never recycle.
    pub fn insert(
        &mut self,
        direction: Direction,
        address: Address,
        listener: Option<Box<dyn Listener>>,
    ) -> EndpointId {
        let id = EndpointId(self.next_id);
        self.next_id += 1;
        self.entries.insert(
            id,
            Endpoint {
                id,
                direction,
                address,
                listener,
            },
        );
        id
    }

    /// Remove an endpoint, returning it for teardown.
    pub fn remove(&mut self, id: EndpointId) -> Option<Endpoint> {
        self.entries.remove(&id)
    }

    pub fn contains(&self, id: EndpointId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Endpoint> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Drop every endpoint (socket close). Listeners unbind on drop.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
