//! Transport abstraction and scheme registry.
//!
//! The core owns no I/O machinery of its own: byte delivery is delegated to
//! [`Transport`] implementations selected by address scheme. A transport
//! exposes a synchronous, poll-able surface of non-blocking try-operations
//! plus readiness probes, which is all the socket layer and the poll set
//! need to build blocking semantics on top.
//!
//! The `inproc` transport is registered out of the box; `tcp://` and
//! `ipc://` addresses parse but route to whatever implementation the host
//! registers via [`register_transport`].

use crate::address::Address;
use crate::error::{FilamentError, Result};
use crate::message::Message;
use crate::pattern::Pattern;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use std::sync::Arc;

/// One established bidirectional link to a peer.
///
/// All operations are non-blocking; `is_open` turning false tells the socket
/// layer to discard the link.
pub trait Connection: Send {
    /// Attempt to hand a message to the peer's queue.
    ///
    /// Returns `Ok(true)` when accepted, `Ok(false)` when the queue is full
    /// or the link can no longer accept messages.
    fn try_send(&self, msg: &Message) -> Result<bool>;

    /// Attempt to take the next inbound message. `Ok(None)` means the queue
    /// is empty right now.
    fn try_recv(&self) -> Result<Option<Message>>;

    /// True if an inbound message is waiting.
    fn readable(&self) -> bool;

    /// True if the peer's queue would accept a message right now.
    fn writable(&self) -> bool;

    /// False once the link is dead and fully drained.
    fn is_open(&self) -> bool;
}

/// A passive endpoint accepting inbound links.
pub trait Listener: Send {
    /// Accept one pending inbound link, if any.
    fn try_accept(&self) -> Result<Option<Box<dyn Connection>>>;
}

/// A transport implementation for one address scheme.
///
/// Both endpoint operations carry the socket's pattern so the transport can
/// refuse links between incompatible patterns
/// (see [`Pattern::is_compatible`]).
pub trait Transport: Send + Sync {
    /// The address scheme this transport serves (`"inproc"`, `"tcp"`, ...).
    fn scheme(&self) -> &'static str;

    /// Begin listening on an address.
    fn listen(&self, addr: &Address, pattern: Pattern) -> Result<Box<dyn Listener>>;

    /// Dial an address. Establishment is asynchronous: the returned link may
    /// still be settling, and later failures surface as transport errors on
    /// use, not here. `send_hwm`/`recv_hwm` bound the link's queue depths.
    fn dial(
        &self,
        addr: &Address,
        pattern: Pattern,
        send_hwm: usize,
        recv_hwm: usize,
    ) -> Result<Box<dyn Connection>>;
}

static TRANSPORTS: Lazy<DashMap<&'static str, Arc<dyn Transport>>> = Lazy::new(|| {
    let registry: DashMap<&'static str, Arc<dyn Transport>> = DashMap::new();
    registry.insert(
        "inproc",
        Arc::new(crate::inproc::InprocTransport) as Arc<dyn Transport>,
    );
    registry
});

/// Register a transport for its scheme, replacing any previous registration.
pub fn register_transport(transport: Arc<dyn Transport>) {
    TRANSPORTS.insert(transport.scheme(), transport);
}

/// Look up the transport serving an address's scheme.
pub(crate) fn transport_for(addr: &Address) -> Result<Arc<dyn Transport>> {
    TRANSPORTS
        .get(addr.scheme())
        .map(|entry| Arc::clone(entry.value()))
        .ok_or_else(|| {
            FilamentError::transport(format!(
                "no transport registered for scheme '{}'",
                addr.scheme()
            ))
        })
}
