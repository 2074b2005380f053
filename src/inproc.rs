//! In-process channel transport.
//!
//! The built-in transport: links between sockets in the same process are a
//! pair of bounded `flume` channels, one per direction. Queue depth comes
//! from the dialing socket's high water marks, so `is_full`/`is_empty` double
//! as the writable/readable probes the poll set relies on.
//!
//! Bound names live in a global registry, each tagged with the binding
//! socket's pattern so a dial from an incompatible pattern is refused.
//! Connect-before-bind is supported: a dialed link whose name is not yet
//! bound parks in a pending table and is delivered to the listener when the
//! name is bound, mirroring asynchronous connection establishment. Parked
//! links whose dialer has since gone away are pruned rather than delivered.

use crate::address::Address;
use crate::error::{FilamentError, Result};
use crate::message::Message;
use crate::pattern::Pattern;
use crate::transport::{Connection, Listener, Transport};
use dashmap::DashMap;
use flume::{Receiver, Sender};
use once_cell::sync::Lazy;
use tracing::debug;

struct BoundName {
    pattern: Pattern,
    accept_tx: Sender<InprocConnection>,
}

/// A link dialed before its name was bound, held until a bind shows up.
struct ParkedLink {
    pattern: Pattern,
    conn: InprocConnection,
}

/// Accept queue for each bound name.
static BOUND: Lazy<DashMap<String, BoundName>> = Lazy::new(DashMap::new);

/// Links dialed before their name was bound.
static PENDING: Lazy<DashMap<String, Vec<ParkedLink>>> = Lazy::new(DashMap::new);

/// The in-process transport, registered by default for `inproc://`.
pub struct InprocTransport;

impl Transport for InprocTransport {
    fn scheme(&self) -> &'static str {
        "inproc"
    }

    fn listen(&self, addr: &Address, pattern: Pattern) -> Result<Box<dyn Listener>> {
        let name = inproc_name(addr)?;
        let (accept_tx, accept_rx) = flume::unbounded();

        if BOUND.contains_key(name) {
            return Err(FilamentError::transport(format!(
                "inproc address '{name}' is already bound"
            )));
        }
        BOUND.insert(
            name.to_string(),
            BoundName {
                pattern,
                accept_tx: accept_tx.clone(),
            },
        );

        // deliver links that dialed this name before it was bound, dropping
        // any whose dialer has gone away or whose pattern cannot pair
        if let Some((_, parked)) = PENDING.remove(name) {
            for link in parked {
                if link.conn.is_open() && pattern.is_compatible(link.pattern) {
                    let _ = accept_tx.send(link.conn);
                }
            }
        }

        debug!(name, %pattern, "inproc endpoint bound");
        Ok(Box::new(InprocListener {
            name: name.to_string(),
            accept_rx,
        }))
    }

    fn dial(
        &self,
        addr: &Address,
        pattern: Pattern,
        send_hwm: usize,
        recv_hwm: usize,
    ) -> Result<Box<dyn Connection>> {
        let name = inproc_name(addr)?;

        // one bounded channel per direction; the dialer's HWMs set the depth
        let (out_tx, out_rx) = flume::bounded(send_hwm.max(1));
        let (in_tx, in_rx) = flume::bounded(recv_hwm.max(1));

        let local = InprocConnection {
            tx: out_tx,
            rx: in_rx,
        };
        let remote = InprocConnection {
            tx: in_tx,
            rx: out_rx,
        };

        let parked = match BOUND.get(name) {
            Some(bound) => {
                if !pattern.is_compatible(bound.pattern) {
                    return Err(FilamentError::transport(format!(
                        "cannot dial '{name}': {pattern} does not pair with {}",
                        bound.pattern
                    )));
                }
                match bound.accept_tx.send(remote) {
                    Ok(()) => None,
                    // listener just went away; SendError hands the link back
                    Err(flume::SendError(conn)) => Some(conn),
                }
            }
            None => Some(remote),
        };
        let delivered = parked.is_none();
        if let Some(conn) = parked {
            // name not bound yet; park the peer half until a bind shows up
            let mut entry = PENDING.entry(name.to_string()).or_default();
            entry.retain(|link| link.conn.is_open());
            entry.push(ParkedLink { pattern, conn });
        }

        debug!(name, %pattern, delivered, "inproc link dialed");
        Ok(Box::new(local))
    }
}

fn inproc_name(addr: &Address) -> Result<&str> {
    match addr {
        Address::Inproc(name) => Ok(name),
        other => Err(FilamentError::transport(format!(
            "inproc transport cannot handle '{other}'"
        ))),
    }
}

/// Listener half of a bound inproc name.
pub struct InprocListener {
    name: String,
    accept_rx: Receiver<InprocConnection>,
}

impl Listener for InprocListener {
    fn try_accept(&self) -> Result<Option<Box<dyn Connection>>> {
        match self.accept_rx.try_recv() {
            Ok(conn) => Ok(Some(Box::new(conn))),
            Err(_) => Ok(None),
        }
    }
}

impl Drop for InprocListener {
    fn drop(&mut self) {
        // free the name so it can be bound again
        BOUND.remove(&self.name);
        debug!(name = %self.name, "inproc endpoint unbound");
    }
}

/// One half of an inproc link.
pub struct InprocConnection {
    tx: Sender<Message>,
    rx: Receiver<Message>,
}

impl Connection for InprocConnection {
    fn try_send(&self, msg: &Message) -> Result<bool> {
        // a full queue and a departed peer both read as "not writable";
        // is_open reports the departure so the socket layer prunes the link
        Ok(self.tx.try_send(msg.clone()).is_ok())
    }

    fn try_recv(&self) -> Result<Option<Message>> {
        Ok(self.rx.try_recv().ok())
    }

    fn readable(&self) -> bool {
        !self.rx.is_empty()
    }

    fn writable(&self) -> bool {
        !self.tx.is_disconnected() && !self.tx.is_full()
    }

    fn is_open(&self) -> bool {
        // keep a dead link around while inbound messages remain to drain
        !self.tx.is_disconnected() || !self.rx.is_empty()
    }
}
