//! Messaging sockets and the pattern engine.
//!
//! A [`Socket`] is a cheap handle over a mutex-guarded core, so a poll set
//! can hold non-owning weak references while the caller keeps the socket.
//! Blocking `send`/`recv` are bounded polling loops over the transport's
//! non-blocking try-operations; the lock is released between scan rounds, so
//! a blocked call never wedges other operations on the same socket.
//!
//! Routing rules per pattern:
//! - PUB broadcasts to every connected peer with queue space (a slow
//!   subscriber drops the message, it never blocks the publisher).
//! - SUB filters on receive; a message matching no subscription is dropped
//!   silently and never surfaces to the caller.
//! - PUSH round-robins over writable peers; PULL fair-queues on receive.
//! - REQ/REP stamp a 4-byte request id and enforce strict alternation;
//!   REP remembers which peer a request came from so the reply routes back.
//! - BUS broadcasts to all peers (no loop-back: a socket never holds a link
//!   to itself).
//! - SURVEYOR stamps a survey id and deadline; stale or late responses are
//!   dropped.

use crate::endpoint::{Direction, EndpointId, EndpointRegistry};
use crate::error::{FilamentError, Result};
use crate::message::Message;
use crate::options::{SocketOption, SocketOptions};
use crate::pattern::Pattern;
use crate::subscription::SubscriptionSet;
use crate::transport::{transport_for, Connection};
use crate::Address;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// How long a blocking operation sleeps between readiness scans.
const SCAN_INTERVAL: Duration = Duration::from_millis(1);

/// Per-call flags for `send` and `recv`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Flags {
    /// Return the would-block signal instead of waiting.
    pub dont_wait: bool,
}

impl Flags {
    /// Blocking operation (subject to the socket's timeouts).
    pub const NONE: Self = Self { dont_wait: false };
    /// Non-blocking operation.
    pub const DONTWAIT: Self = Self { dont_wait: true };
}

/// A messaging socket.
///
/// Cloning yields another handle to the same socket. `send`/`recv` return
/// `Ok(None)` for the would-block condition; that is a transient-availability
/// signal, never a fault.
#[derive(Clone)]
pub struct Socket {
    core: Arc<Mutex<SocketCore>>,
}

impl Socket {
    /// Open a socket with the given pattern and default options.
    #[must_use]
    pub fn open(pattern: Pattern) -> Self {
        Self::with_options(pattern, SocketOptions::default())
    }

    /// Open a socket with explicit options.
    #[must_use]
    pub fn with_options(pattern: Pattern, options: SocketOptions) -> Self {
        debug!(%pattern, "socket opened");
        Self {
            core: Arc::new(Mutex::new(SocketCore {
                pattern,
                options,
                endpoints: EndpointRegistry::new(),
                peers: Vec::new(),
                next_peer_key: 0,
                state: PatternState::for_pattern(pattern),
                pending_rx: None,
                closed: false,
            })),
        }
    }

    /// The socket's pattern (immutable after creation).
    #[must_use]
    pub fn pattern(&self) -> Pattern {
        self.core.lock().pattern
    }

    /// Create a passive endpoint; the transport starts listening now.
    ///
    /// # Errors
    ///
    /// `Address` for malformed address strings, `Transport` if the listen
    /// fails (e.g. name already bound), `SocketClosed` after close.
    pub fn bind(&self, addr: &str) -> Result<EndpointId> {
        let address: Address = addr.parse()?;
        let transport = transport_for(&address)?;
        let mut core = self.core.lock();
        core.ensure_open()?;
        let listener = transport.listen(&address, core.pattern)?;
        let id = core
            .endpoints
            .insert(Direction::Bind, address.clone(), Some(listener));
        debug!(%address, endpoint = %id, "socket bound");
        Ok(id)
    }

    /// Create an active endpoint; dialing is asynchronous, so establishment
    /// failures surface later as transport errors rather than here. Dials
    /// the transport can reject up front (unknown scheme, or a bound inproc
    /// name with an incompatible pattern) do fail immediately.
    pub fn connect(&self, addr: &str) -> Result<EndpointId> {
        let address: Address = addr.parse()?;
        let transport = transport_for(&address)?;
        let mut core = self.core.lock();
        core.ensure_open()?;
        let conn = transport.dial(
            &address,
            core.pattern,
            core.options.send_hwm,
            core.options.recv_hwm,
        )?;
        let id = core.endpoints.insert(Direction::Connect, address.clone(), None);
        core.add_peer(id, conn);
        debug!(%address, endpoint = %id, "socket connected");
        Ok(id)
    }

    /// Tear down one endpoint and every link it produced.
    ///
    /// # Errors
    ///
    /// `UnknownEndpoint` if the id does not belong to this socket, including
    /// ids invalidated by `close`.
    pub fn shutdown(&self, id: EndpointId) -> Result<()> {
        let mut core = self.core.lock();
        if core.closed || !core.endpoints.contains(id) {
            return Err(FilamentError::UnknownEndpoint(id));
        }
        if let Some(ep) = core.endpoints.remove(id) {
            debug!(endpoint = %id, address = %ep.address, direction = ?ep.direction, "endpoint shut down");
        }
        core.drop_peers_of(id);
        Ok(())
    }

    /// Send a message, routed per the socket's pattern.
    ///
    /// Returns `Ok(Some(len))` with the payload length on success and
    /// `Ok(None)` when no peer is ready (non-blocking mode, or the send
    /// timeout elapsed). No message is consumed in the would-block case.
    pub fn send(&self, msg: impl Into<Message>, flags: Flags) -> Result<Option<usize>> {
        let msg = msg.into();
        let deadline = {
            let core = self.core.lock();
            core.ensure_open()?;
            deadline_for(flags, core.options.send_timeout)
        };
        loop {
            {
                let mut core = self.core.lock();
                core.ensure_open()?;
                if let Some(sent) = core.route_send(&msg)? {
                    return Ok(Some(sent));
                }
            }
            match deadline {
                Wait::No => return Ok(None),
                Wait::Until(t) if Instant::now() >= t => return Ok(None),
                _ => std::thread::sleep(SCAN_INTERVAL),
            }
        }
    }

    /// Receive the next message the pattern delivers.
    ///
    /// `Ok(None)` is the would-block signal: nothing deliverable right now
    /// (non-blocking mode, or the receive timeout elapsed).
    pub fn recv(&self, flags: Flags) -> Result<Option<Message>> {
        let deadline = {
            let core = self.core.lock();
            core.ensure_open()?;
            deadline_for(flags, core.options.recv_timeout)
        };
        loop {
            {
                let mut core = self.core.lock();
                core.ensure_open()?;
                if let Some(msg) = core.next_message()? {
                    return Ok(Some(msg));
                }
            }
            match deadline {
                Wait::No => return Ok(None),
                Wait::Until(t) if Instant::now() >= t => return Ok(None),
                _ => std::thread::sleep(SCAN_INTERVAL),
            }
        }
    }

    /// Apply a typed option.
    ///
    /// # Errors
    ///
    /// `UnsupportedOption` when the option is not legal for this socket's
    /// pattern (e.g. `Subscribe` on anything but SUB).
    pub fn set_option(&self, option: SocketOption) -> Result<()> {
        let mut core = self.core.lock();
        core.ensure_open()?;
        core.set_option(option)
    }

    /// Apply a raw `(level, option, value)` triple; see
    /// [`SocketOption::from_raw`] for the encoding.
    pub fn set_option_raw(&self, level: i32, option: i32, value: &[u8]) -> Result<()> {
        self.set_option(SocketOption::from_raw(level, option, value)?)
    }

    /// Release all endpoints, links, and routing state.
    ///
    /// Idempotent: closing twice is a no-op. Any operation after close fails
    /// with `SocketClosed` (`shutdown` reports `UnknownEndpoint`, since no
    /// endpoint ids remain valid).
    pub fn close(&self) {
        let mut core = self.core.lock();
        if core.closed {
            return;
        }
        core.closed = true;
        debug!(
            pattern = %core.pattern,
            endpoints = core.endpoints.len(),
            peers = core.peers.len(),
            "socket closed"
        );
        core.peers.clear();
        core.endpoints.clear();
        core.pending_rx = None;
    }

    /// Weak reference to the core, used by poll sets.
    pub(crate) fn downgrade(&self) -> Weak<Mutex<SocketCore>> {
        Arc::downgrade(&self.core)
    }
}

#[derive(Clone, Copy)]
enum Wait {
    No,
    Forever,
    Until(Instant),
}

fn deadline_for(flags: Flags, timeout: Option<Duration>) -> Wait {
    if flags.dont_wait {
        return Wait::No;
    }
    match timeout {
        None => Wait::Forever,
        Some(d) if d.is_zero() => Wait::No,
        Some(d) => Wait::Until(Instant::now() + d),
    }
}

/// One live link to a peer, tagged with the endpoint that produced it.
pub(crate) struct Peer {
    key: u64,
    endpoint: EndpointId,
    conn: Box<dyn Connection>,
}

/// Per-pattern routing state, dispatched on the socket's pattern.
enum PatternState {
    Pair,
    Pub,
    Sub {
        subs: SubscriptionSet,
    },
    Req {
        next_id: u32,
        pending: Option<u32>,
        cursor: usize,
    },
    Rep {
        /// (peer key, request id) of the request awaiting a reply.
        backtrace: Option<(u64, u32)>,
        cursor: usize,
    },
    Push {
        cursor: usize,
    },
    Pull {
        cursor: usize,
    },
    Bus {
        cursor: usize,
    },
    Surveyor {
        next_id: u32,
        /// (survey id, response deadline) of the survey in flight.
        active: Option<(u32, Instant)>,
        cursor: usize,
    },
    Respondent {
        backtrace: Option<(u64, u32)>,
        cursor: usize,
    },
}

impl PatternState {
    fn for_pattern(pattern: Pattern) -> Self {
        match pattern {
            Pattern::Pair => Self::Pair,
            Pattern::Pub => Self::Pub,
            Pattern::Sub => Self::Sub {
                subs: SubscriptionSet::new(),
            },
            Pattern::Req => Self::Req {
                next_id: 0,
                pending: None,
                cursor: 0,
            },
            Pattern::Rep => Self::Rep {
                backtrace: None,
                cursor: 0,
            },
            Pattern::Push => Self::Push { cursor: 0 },
            Pattern::Pull => Self::Pull { cursor: 0 },
            Pattern::Bus => Self::Bus { cursor: 0 },
            Pattern::Surveyor => Self::Surveyor {
                next_id: 0,
                active: None,
                cursor: 0,
            },
            Pattern::Respondent => Self::Respondent {
                backtrace: None,
                cursor: 0,
            },
        }
    }
}

pub(crate) struct SocketCore {
    pattern: Pattern,
    options: SocketOptions,
    endpoints: EndpointRegistry,
    peers: Vec<Peer>,
    next_peer_key: u64,
    state: PatternState,
    /// Single-slot buffer filled by readiness probes so poll does not
    /// consume messages ahead of `recv`.
    pending_rx: Option<Message>,
    closed: bool,
}

impl SocketCore {
    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            Err(FilamentError::SocketClosed)
        } else {
            Ok(())
        }
    }

    fn add_peer(&mut self, endpoint: EndpointId, conn: Box<dyn Connection>) {
        self.next_peer_key += 1;
        self.peers.push(Peer {
            key: self.next_peer_key,
            endpoint,
            conn,
        });
    }

    fn drop_peers_of(&mut self, endpoint: EndpointId) {
        self.peers.retain(|p| p.endpoint != endpoint);
    }

    /// Accept pending inbound links and discard dead ones.
    fn maintain(&mut self) {
        let mut accepted = Vec::new();
        for ep in self.endpoints.iter() {
            if let Some(listener) = ep.listener.as_ref() {
                while let Ok(Some(conn)) = listener.try_accept() {
                    accepted.push((ep.id, conn));
                }
            }
        }
        for (id, conn) in accepted {
            trace!(endpoint = %id, "peer link accepted");
            self.add_peer(id, conn);
        }
        self.peers.retain(|p| p.conn.is_open());
    }

    // --- send routing -----------------------------------------------------

    /// One non-blocking routing attempt. `Ok(None)` means no peer was ready.
    fn route_send(&mut self, msg: &Message) -> Result<Option<usize>> {
        if !self.pattern.can_send() {
            return Err(FilamentError::protocol(format!(
                "{} sockets cannot send",
                self.pattern
            )));
        }
        self.maintain();
        let len = msg.len();

        match &mut self.state {
            PatternState::Pair => {
                // one logical peer: the first open link carries the exchange
                match self.peers.first() {
                    Some(peer) => {
                        if peer.conn.try_send(msg)? {
                            Ok(Some(len))
                        } else {
                            Ok(None)
                        }
                    }
                    None => Ok(None),
                }
            }
            PatternState::Pub => {
                if self.peers.is_empty() {
                    return Ok(None);
                }
                for peer in &self.peers {
                    if !peer.conn.try_send(msg)? {
                        trace!(peer = peer.key, "subscriber queue full, message dropped");
                    }
                }
                Ok(Some(len))
            }
            PatternState::Bus { .. } => {
                if self.peers.is_empty() {
                    return Ok(None);
                }
                for peer in &self.peers {
                    if !peer.conn.try_send(msg)? {
                        trace!(peer = peer.key, "bus peer queue full, message dropped");
                    }
                }
                Ok(Some(len))
            }
            PatternState::Push { cursor } => {
                if send_round_robin(&self.peers, cursor, msg)? {
                    Ok(Some(len))
                } else {
                    Ok(None)
                }
            }
            PatternState::Req {
                next_id,
                pending,
                cursor,
            } => {
                if pending.is_some() {
                    return Err(FilamentError::protocol(
                        "REQ send already outstanding; receive the reply first",
                    ));
                }
                *next_id = next_id.wrapping_add(1);
                let id = *next_id | 0x8000_0000;
                let framed = stamp_request_id(id, msg);
                if send_round_robin(&self.peers, cursor, &framed)? {
                    *pending = Some(id);
                    trace!(request = id, "request dispatched");
                    Ok(Some(len))
                } else {
                    Ok(None)
                }
            }
            PatternState::Rep { backtrace, .. }
            | PatternState::Respondent { backtrace, .. } => {
                let Some((peer_key, id)) = *backtrace else {
                    return Err(FilamentError::protocol(
                        "no request pending; receive one before replying",
                    ));
                };
                let framed = stamp_request_id(id, msg);
                match self.peers.iter().find(|p| p.key == peer_key) {
                    Some(peer) => {
                        if peer.conn.try_send(&framed)? {
                            *backtrace = None;
                            Ok(Some(len))
                        } else {
                            Ok(None)
                        }
                    }
                    None => {
                        // requester departed; the reply has nowhere to go
                        trace!(request = id, "requester gone, reply dropped");
                        *backtrace = None;
                        Ok(Some(len))
                    }
                }
            }
            PatternState::Surveyor {
                next_id, active, ..
            } => {
                if self.peers.is_empty() {
                    return Ok(None);
                }
                *next_id = next_id.wrapping_add(1);
                let id = *next_id | 0x8000_0000;
                let framed = stamp_request_id(id, msg);
                for peer in &self.peers {
                    if !peer.conn.try_send(&framed)? {
                        trace!(peer = peer.key, "respondent queue full, survey dropped");
                    }
                }
                // a new survey supersedes any survey still in flight
                *active = Some((id, Instant::now() + self.options.survey_deadline));
                trace!(survey = id, "survey dispatched");
                Ok(Some(len))
            }
            PatternState::Sub { .. } | PatternState::Pull { .. } => unreachable!(),
        }
    }

    // --- receive routing --------------------------------------------------

    /// Deliver the buffered message if one exists, otherwise pull one.
    fn next_message(&mut self) -> Result<Option<Message>> {
        if let Some(msg) = self.pending_rx.take() {
            return Ok(Some(msg));
        }
        self.route_recv()
    }

    /// One non-blocking delivery attempt. `Ok(None)` means nothing
    /// deliverable right now.
    fn route_recv(&mut self) -> Result<Option<Message>> {
        if !self.pattern.can_recv() {
            return Err(FilamentError::protocol(format!(
                "{} sockets cannot receive",
                self.pattern
            )));
        }
        self.maintain();

        match &mut self.state {
            PatternState::Pair => match self.peers.first() {
                Some(peer) => peer.conn.try_recv(),
                None => Ok(None),
            },
            PatternState::Pull { cursor } | PatternState::Bus { cursor } => {
                recv_fair_queue(&self.peers, cursor)
            }
            PatternState::Sub { subs } => {
                // drain until a matching message turns up; non-matching
                // messages are dropped silently
                loop {
                    let mut cursor = 0;
                    match recv_fair_queue(&self.peers, &mut cursor)? {
                        Some(msg) if subs.matches(msg.as_ref()) => {
                            return Ok(Some(msg))
                        }
                        Some(_) => {
                            trace!("message matched no subscription, dropped");
                        }
                        None => return Ok(None),
                    }
                }
            }
            PatternState::Req {
                pending, cursor, ..
            } => {
                let Some(expect) = *pending else {
                    return Err(FilamentError::protocol(
                        "no request outstanding; send one before receiving",
                    ));
                };
                loop {
                    match recv_fair_queue(&self.peers, cursor)? {
                        Some(msg) => match split_request_id(&msg) {
                            Some((id, body)) if id == expect => {
                                *pending = None;
                                return Ok(Some(body));
                            }
                            _ => trace!("stale or malformed reply dropped"),
                        },
                        None => return Ok(None),
                    }
                }
            }
            PatternState::Rep { backtrace, cursor }
            | PatternState::Respondent { backtrace, cursor } => loop {
                if backtrace.is_some() {
                    return Err(FilamentError::protocol(
                        "a request is already awaiting its reply; send it first",
                    ));
                }
                let len = self.peers.len();
                if len == 0 {
                    return Ok(None);
                }
                let start = *cursor % len;
                let mut pulled = None;
                for offset in 0..len {
                    let idx = (start + offset) % len;
                    if let Some(msg) = self.peers[idx].conn.try_recv()? {
                        *cursor = (idx + 1) % len;
                        pulled = Some((self.peers[idx].key, msg));
                        break;
                    }
                }
                match pulled {
                    Some((peer_key, msg)) => match split_request_id(&msg) {
                        Some((id, body)) => {
                            *backtrace = Some((peer_key, id));
                            return Ok(Some(body));
                        }
                        None => trace!("malformed request dropped"),
                    },
                    None => return Ok(None),
                }
            },
            PatternState::Surveyor { active, cursor, .. } => {
                let Some((survey_id, deadline)) = *active else {
                    return Err(FilamentError::protocol(
                        "no survey in flight; send one before receiving",
                    ));
                };
                if Instant::now() >= deadline {
                    *active = None;
                    return Err(FilamentError::protocol("survey deadline elapsed"));
                }
                loop {
                    match recv_fair_queue(&self.peers, cursor)? {
                        Some(msg) => match split_request_id(&msg) {
                            Some((id, body)) if id == survey_id => {
                                return Ok(Some(body))
                            }
                            _ => trace!("stale survey response dropped"),
                        },
                        None => return Ok(None),
                    }
                }
            }
            PatternState::Pub | PatternState::Push { .. } => unreachable!(),
        }
    }

    // --- readiness (poll support) ----------------------------------------

    /// True if `recv` would deliver a message right now. May buffer one
    /// message internally; `next_message` drains the buffer first.
    pub(crate) fn recv_ready(&mut self) -> bool {
        if self.closed || !self.pattern.can_recv() {
            return false;
        }
        if self.pending_rx.is_some() {
            return true;
        }
        match self.route_recv() {
            Ok(Some(msg)) => {
                self.pending_rx = Some(msg);
                true
            }
            _ => false,
        }
    }

    /// True if `send` would accept a message right now.
    pub(crate) fn send_ready(&mut self) -> bool {
        if self.closed || !self.pattern.can_send() {
            return false;
        }
        self.maintain();
        let any_writable = self.peers.iter().any(|p| p.conn.writable());
        match &self.state {
            PatternState::Pair => {
                matches!(self.peers.first(), Some(p) if p.conn.writable())
            }
            // broadcast patterns accept whenever any peer exists
            PatternState::Pub | PatternState::Bus { .. } => !self.peers.is_empty(),
            PatternState::Surveyor { .. } => !self.peers.is_empty(),
            PatternState::Push { .. } => any_writable,
            PatternState::Req { pending, .. } => pending.is_none() && any_writable,
            PatternState::Rep { backtrace, .. }
            | PatternState::Respondent { backtrace, .. } => match backtrace {
                Some((peer_key, _)) => self
                    .peers
                    .iter()
                    .find(|p| p.key == *peer_key)
                    // a departed requester makes the reply a (successful) drop
                    .map_or(true, |p| p.conn.writable()),
                None => false,
            },
            PatternState::Sub { .. } | PatternState::Pull { .. } => unreachable!(),
        }
    }

    fn set_option(&mut self, option: SocketOption) -> Result<()> {
        match option {
            SocketOption::Subscribe(prefix) => match &mut self.state {
                PatternState::Sub { subs } => {
                    subs.subscribe(prefix);
                    Ok(())
                }
                _ => Err(FilamentError::unsupported_option("subscribe", self.pattern)),
            },
            SocketOption::Unsubscribe(prefix) => match &mut self.state {
                PatternState::Sub { subs } => {
                    subs.unsubscribe(&prefix);
                    Ok(())
                }
                _ => Err(FilamentError::unsupported_option(
                    "unsubscribe",
                    self.pattern,
                )),
            },
            SocketOption::SurveyDeadline(deadline) => match self.state {
                PatternState::Surveyor { .. } => {
                    self.options.survey_deadline = deadline;
                    Ok(())
                }
                _ => Err(FilamentError::unsupported_option(
                    "survey deadline",
                    self.pattern,
                )),
            },
            SocketOption::RecvTimeout(t) => {
                self.options.recv_timeout = t;
                Ok(())
            }
            SocketOption::SendTimeout(t) => {
                self.options.send_timeout = t;
                Ok(())
            }
            SocketOption::Linger(t) => {
                self.options.linger = t;
                Ok(())
            }
            SocketOption::RecvHwm(depth) => {
                self.options.recv_hwm = depth;
                Ok(())
            }
            SocketOption::SendHwm(depth) => {
                self.options.send_hwm = depth;
                Ok(())
            }
        }
    }
}

/// Send to the next writable peer after `cursor`, round-robin.
fn send_round_robin(peers: &[Peer], cursor: &mut usize, msg: &Message) -> Result<bool> {
    let len = peers.len();
    if len == 0 {
        return Ok(false);
    }
    let start = *cursor % len;
    for offset in 0..len {
        let idx = (start + offset) % len;
        if peers[idx].conn.try_send(msg)? {
            *cursor = (idx + 1) % len;
            return Ok(true);
        }
    }
    Ok(false)
}

/// Take one message from the next readable peer after `cursor`, fair-queued.
fn recv_fair_queue(peers: &[Peer], cursor: &mut usize) -> Result<Option<Message>> {
    let len = peers.len();
    if len == 0 {
        return Ok(None);
    }
    let start = *cursor % len;
    for offset in 0..len {
        let idx = (start + offset) % len;
        if let Some(msg) = peers[idx].conn.try_recv()? {
            *cursor = (idx + 1) % len;
            return Ok(Some(msg));
        }
    }
    Ok(None)
}

/// Prefix a payload with a 4-byte big-endian request id.
fn stamp_request_id(id: u32, body: &Message) -> Message {
    let mut buf = Vec::with_capacity(4 + body.len());
    buf.extend_from_slice(&id.to_be_bytes());
    buf.extend_from_slice(body.as_ref());
    Message::from(buf)
}

/// Split a framed message into (request id, body). `None` if too short.
fn split_request_id(msg: &Message) -> Option<(u32, Message)> {
    let bytes = msg.payload();
    if bytes.len() < 4 {
        return None;
    }
    let id = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    Some((id, Message::from(bytes.slice(4..))))
}
