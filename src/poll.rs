//! Multiplexed readiness polling across sockets.
//!
//! A [`PollSet`] holds non-owning (weak) references to sockets, each with
//! read/write interest flags. `wait` blocks until at least one entry is
//! ready or a timeout elapses, then per-entry readiness can be queried with
//! the token returned at add-time.
//!
//! Entries live in a generation-tagged slot arena: removal frees the slot
//! for reuse, and the generation counter makes any token from a removed
//! entry detectably stale instead of silently aliasing its replacement.

use crate::error::{FilamentError, Result};
use crate::socket::{Socket, SocketCore};
use parking_lot::Mutex;
use std::sync::Weak;
use std::time::{Duration, Instant};

/// How long `wait` sleeps between readiness scans.
const SCAN_INTERVAL: Duration = Duration::from_millis(1);

/// Stable identifier for an entry in one poll set.
///
/// Tokens are only meaningful for the set that issued them, and only until
/// the entry is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PollToken {
    index: usize,
    generation: u64,
}

struct Entry {
    socket: Weak<Mutex<SocketCore>>,
    interest_in: bool,
    interest_out: bool,
    ready_in: bool,
    ready_out: bool,
}

struct Slot {
    generation: u64,
    entry: Option<Entry>,
}

/// A caller-managed collection of (socket, interest) entries.
///
/// Dropping or clearing a poll set never closes its member sockets.
#[derive(Default)]
pub struct PollSet {
    slots: Vec<Slot>,
    free: Vec<usize>,
}

impl PollSet {
    /// Create an empty poll set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a socket with the given interests, returning its token.
    ///
    /// A socket registered with both interests false never reports ready.
    pub fn add(&mut self, socket: &Socket, interest_in: bool, interest_out: bool) -> PollToken {
        let entry = Entry {
            socket: socket.downgrade(),
            interest_in,
            interest_out,
            ready_in: false,
            ready_out: false,
        };
        match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index];
                slot.generation += 1;
                slot.entry = Some(entry);
                PollToken {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                let index = self.slots.len();
                self.slots.push(Slot {
                    generation: 0,
                    entry: Some(entry),
                });
                PollToken {
                    index,
                    generation: 0,
                }
            }
        }
    }

    /// Remove an entry. The token (and any copy of it) becomes stale.
    ///
    /// # Errors
    ///
    /// `IndexOutOfRange` if the token does not name a live entry.
    pub fn remove(&mut self, token: PollToken) -> Result<()> {
        let slot = self.slot_mut(token)?;
        slot.entry = None;
        self.free.push(token.index);
        Ok(())
    }

    /// Block until at least one entry's interest is satisfied or the timeout
    /// elapses; returns the number of ready entries.
    ///
    /// `None` waits indefinitely; `Some(Duration::ZERO)` scans once and
    /// returns immediately.
    ///
    /// # Errors
    ///
    /// `Poll` when waiting indefinitely on a set with no live entries (the
    /// wait could never complete).
    pub fn wait(&mut self, timeout: Option<Duration>) -> Result<usize> {
        let deadline = timeout.map(|d| Instant::now() + d);
        if timeout.is_none() && self.live_entries() == 0 {
            return Err(FilamentError::Poll(
                "waiting forever on an empty poll set".to_string(),
            ));
        }
        loop {
            let ready = self.scan();
            if ready > 0 {
                return Ok(ready);
            }
            match deadline {
                Some(t) if Instant::now() >= t => return Ok(0),
                _ => std::thread::sleep(SCAN_INTERVAL),
            }
        }
    }

    /// `wait` with a millisecond timeout in the C-binding convention:
    /// negative waits indefinitely, `0` returns immediately.
    pub fn wait_millis(&mut self, timeout_ms: i64) -> Result<usize> {
        let timeout = if timeout_ms < 0 {
            None
        } else {
            Some(Duration::from_millis(timeout_ms as u64))
        };
        self.wait(timeout)
    }

    /// Last-observed read readiness for an entry, as of the latest `wait`.
    pub fn is_readable(&self, token: PollToken) -> Result<bool> {
        Ok(self.entry(token)?.ready_in)
    }

    /// Last-observed write readiness for an entry, as of the latest `wait`.
    pub fn is_writable(&self, token: PollToken) -> Result<bool> {
        Ok(self.entry(token)?.ready_out)
    }

    /// Number of live entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.live_entries()
    }

    /// True if no live entries remain.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live_entries() == 0
    }

    /// Drop all entries. Member sockets are untouched.
    pub fn close(&mut self) {
        self.slots.clear();
        self.free.clear();
    }

    /// One readiness pass over all live entries.
    fn scan(&mut self) -> usize {
        let mut ready = 0;
        for slot in &mut self.slots {
            let Some(entry) = slot.entry.as_mut() else {
                continue;
            };
            entry.ready_in = false;
            entry.ready_out = false;
            // a dropped or closed socket is simply never ready
            let Some(core) = entry.socket.upgrade() else {
                continue;
            };
            let mut core = core.lock();
            if entry.interest_in {
                entry.ready_in = core.recv_ready();
            }
            if entry.interest_out {
                entry.ready_out = core.send_ready();
            }
            if entry.ready_in || entry.ready_out {
                ready += 1;
            }
        }
        ready
    }

    fn live_entries(&self) -> usize {
        self.slots.iter().filter(|s| s.entry.is_some()).count()
    }

    fn entry(&self, token: PollToken) -> Result<&Entry> {
        self.slots
            .get(token.index)
            .filter(|slot| slot.generation == token.generation)
            .and_then(|slot| slot.entry.as_ref())
            .ok_or(FilamentError::IndexOutOfRange(token.index))
    }

    fn slot_mut(&mut self, token: PollToken) -> Result<&mut Slot> {
        match self.slots.get_mut(token.index) {
            Some(slot) if slot.generation == token.generation && slot.entry.is_some() => {
                Ok(slot)
            }
            _ => Err(FilamentError::IndexOutOfRange(token.index)),
        }
    }
}
