//! Messaging pattern enumeration.
//!
//! The pattern set is closed and finite, so each socket's behavior is
//! dispatched on a tagged enum rather than runtime-extensible types.
//! Discriminants follow the nanomsg protocol numbering so integer ids from
//! bindings round-trip through [`Pattern::from_raw`].

use crate::error::{FilamentError, Result};
use std::fmt;

/// Scalability-protocols messaging patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Pattern {
    /// Exclusive one-to-one bidirectional exchange.
    Pair = 16,

    /// Broadcast publisher; cannot receive.
    Pub = 32,

    /// Filtering subscriber; cannot send.
    Sub = 33,

    /// Request client with strict send/recv alternation.
    Req = 48,

    /// Reply server; routes each reply back to the requesting peer.
    Rep = 49,

    /// Load-balancing producer; cannot receive.
    Push = 80,

    /// Fair-queuing consumer; cannot send.
    Pull = 81,

    /// Deadline-bounded broadcast questioner.
    Surveyor = 98,

    /// Survey answerer.
    Respondent = 99,

    /// Many-to-many broadcast without loop-back.
    Bus = 112,
}

impl Pattern {
    /// Resolve an integer pattern id.
    ///
    /// # Errors
    ///
    /// Returns [`FilamentError::InvalidPattern`] for unrecognized ids.
    pub fn from_raw(raw: i32) -> Result<Self> {
        match raw {
            16 => Ok(Self::Pair),
            32 => Ok(Self::Pub),
            33 => Ok(Self::Sub),
            48 => Ok(Self::Req),
            49 => Ok(Self::Rep),
            80 => Ok(Self::Push),
            81 => Ok(Self::Pull),
            98 => Ok(Self::Surveyor),
            99 => Ok(Self::Respondent),
            112 => Ok(Self::Bus),
            other => Err(FilamentError::InvalidPattern(other)),
        }
    }

    /// Get the pattern as a string name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pair => "PAIR",
            Self::Pub => "PUB",
            Self::Sub => "SUB",
            Self::Req => "REQ",
            Self::Rep => "REP",
            Self::Push => "PUSH",
            Self::Pull => "PULL",
            Self::Surveyor => "SURVEYOR",
            Self::Respondent => "RESPONDENT",
            Self::Bus => "BUS",
        }
    }

    /// True if sockets of this pattern may send messages.
    #[must_use]
    pub const fn can_send(&self) -> bool {
        !matches!(self, Self::Sub | Self::Pull)
    }

    /// True if sockets of this pattern may receive messages.
    #[must_use]
    pub const fn can_recv(&self) -> bool {
        !matches!(self, Self::Pub | Self::Push)
    }

    /// Check if this pattern is compatible with the given peer pattern.
    #[must_use]
    pub const fn is_compatible(&self, peer: Pattern) -> bool {
        matches!(
            (self, peer),
            (Self::Pair, Self::Pair)
                | (Self::Pub, Self::Sub)
                | (Self::Sub, Self::Pub)
                | (Self::Req, Self::Rep)
                | (Self::Rep, Self::Req)
                | (Self::Push, Self::Pull)
                | (Self::Pull, Self::Push)
                | (Self::Surveyor, Self::Respondent)
                | (Self::Respondent, Self::Surveyor)
                | (Self::Bus, Self::Bus)
        )
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
