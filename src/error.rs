//! Filament error types.
//!
//! Every fallible operation in this crate returns [`Result`]. The would-block
//! condition is deliberately *not* an error: non-blocking `send`/`recv` report
//! it as `Ok(None)` so callers can never confuse "nothing available right now"
//! with an actual fault.

use crate::endpoint::EndpointId;
use crate::pattern::Pattern;
use std::io;
use thiserror::Error;

/// Main error type for filament operations.
#[derive(Error, Debug)]
pub enum FilamentError {
    /// An integer pattern id did not name a known messaging pattern.
    #[error("invalid pattern id: {0}")]
    InvalidPattern(i32),

    /// An endpoint address string could not be parsed.
    #[error("address error: {0}")]
    Address(#[from] crate::address::AddressError),

    /// The underlying transport failed (listen, dial, or link-level fault).
    #[error("transport error: {0}")]
    Transport(String),

    /// The endpoint id does not belong to this socket (or the socket is closed).
    #[error("unknown endpoint: {0}")]
    UnknownEndpoint(EndpointId),

    /// The option is not recognized, or not legal for this socket's pattern.
    #[error("unsupported option: {0}")]
    UnsupportedOption(String),

    /// The operation violates the pattern's state machine
    /// (e.g. REQ send-after-send, or send on a receive-only pattern).
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// The poll wait primitive itself failed.
    #[error("poll error: {0}")]
    Poll(String),

    /// A poll token does not name a live entry in the poll set.
    #[error("poll index out of range: {0}")]
    IndexOutOfRange(usize),

    /// The socket was closed; the operation can never succeed.
    #[error("socket closed")]
    SocketClosed,
}

/// Result type alias for filament operations.
pub type Result<T> = std::result::Result<T, FilamentError>;

impl FilamentError {
    /// Create a transport error with a message.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a protocol violation error with a message.
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::ProtocolViolation(msg.into())
    }

    /// Create an unsupported-option error for an option/pattern mismatch.
    pub fn unsupported_option(option: &str, pattern: Pattern) -> Self {
        Self::UnsupportedOption(format!("{option} is not valid on a {pattern} socket"))
    }

    /// True for errors that describe a connection-level fault rather than
    /// caller misuse.
    #[must_use]
    pub const fn is_transport_error(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::SocketClosed)
    }
}

impl From<io::Error> for FilamentError {
    fn from(e: io::Error) -> Self {
        Self::Transport(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_errors_are_classified() {
        assert!(FilamentError::transport("listen failed").is_transport_error());
        assert!(FilamentError::SocketClosed.is_transport_error());
        assert!(!FilamentError::protocol("send after send").is_transport_error());
    }

    #[test]
    fn io_errors_convert_to_transport() {
        let e: FilamentError =
            io::Error::new(io::ErrorKind::AddrInUse, "port busy").into();
        assert!(matches!(e, FilamentError::Transport(_)));
    }
}
