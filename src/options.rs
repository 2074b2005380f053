//! Socket configuration options.
//!
//! Two surfaces are provided:
//! - [`SocketOptions`]: the resolved per-socket configuration, built with a
//!   fluent API or mutated through `Socket::set_option`.
//! - [`SocketOption`]: a typed option command, with a raw
//!   `(level, option, bytes)` decoder for callers holding nanomsg-style
//!   integer-encoded values.

use crate::error::{FilamentError, Result};
use bytes::Bytes;
use std::time::Duration;

/// Socket-level option namespace (`NN_SOL_SOCKET`).
pub const LEVEL_SOCKET: i32 = 0;
/// SUB pattern option namespace.
pub const LEVEL_SUB: i32 = 33;
/// SURVEYOR pattern option namespace.
pub const LEVEL_SURVEYOR: i32 = 98;

/// Socket-level option ids.
pub const OPT_LINGER: i32 = 1;
pub const OPT_SNDHWM: i32 = 2;
pub const OPT_RCVHWM: i32 = 3;
pub const OPT_SNDTIMEO: i32 = 4;
pub const OPT_RCVTIMEO: i32 = 5;

/// SUB option ids.
pub const OPT_SUBSCRIBE: i32 = 1;
pub const OPT_UNSUBSCRIBE: i32 = 2;

/// SURVEYOR option ids.
pub const OPT_SURVEY_DEADLINE: i32 = 1;

/// Resolved per-socket configuration.
#[derive(Debug, Clone)]
pub struct SocketOptions {
    /// Maximum time to wait in a blocking `recv`.
    /// - `None`: block indefinitely (default)
    /// - `Some(Duration::ZERO)`: non-blocking
    /// - `Some(duration)`: wait up to duration, then report would-block
    pub recv_timeout: Option<Duration>,

    /// Maximum time to wait in a blocking `send`. Same convention as
    /// `recv_timeout`.
    pub send_timeout: Option<Duration>,

    /// Time to allow queued messages to drain on close.
    ///
    /// The inproc transport hands messages to the peer's queue at send time,
    /// so queued messages survive close regardless; the option exists for
    /// transports that buffer locally.
    pub linger: Option<Duration>,

    /// Per-link receive queue depth. Applies to links established after the
    /// change.
    pub recv_hwm: usize,

    /// Per-link send queue depth. Applies to links established after the
    /// change.
    pub send_hwm: usize,

    /// SURVEYOR only: how long responses to a survey are accepted.
    pub survey_deadline: Duration,
}

impl Default for SocketOptions {
    fn default() -> Self {
        Self {
            recv_timeout: None,
            send_timeout: None,
            linger: Some(Duration::from_secs(1)),
            recv_hwm: 1000,
            send_hwm: 1000,
            survey_deadline: Duration::from_secs(1),
        }
    }
}

impl SocketOptions {
    /// Create options with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set receive timeout.
    #[must_use]
    pub fn with_recv_timeout(mut self, timeout: Duration) -> Self {
        self.recv_timeout = Some(timeout);
        self
    }

    /// Set send timeout.
    #[must_use]
    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = Some(timeout);
        self
    }

    /// Set linger.
    #[must_use]
    pub fn with_linger(mut self, linger: Option<Duration>) -> Self {
        self.linger = linger;
        self
    }

    /// Set receive high water mark.
    #[must_use]
    pub fn with_recv_hwm(mut self, hwm: usize) -> Self {
        self.recv_hwm = hwm;
        self
    }

    /// Set send high water mark.
    #[must_use]
    pub fn with_send_hwm(mut self, hwm: usize) -> Self {
        self.send_hwm = hwm;
        self
    }

    /// Set the survey deadline.
    #[must_use]
    pub fn with_survey_deadline(mut self, deadline: Duration) -> Self {
        self.survey_deadline = deadline;
        self
    }

    /// Check if receive operations are non-blocking.
    #[must_use]
    pub fn is_recv_nonblocking(&self) -> bool {
        matches!(self.recv_timeout, Some(d) if d.is_zero())
    }

    /// Check if send operations are non-blocking.
    #[must_use]
    pub fn is_send_nonblocking(&self) -> bool {
        matches!(self.send_timeout, Some(d) if d.is_zero())
    }
}

/// A typed option command for `Socket::set_option`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketOption {
    /// SUB only: add a topic-prefix subscription.
    Subscribe(Bytes),
    /// SUB only: remove a topic-prefix subscription.
    Unsubscribe(Bytes),
    /// Receive timeout; `None` blocks indefinitely.
    RecvTimeout(Option<Duration>),
    /// Send timeout; `None` blocks indefinitely.
    SendTimeout(Option<Duration>),
    /// Close linger.
    Linger(Option<Duration>),
    /// Receive queue depth for future links.
    RecvHwm(usize),
    /// Send queue depth for future links.
    SendHwm(usize),
    /// SURVEYOR only: survey response deadline.
    SurveyDeadline(Duration),
}

impl SocketOption {
    /// Decode a raw `(level, option, value)` triple.
    ///
    /// Integer values are little-endian `i32`; `-1` means "no timeout" for
    /// the timeout options. Byte-string values are taken verbatim for
    /// subscribe/unsubscribe.
    ///
    /// # Errors
    ///
    /// Returns [`FilamentError::UnsupportedOption`] for unknown level/option
    /// pairs or values of the wrong width.
    pub fn from_raw(level: i32, option: i32, value: &[u8]) -> Result<Self> {
        match (level, option) {
            (LEVEL_SUB, OPT_SUBSCRIBE) => {
                Ok(Self::Subscribe(Bytes::copy_from_slice(value)))
            }
            (LEVEL_SUB, OPT_UNSUBSCRIBE) => {
                Ok(Self::Unsubscribe(Bytes::copy_from_slice(value)))
            }
            (LEVEL_SOCKET, OPT_RCVTIMEO) => {
                Ok(Self::RecvTimeout(decode_timeout(value)?))
            }
            (LEVEL_SOCKET, OPT_SNDTIMEO) => {
                Ok(Self::SendTimeout(decode_timeout(value)?))
            }
            (LEVEL_SOCKET, OPT_LINGER) => Ok(Self::Linger(decode_timeout(value)?)),
            (LEVEL_SOCKET, OPT_RCVHWM) => {
                Ok(Self::RecvHwm(decode_depth(value)?))
            }
            (LEVEL_SOCKET, OPT_SNDHWM) => {
                Ok(Self::SendHwm(decode_depth(value)?))
            }
            (LEVEL_SURVEYOR, OPT_SURVEY_DEADLINE) => {
                let millis = decode_i32(value)?;
                if millis < 0 {
                    return Err(FilamentError::UnsupportedOption(
                        "survey deadline must be non-negative".to_string(),
                    ));
                }
                Ok(Self::SurveyDeadline(Duration::from_millis(millis as u64)))
            }
            _ => Err(FilamentError::UnsupportedOption(format!(
                "unknown option (level {level}, option {option})"
            ))),
        }
    }
}

fn decode_i32(value: &[u8]) -> Result<i32> {
    let bytes: [u8; 4] = value.try_into().map_err(|_| {
        FilamentError::UnsupportedOption(format!(
            "expected a 4-byte integer value, got {} bytes",
            value.len()
        ))
    })?;
    Ok(i32::from_le_bytes(bytes))
}

fn decode_timeout(value: &[u8]) -> Result<Option<Duration>> {
    let millis = decode_i32(value)?;
    if millis < 0 {
        Ok(None)
    } else {
        Ok(Some(Duration::from_millis(millis as u64)))
    }
}

fn decode_depth(value: &[u8]) -> Result<usize> {
    let depth = decode_i32(value)?;
    if depth <= 0 {
        return Err(FilamentError::UnsupportedOption(
            "queue depth must be positive".to_string(),
        ));
    }
    Ok(depth as usize)
}
