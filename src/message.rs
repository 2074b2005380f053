//! Message payload type.
//!
//! A [`Message`] is an immutable byte sequence with an explicit length
//! (never null-terminated). Cloning is cheap since the payload is a
//! refcounted [`Bytes`], which keeps PUB/BUS/SURVEYOR fan-out affordable.

use bytes::Bytes;

/// An immutable message payload.
///
/// Ownership transfers to the socket on send and to the caller on receive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    payload: Bytes,
}

impl Message {
    /// Create a message from a payload.
    #[must_use]
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
        }
    }

    /// Payload length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// True if the payload is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Borrow the payload.
    #[must_use]
    pub const fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Consume the message, returning the payload.
    #[must_use]
    pub fn into_payload(self) -> Bytes {
        self.payload
    }
}

impl AsRef<[u8]> for Message {
    fn as_ref(&self) -> &[u8] {
        &self.payload
    }
}

impl From<Bytes> for Message {
    fn from(payload: Bytes) -> Self {
        Self { payload }
    }
}

impl From<Vec<u8>> for Message {
    fn from(payload: Vec<u8>) -> Self {
        Self {
            payload: Bytes::from(payload),
        }
    }
}

impl From<&'static [u8]> for Message {
    fn from(payload: &'static [u8]) -> Self {
        Self {
            payload: Bytes::from_static(payload),
        }
    }
}

impl From<&'static str> for Message {
    fn from(payload: &'static str) -> Self {
        Self {
            payload: Bytes::from_static(payload.as_bytes()),
        }
    }
}

impl From<String> for Message {
    fn from(payload: String) -> Self {
        Self {
            payload: Bytes::from(payload),
        }
    }
}
