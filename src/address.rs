//! Endpoint address parsing.
//!
//! Addresses follow the `scheme://location` convention; the scheme selects
//! which registered transport handles the endpoint.

use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

/// A parsed endpoint address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Address {
    /// TCP transport: `tcp://host:port`
    Tcp(SocketAddr),
    /// IPC transport (Unix domain socket): `ipc:///path/to/socket`
    #[cfg(unix)]
    Ipc(PathBuf),
    /// In-process transport: `inproc://name`
    Inproc(String),
}

impl Address {
    /// Parse an address from a string.
    ///
    /// Supported formats:
    /// - `tcp://127.0.0.1:5555`
    /// - `tcp://[::1]:5555` (IPv6)
    /// - `ipc:///tmp/socket.sock` (Unix only)
    /// - `inproc://name`
    pub fn parse(s: &str) -> Result<Self, AddressError> {
        s.parse()
    }

    /// The scheme identifying the transport for this address.
    #[must_use]
    pub const fn scheme(&self) -> &'static str {
        match self {
            Address::Tcp(_) => "tcp",
            #[cfg(unix)]
            Address::Ipc(_) => "ipc",
            Address::Inproc(_) => "inproc",
        }
    }

    /// Returns true if this is an inproc address.
    #[must_use]
    pub const fn is_inproc(&self) -> bool {
        matches!(self, Address::Inproc(_))
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(addr) = s.strip_prefix("tcp://") {
            let socket_addr = addr
                .parse::<SocketAddr>()
                .map_err(|_| AddressError::InvalidTcpAddress(addr.to_string()))?;
            Ok(Address::Tcp(socket_addr))
        } else if let Some(path) = s.strip_prefix("ipc://") {
            #[cfg(unix)]
            {
                if path.is_empty() {
                    return Err(AddressError::InvalidIpcPath(
                        "ipc path cannot be empty".to_string(),
                    ));
                }
                Ok(Address::Ipc(PathBuf::from(path)))
            }
            #[cfg(not(unix))]
            {
                let _ = path;
                Err(AddressError::IpcNotSupported)
            }
        } else if let Some(name) = s.strip_prefix("inproc://") {
            if name.is_empty() {
                Err(AddressError::InvalidInprocName(
                    "inproc name cannot be empty".to_string(),
                ))
            } else {
                Ok(Address::Inproc(name.to_string()))
            }
        } else {
            Err(AddressError::InvalidScheme(s.to_string()))
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Tcp(addr) => write!(f, "tcp://{addr}"),
            #[cfg(unix)]
            Address::Ipc(path) => write!(f, "ipc://{}", path.display()),
            Address::Inproc(name) => write!(f, "inproc://{name}"),
        }
    }
}

/// Errors that can occur when parsing addresses.
#[derive(Debug, thiserror::Error)]
pub enum AddressError {
    #[error("invalid scheme in address: {0} (expected tcp://, ipc://, or inproc://)")]
    InvalidScheme(String),

    #[error("invalid TCP address: {0}")]
    InvalidTcpAddress(String),

    #[error("invalid IPC path: {0}")]
    InvalidIpcPath(String),

    #[error("invalid inproc name: {0}")]
    InvalidInprocName(String),

    #[error("IPC transport not supported on this platform")]
    IpcNotSupported,
}
