//! Filament
//!
//! A minimal scalability-protocols messaging library: transport-agnostic
//! sockets in the nanomsg family of patterns, with an integrated poll set
//! for multiplexing readiness across many sockets.
//!
//! Building blocks:
//! - Messaging patterns (`pattern`): PAIR, PUB/SUB, REQ/REP, PUSH/PULL,
//!   BUS, SURVEYOR/RESPONDENT
//! - Sockets and the routing engine (`socket`)
//! - Per-socket endpoint registry (`endpoint`) and address parsing (`address`)
//! - Transport trait + scheme registry (`transport`), in-process transport
//!   built in (`inproc`)
//! - Topic-prefix subscriptions (`subscription`)
//! - Readiness polling (`poll`)
//! - Options (`options`) and error types (`error`)
//!
//! # Quick start
//!
//! ```
//! use filament::{Flags, Pattern, Socket};
//!
//! # fn main() -> filament::Result<()> {
//! let pull = Socket::open(Pattern::Pull);
//! pull.bind("inproc://quickstart")?;
//!
//! let push = Socket::open(Pattern::Push);
//! push.connect("inproc://quickstart")?;
//!
//! push.send("hello", Flags::NONE)?;
//! let msg = pull.recv(Flags::NONE)?.expect("message delivered");
//! assert_eq!(msg.as_ref(), b"hello");
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::match_same_arms)]

pub mod address;
pub mod dev_tracing;
pub mod endpoint;
pub mod error;
pub mod inproc;
pub mod message;
pub mod options;
pub mod pattern;
pub mod poll;
pub mod socket;
pub mod subscription;
pub mod transport;

pub use address::Address;
pub use endpoint::{Direction, EndpointId};
pub use error::{FilamentError, Result};
pub use message::Message;
pub use options::{SocketOption, SocketOptions};
pub use pattern::Pattern;
pub use poll::{PollSet, PollToken};
pub use socket::{Flags, Socket};
pub use transport::register_transport;

/// Convenient imports for the common surface.
pub mod prelude {
    pub use crate::address::Address;
    pub use crate::endpoint::EndpointId;
    pub use crate::error::{FilamentError, Result};
    pub use crate::message::Message;
    pub use crate::options::{SocketOption, SocketOptions};
    pub use crate::pattern::Pattern;
    pub use crate::poll::{PollSet, PollToken};
    pub use crate::socket::{Flags, Socket};
    pub use crate::transport::{register_transport, Connection, Listener, Transport};
    pub use bytes::Bytes;
}
