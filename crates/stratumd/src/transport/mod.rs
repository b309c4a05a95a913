//! Credentialed Unix-socket transport for the broker.
//!
//! The listener accepts connections on a filesystem socket and hands each
//! stream to a [`ConnectionHandler`] on its own thread. Requests and replies
//! are built from the framing primitives in [`frame`], and kernel metadata
//! (peer credentials, security context, descriptor passing) is reached only
//! through the [`Channel`] trait.

mod channel;
mod errors;
mod frame;
mod handler;
mod listener;
#[cfg(test)]
mod memory;
#[cfg(test)]
mod test_utils;

pub(crate) use self::channel::{Channel, MAX_FDS};
pub use self::channel::PeerCredentials;
pub use self::errors::{FrameError, ListenerError};
pub(crate) use self::frame::{FrameRead, FrameWrite, MAX_STRING_BYTES};
pub(crate) use self::handler::ConnectionHandler;
#[cfg(test)]
pub(crate) use self::listener::ListenerHandle;
pub(crate) use self::listener::SocketListener;
#[cfg(test)]
pub(crate) use self::memory::MemoryChannel;
#[cfg(test)]
pub(crate) use self::test_utils::CountingHandler;

const LISTENER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::transport");
