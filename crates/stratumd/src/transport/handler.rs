//! Connection handling seam between the listener and request processing.

use std::os::unix::net::UnixStream;

/// Handles accepted socket connections.
pub(crate) trait ConnectionHandler: Send + Sync + 'static {
    /// Handles a single connection. Implementations should avoid panicking;
    /// the stream is closed when it is dropped.
    fn handle(&self, stream: UnixStream);
}
