//! In-memory [`Channel`] used to drive the dispatcher without sockets.

use std::collections::VecDeque;
use std::io::{self, Cursor, Read, Write};
use std::os::fd::{BorrowedFd, OwnedFd};
use std::time::Duration;

use super::FrameError;
use super::channel::{Channel, PeerCredentials};
use super::frame::FrameWrite;

/// Scripted peer: bytes queued with the `push_*` methods are what the daemon
/// reads, and everything the daemon writes is kept for inspection.
#[derive(Debug)]
pub(crate) struct MemoryChannel {
    credentials: PeerCredentials,
    context: Option<String>,
    inbound: Cursor<Vec<u8>>,
    outbound: Vec<u8>,
    inbound_fds: VecDeque<OwnedFd>,
    outbound_fds: Vec<OwnedFd>,
}

impl MemoryChannel {
    /// Builds a channel whose peer has the given credentials and no context.
    pub fn new(credentials: PeerCredentials) -> Self {
        Self {
            credentials,
            context: None,
            inbound: Cursor::new(Vec::new()),
            outbound: Vec::new(),
            inbound_fds: VecDeque::new(),
            outbound_fds: Vec::new(),
        }
    }

    /// Peer running as `uid` with a matching gid.
    pub fn from_uid(uid: u32) -> Self {
        Self::new(PeerCredentials {
            uid,
            gid: uid,
            pid: 4242,
        })
    }

    /// Sets the peer's security context.
    #[must_use]
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Queues an integer for the daemon to read.
    #[must_use]
    pub fn push_int(mut self, value: i32) -> Self {
        let _ = self.inbound.get_mut().write_int(value);
        self
    }

    /// Queues a string for the daemon to read.
    #[must_use]
    pub fn push_string(mut self, value: &str) -> Self {
        let _ = self.inbound.get_mut().write_string(value);
        self
    }

    /// Queues raw bytes, e.g. a deliberately truncated frame.
    #[must_use]
    pub fn push_raw(mut self, bytes: &[u8]) -> Self {
        self.inbound.get_mut().extend_from_slice(bytes);
        self
    }

    /// Queues a descriptor for the daemon to receive.
    #[must_use]
    pub fn push_fd(mut self, fd: OwnedFd) -> Self {
        self.inbound_fds.push_back(fd);
        self
    }

    /// Everything the daemon wrote, positioned at the start.
    pub fn reply(&self) -> Cursor<&[u8]> {
        Cursor::new(self.outbound.as_slice())
    }

    /// Descriptors the daemon sent.
    pub fn take_sent_fds(&mut self) -> Vec<OwnedFd> {
        std::mem::take(&mut self.outbound_fds)
    }
}

impl Read for MemoryChannel {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inbound.read(buf)
    }
}

impl Write for MemoryChannel {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.outbound.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Channel for MemoryChannel {
    fn peer_credentials(&self) -> io::Result<PeerCredentials> {
        Ok(self.credentials)
    }

    fn peer_security_context(&self, _credentials: &PeerCredentials) -> Option<String> {
        self.context.clone()
    }

    fn set_idle_timeout(&self, _timeout: Duration) -> io::Result<()> {
        Ok(())
    }

    fn send_fds(&mut self, fds: &[BorrowedFd<'_>]) -> Result<(), FrameError> {
        let count = i32::try_from(fds.len())
            .map_err(|_| FrameError::protocol("descriptor count overflows i32"))?;
        self.write_int(count)?;
        for fd in fds {
            self.outbound_fds.push(fd.try_clone_to_owned()?);
        }
        Ok(())
    }

    fn recv_fds(&mut self) -> Result<Vec<OwnedFd>, FrameError> {
        Ok(self.inbound_fds.drain(..).collect())
    }
}
