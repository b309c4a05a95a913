//! Platform boundary for credential lookup and descriptor passing.
//!
//! Everything above this module talks to a [`Channel`]; only the Unix stream
//! implementation touches `SO_PEERCRED`, `SCM_RIGHTS` or `/proc`.

use std::fs;
use std::io::{self, IoSlice, IoSliceMut, Read, Write};
use std::os::fd::{AsRawFd, BorrowedFd, FromRawFd, OwnedFd, RawFd};
use std::os::unix::net::UnixStream;
use std::time::Duration;

use nix::sys::socket::{
    ControlMessage, ControlMessageOwned, MsgFlags, getsockopt, recvmsg, sendmsg,
    sockopt::PeerCredentials as PeerCredOpt,
};

use super::FrameError;
use super::frame::{FrameRead, FrameWrite};

/// Most descriptors accepted in a single transfer.
pub(crate) const MAX_FDS: usize = 16;

/// Identity of the process on the far end of a connection, as reported by
/// the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerCredentials {
    /// Effective user id.
    pub uid: u32,
    /// Effective group id.
    pub gid: u32,
    /// Process id.
    pub pid: i32,
}

/// Byte stream with access to kernel-supplied peer metadata.
pub(crate) trait Channel: Read + Write + Send {
    /// Credentials of the connecting process.
    fn peer_credentials(&self) -> io::Result<PeerCredentials>;

    /// Security context of the peer, when the platform has one.
    fn peer_security_context(&self, credentials: &PeerCredentials) -> Option<String>;

    /// Bounds how long a single read or write may stall.
    fn set_idle_timeout(&self, timeout: Duration) -> io::Result<()>;

    /// Sends a descriptor count followed by the descriptors themselves.
    fn send_fds(&mut self, fds: &[BorrowedFd<'_>]) -> Result<(), FrameError>;

    /// Receives descriptors sent with [`Channel::send_fds`].
    fn recv_fds(&mut self) -> Result<Vec<OwnedFd>, FrameError>;
}

impl Channel for UnixStream {
    fn peer_credentials(&self) -> io::Result<PeerCredentials> {
        let cred = getsockopt(self, PeerCredOpt).map_err(io::Error::from)?;
        Ok(PeerCredentials {
            uid: cred.uid(),
            gid: cred.gid(),
            pid: cred.pid(),
        })
    }

    fn peer_security_context(&self, credentials: &PeerCredentials) -> Option<String> {
        read_security_context(credentials.pid)
    }

    fn set_idle_timeout(&self, timeout: Duration) -> io::Result<()> {
        self.set_read_timeout(Some(timeout))?;
        self.set_write_timeout(Some(timeout))
    }

    fn send_fds(&mut self, fds: &[BorrowedFd<'_>]) -> Result<(), FrameError> {
        if fds.len() > MAX_FDS {
            return Err(FrameError::protocol(format!(
                "cannot pass {} descriptors, limit is {MAX_FDS}",
                fds.len()
            )));
        }
        let count = i32::try_from(fds.len())
            .map_err(|_| FrameError::protocol("descriptor count overflows i32"))?;
        self.write_int(count)?;
        if fds.is_empty() {
            return Ok(());
        }
        let raw: Vec<RawFd> = fds.iter().map(AsRawFd::as_raw_fd).collect();
        // At least one data byte has to accompany the ancillary payload.
        let marker = [0_u8; 1];
        let iov = [IoSlice::new(&marker)];
        let rights = [ControlMessage::ScmRights(&raw)];
        sendmsg::<()>(self.as_raw_fd(), &iov, &rights, MsgFlags::empty(), None)
            .map_err(|errno| FrameError::Io(io::Error::from(errno)))?;
        Ok(())
    }

    fn recv_fds(&mut self) -> Result<Vec<OwnedFd>, FrameError> {
        let declared = self.read_int()?;
        let expected = usize::try_from(declared)
            .map_err(|_| FrameError::protocol(format!("negative descriptor count {declared}")))?;
        if expected > MAX_FDS {
            return Err(FrameError::protocol(format!(
                "peer announced {expected} descriptors, limit is {MAX_FDS}"
            )));
        }
        if expected == 0 {
            return Ok(Vec::new());
        }

        let mut marker = [0_u8; 1];
        let mut iov = [IoSliceMut::new(&mut marker)];
        let mut cmsg_buffer = nix::cmsg_space!([RawFd; MAX_FDS]);
        let message = recvmsg::<()>(
            self.as_raw_fd(),
            &mut iov,
            Some(&mut cmsg_buffer),
            MsgFlags::MSG_CMSG_CLOEXEC,
        )
        .map_err(|errno| FrameError::Io(io::Error::from(errno)))?;
        if message.bytes == 0 {
            return Err(FrameError::ConnectionClosed);
        }

        let mut received = Vec::new();
        let cmsgs = message
            .cmsgs()
            .map_err(|errno| FrameError::Io(io::Error::from(errno)))?;
        for cmsg in cmsgs {
            if let ControlMessageOwned::ScmRights(fds) = cmsg {
                for fd in fds {
                    // SAFETY: SCM_RIGHTS hands this process fresh descriptors
                    // that nothing else owns yet.
                    received.push(unsafe { OwnedFd::from_raw_fd(fd) });
                }
            }
        }
        if received.len() != expected {
            return Err(FrameError::protocol(format!(
                "expected {expected} descriptors, received {}",
                received.len()
            )));
        }
        Ok(received)
    }
}

/// Reads `/proc/<pid>/attr/current`, trimming the trailing NUL and newline.
pub(crate) fn read_security_context(pid: i32) -> Option<String> {
    let raw = fs::read(format!("/proc/{pid}/attr/current")).ok()?;
    let text = String::from_utf8(raw).ok()?;
    let context = text.trim_end_matches(['\0', '\n']);
    if context.is_empty() {
        None
    } else {
        Some(context.to_owned())
    }
}
