//! Response status codes and reply bodies.

use std::os::fd::{AsFd, BorrowedFd, OwnedFd};

use strum::Display;

use crate::transport::{Channel, FrameError, FrameWrite};

/// First `i32` of every reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusCode {
    /// The request succeeded; the body follows.
    Ok,
    /// The opcode needs uid 0.
    RootRequired,
    /// The peer's identity does not satisfy the opcode's predicate.
    AccessDenied,
    /// The handler failed.
    Error,
}

impl StatusCode {
    /// Wire value of the status.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::Ok => 0,
            Self::RootRequired => 1,
            Self::AccessDenied => 2,
            Self::Error => -1,
        }
    }
}

#[derive(Debug)]
enum Field {
    Int(i32),
    Str(String),
}

/// Work to run once the reply has been delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FollowUp {
    /// Stop the daemon.
    Stop,
    /// Reboot the device.
    Reboot,
}

/// Body of a successful reply, built completely before anything is written.
#[derive(Debug, Default)]
pub(crate) struct Reply {
    fields: Vec<Field>,
    fds: Vec<OwnedFd>,
    follow_up: Option<FollowUp>,
}

impl Reply {
    /// Reply with no body.
    pub(crate) fn empty() -> Self {
        Self::default()
    }

    pub(crate) fn int(mut self, value: i32) -> Self {
        self.fields.push(Field::Int(value));
        self
    }

    pub(crate) fn string(mut self, value: impl Into<String>) -> Self {
        self.fields.push(Field::Str(value.into()));
        self
    }

    /// Appends a descriptor, sent after every other field.
    pub(crate) fn fd(mut self, fd: OwnedFd) -> Self {
        self.fds.push(fd);
        self
    }

    pub(crate) const fn then(mut self, follow_up: FollowUp) -> Self {
        self.follow_up = Some(follow_up);
        self
    }

    pub(crate) const fn follow_up(&self) -> Option<FollowUp> {
        self.follow_up
    }

    /// Writes the `OK` status followed by the body.
    pub(crate) fn write_to<C: Channel>(&self, channel: &mut C) -> Result<(), FrameError> {
        channel.write_int(StatusCode::Ok.code())?;
        for field in &self.fields {
            match field {
                Field::Int(value) => channel.write_int(*value)?,
                Field::Str(value) => channel.write_string(value)?,
            }
        }
        if !self.fds.is_empty() {
            let borrowed: Vec<BorrowedFd<'_>> = self.fds.iter().map(AsFd::as_fd).collect();
            channel.send_fds(&borrowed)?;
        }
        Ok(())
    }
}
