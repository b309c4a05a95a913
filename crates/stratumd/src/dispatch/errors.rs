//! Error types for request dispatch failures.

use thiserror::Error;

use super::{Opcode, StatusCode};
use crate::modules::ModuleError;
use crate::props::PersistenceError;
use crate::transport::FrameError;

/// Errors surfaced while serving a single request.
///
/// None of these outlive the connection they occurred on.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The request does not follow the wire protocol.
    #[error("protocol violation: {message}")]
    Protocol {
        /// What was wrong with the request.
        message: String,
    },
    /// Reading the request or writing the reply failed.
    #[error("transport failure: {0}")]
    Transport(#[from] FrameError),
    /// The peer may not issue this opcode.
    #[error("{opcode} refused with status {status}")]
    Authorization {
        /// Refused opcode.
        opcode: Opcode,
        /// Status returned to the peer.
        status: StatusCode,
    },
    /// A property override could not be persisted.
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    /// The module directories could not be changed.
    #[error(transparent)]
    Module(#[from] ModuleError),
    /// The handler failed for another reason.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the failure.
        message: String,
    },
}

impl DispatchError {
    /// Status written back to the peer, or `None` when the connection is
    /// dropped without a reply.
    #[must_use]
    pub const fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Protocol { .. } | Self::Transport(_) => None,
            Self::Authorization { status, .. } => Some(*status),
            Self::Persistence(_) | Self::Module(_) | Self::Internal { .. } => {
                Some(StatusCode::Error)
            }
        }
    }

    /// Creates an error for an opcode outside the known set.
    #[must_use]
    pub fn unknown_opcode(code: i32) -> Self {
        Self::Protocol {
            message: format!("unknown opcode {code}"),
        }
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}
