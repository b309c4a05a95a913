//! Request dispatch for broker connections.
//!
//! Every connection carries exactly one request:
//!
//! 1. the client writes an `i32` opcode and the opcode's payload;
//! 2. the daemon checks the opcode's privilege predicate against the peer
//!    credentials captured when the connection was accepted;
//! 3. the daemon writes an `i32` status and, on success, the response body.
//!
//! Unknown opcodes and malformed payloads get no response; the connection is
//! simply closed. Authorization failures and handler errors are answered with
//! their status code and never affect other connections.

mod auth;
mod errors;
mod handler;
mod opcode;
mod reboot;
mod response;
mod router;


pub use auth::{AID_ROOT, AID_SHELL, Peer, Privilege, ZYGOTE_CONTEXT};
pub use errors::DispatchError;
pub use opcode::Opcode;
pub use reboot::{Rebooter, SystemRebooter};
pub use response::StatusCode;

pub(crate) use handler::RequestDispatcher;
#[cfg(test)]
pub(crate) use reboot::test_support::RecordingRebooter;

const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");
