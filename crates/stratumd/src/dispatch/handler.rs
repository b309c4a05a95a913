//! Connection handler that serves one request per connection.

use std::io::Write;
use std::os::unix::net::UnixStream;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, warn};

use super::auth::Peer;
use super::response::FollowUp;
use super::{DISPATCH_TARGET, DispatchError, Opcode, router};
use crate::state::DaemonState;
use crate::transport::{Channel, ConnectionHandler, FrameRead, FrameWrite};

/// Reads an opcode, authorises it, runs it and writes exactly one reply.
#[derive(Debug)]
pub(crate) struct RequestDispatcher {
    state: Arc<DaemonState>,
    idle_timeout: Duration,
}

impl RequestDispatcher {
    pub(crate) const fn new(state: Arc<DaemonState>, idle_timeout: Duration) -> Self {
        Self {
            state,
            idle_timeout,
        }
    }

    /// Serves the single request carried by `channel`.
    pub(crate) fn serve<C: Channel>(&self, channel: &mut C) {
        if let Err(error) = channel.set_idle_timeout(self.idle_timeout) {
            warn!(target: DISPATCH_TARGET, error = %error, "could not set idle timeout");
        }
        let peer = Peer::capture(channel);
        match self.dispatch(channel, &peer) {
            Ok(Some(follow_up)) => self.run_follow_up(follow_up),
            Ok(None) => {}
            Err(DispatchError::Transport(error)) => {
                debug!(target: DISPATCH_TARGET, error = %error, "connection dropped");
            }
            Err(error) => {
                warn!(target: DISPATCH_TARGET, error = %error, "request rejected");
            }
        }
    }

    fn dispatch<C: Channel>(
        &self,
        channel: &mut C,
        peer: &Peer,
    ) -> Result<Option<FollowUp>, DispatchError> {
        let opcode = Opcode::try_from(channel.read_int()?)?;
        if let Err(status) = opcode.privilege().check(peer) {
            channel.write_int(status.code())?;
            channel.flush().map_err(|error| DispatchError::Transport(error.into()))?;
            return Err(DispatchError::Authorization { opcode, status });
        }
        debug!(
            target: DISPATCH_TARGET,
            opcode = %opcode,
            uid = peer.credentials().map(|credentials| credentials.uid),
            "dispatching request"
        );

        match router::route(opcode, &self.state, channel) {
            Ok(reply) => {
                reply.write_to(channel)?;
                channel.flush().map_err(|error| DispatchError::Transport(error.into()))?;
                Ok(reply.follow_up())
            }
            Err(failure) => match failure.status() {
                Some(status) => {
                    warn!(
                        target: DISPATCH_TARGET,
                        opcode = %opcode,
                        error = %failure,
                        "request failed"
                    );
                    channel.write_int(status.code())?;
                    channel.flush().map_err(|error| DispatchError::Transport(error.into()))?;
                    Ok(None)
                }
                None => Err(failure),
            },
        }
    }

    fn run_follow_up(&self, follow_up: FollowUp) {
        match follow_up {
            FollowUp::Stop => {
                self.state.reporter.shutdown_requested("stop requested by client");
                self.state.request_stop();
            }
            FollowUp::Reboot => {
                if let Err(failure) = self.state.rebooter.reboot() {
                    error!(target: DISPATCH_TARGET, error = %failure, "reboot failed");
                }
            }
        }
    }
}

impl ConnectionHandler for RequestDispatcher {
    fn handle(&self, mut stream: UnixStream) {
        self.serve(&mut stream);
    }
}
