//! Privilege predicates evaluated against the accepted peer.

use tracing::debug;

use super::{DISPATCH_TARGET, StatusCode};
use crate::transport::{Channel, PeerCredentials};

/// Android uid of root.
pub const AID_ROOT: u32 = 0;
/// Android uid of the adb shell.
pub const AID_SHELL: u32 = 2000;
/// Security context the zygote runs in.
pub const ZYGOTE_CONTEXT: &str = "u:r:zygote:s0";

/// Identity of the connecting process, captured once at accept time.
///
/// A peer without credentials failed authentication and may only issue
/// unrestricted opcodes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Peer {
    credentials: Option<PeerCredentials>,
    context: Option<String>,
}

impl Peer {
    /// Peer with the given identity.
    #[must_use]
    pub const fn new(credentials: Option<PeerCredentials>, context: Option<String>) -> Self {
        Self {
            credentials,
            context,
        }
    }

    /// Reads the kernel-reported identity of the process behind `channel`.
    pub(crate) fn capture<C: Channel>(channel: &C) -> Self {
        match channel.peer_credentials() {
            Ok(credentials) => {
                let context = channel.peer_security_context(&credentials);
                Self::new(Some(credentials), context)
            }
            Err(error) => {
                debug!(
                    target: DISPATCH_TARGET,
                    error = %error,
                    "peer credentials unavailable"
                );
                Self::default()
            }
        }
    }

    /// Credentials reported by the kernel.
    #[must_use]
    pub const fn credentials(&self) -> Option<&PeerCredentials> {
        self.credentials.as_ref()
    }

    /// Security context of the peer, if one could be read.
    #[must_use]
    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    fn has_uid(&self, uid: u32) -> bool {
        self.credentials.is_some_and(|credentials| credentials.uid == uid)
    }

    fn is_zygote(&self) -> bool {
        self.credentials.is_some() && self.context() == Some(ZYGOTE_CONTEXT)
    }
}

/// Who may issue an opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Privilege {
    /// Any peer, authenticated or not.
    Unrestricted,
    /// uid 0.
    Root,
    /// uid 0 or the adb shell.
    RootOrShell,
    /// uid 0 or a process in the zygote context.
    RootOrZygote,
    /// A process in the zygote context.
    Zygote,
}

impl Privilege {
    /// Evaluates the predicate, returning the status to answer with when it
    /// fails.
    pub fn check(self, peer: &Peer) -> Result<(), StatusCode> {
        let root = peer.has_uid(AID_ROOT);
        let allowed = match self {
            Self::Unrestricted => true,
            Self::Root => root,
            Self::RootOrShell => root || peer.has_uid(AID_SHELL),
            Self::RootOrZygote => root || peer.is_zygote(),
            Self::Zygote => peer.is_zygote(),
        };
        match (allowed, self) {
            (true, _) => Ok(()),
            (false, Self::Root) => Err(StatusCode::RootRequired),
            (false, _) => Err(StatusCode::AccessDenied),
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn peer_as(uid: u32, context: Option<&str>) -> Peer {
        Peer::new(
            Some(PeerCredentials { uid, gid: uid, pid: 7 }),
            context.map(str::to_owned),
        )
    }

    #[rstest]
    #[case(Privilege::Root, peer_as(0, None), Ok(()))]
    #[case(Privilege::Root, peer_as(2000, None), Err(StatusCode::RootRequired))]
    #[case(Privilege::RootOrShell, peer_as(2000, None), Ok(()))]
    #[case(Privilege::RootOrShell, peer_as(10_123, None), Err(StatusCode::AccessDenied))]
    #[case(Privilege::RootOrZygote, peer_as(10_123, Some(ZYGOTE_CONTEXT)), Ok(()))]
    #[case(Privilege::RootOrZygote, peer_as(0, Some("u:r:untrusted_app:s0")), Ok(()))]
    #[case(Privilege::Zygote, peer_as(0, None), Err(StatusCode::AccessDenied))]
    #[case(Privilege::Zygote, peer_as(0, Some(ZYGOTE_CONTEXT)), Ok(()))]
    #[case(Privilege::Unrestricted, peer_as(10_123, None), Ok(()))]
    fn predicates_follow_uid_and_context(
        #[case] privilege: Privilege,
        #[case] peer: Peer,
        #[case] expected: Result<(), StatusCode>,
    ) {
        assert_eq!(privilege.check(&peer), expected);
    }

    #[rstest]
    #[case(Privilege::Root, Err(StatusCode::RootRequired))]
    #[case(Privilege::RootOrZygote, Err(StatusCode::AccessDenied))]
    #[case(Privilege::Unrestricted, Ok(()))]
    fn unauthenticated_peers_only_pass_unrestricted(
        #[case] privilege: Privilege,
        #[case] expected: Result<(), StatusCode>,
    ) {
        assert_eq!(privilege.check(&Peer::default()), expected);
    }
}
