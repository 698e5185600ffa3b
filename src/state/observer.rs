//! State observer for propagation to peer servers.
//!
//! The [`Matrix`](crate::state::Matrix) calls into a `StateObserver`
//! whenever a locally originated change must reach the rest of the network.
//! Changes received from peers are never echoed back.

use crate::message::Message;
use crate::security::{XLine, XLineKind};

/// An invite or uninvite bound for the server owning its target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InviteForward {
    pub source_uid: String,
    pub target_uid: String,
    pub channel: String,
    /// Channel creation time as known here; the owning server rejects the
    /// invite if its own is older.
    pub channel_ts: i64,
    /// Seconds the invite lasts; `None` never expires.
    pub duration: Option<u64>,
}

/// Trait for observing local state changes.
pub trait StateObserver: Send + Sync {
    /// A local identity quit.
    fn on_user_quit(&self, _uid: &str, _reason: &str) {}

    /// A global ban rule was added locally.
    fn on_ban_add(&self, _line: &XLine) {}

    /// A global ban rule was removed locally.
    fn on_ban_remove(&self, _kind: XLineKind, _mask: &str, _remover: &str) {}

    /// An invite to an identity owned by a peer.
    fn on_invite_forward(&self, _invite: &InviteForward) {}

    /// An uninvite of an identity owned by a peer.
    fn on_uninvite_forward(&self, _invite: &InviteForward) {}

    /// A reply addressed to an identity owned by a peer.
    fn on_remote_reply(&self, _uid: &str, _msg: &Message) {}
}

/// Observer for a server with no peers.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl StateObserver for NullObserver {}
