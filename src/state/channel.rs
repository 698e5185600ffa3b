//! Channel membership and ranks.
//!
//! Only what admission and invites depend on is modelled: membership
//! with status ranks, the creation timestamp used to settle conflicts
//! with peers, the invite-only flag and the invite-exception list.

use std::collections::{BTreeMap, HashMap};

use crate::casemap::irc_to_lower;
use crate::state::UserRef;

/// Rank of voiced members.
pub const VOICE_VALUE: u32 = 10_000;
/// Rank of half-operators.
pub const HALFOP_VALUE: u32 = 20_000;
/// Rank of channel operators.
pub const OP_VALUE: u32 = 30_000;

/// Member modes (op, halfop, voice).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MemberModes {
    pub op: bool,     // +o (@)
    pub halfop: bool, // +h (%)
    pub voice: bool,  // +v (+)
}

impl MemberModes {
    pub fn op() -> Self {
        Self {
            op: true,
            ..Self::default()
        }
    }

    pub fn halfop() -> Self {
        Self {
            halfop: true,
            ..Self::default()
        }
    }

    pub fn voice() -> Self {
        Self {
            voice: true,
            ..Self::default()
        }
    }

    /// Get the highest prefix character for this member.
    pub fn prefix_char(&self) -> Option<char> {
        if self.op {
            Some('@')
        } else if self.halfop {
            Some('%')
        } else if self.voice {
            Some('+')
        } else {
            None
        }
    }

    /// Numeric rank of the highest status held; 0 for none.
    pub fn rank(&self) -> u32 {
        if self.op {
            OP_VALUE
        } else if self.halfop {
            HALFOP_VALUE
        } else if self.voice {
            VOICE_VALUE
        } else {
            0
        }
    }
}

/// A channel.
#[derive(Debug, Clone)]
pub struct Channel {
    pub name: String,
    /// Creation timestamp; the older side wins conflicts with peers.
    pub created_at: i64,
    /// +i
    pub invite_only: bool,
    /// +I masks (`nick!ident@host`).
    pub invex: Vec<String>,
    pub members: BTreeMap<UserRef, MemberModes>,
}

impl Channel {
    pub fn new(name: impl Into<String>, created_at: i64) -> Self {
        Self {
            name: name.into(),
            created_at,
            invite_only: false,
            invex: Vec::new(),
            members: BTreeMap::new(),
        }
    }

    pub fn has_member(&self, user: UserRef) -> bool {
        self.members.contains_key(&user)
    }

    /// Rank of `user` in this channel; 0 if absent or without status.
    pub fn rank_of(&self, user: UserRef) -> u32 {
        self.members.get(&user).map_or(0, MemberModes::rank)
    }

    /// Members whose rank is at least `min_rank`.
    pub fn members_at_least(&self, min_rank: u32) -> impl Iterator<Item = UserRef> + '_ {
        self.members
            .iter()
            .filter(move |(_, modes)| modes.rank() >= min_rank)
            .map(|(user, _)| *user)
    }
}

/// Channels keyed by casemapped name.
#[derive(Debug, Default)]
pub struct ChannelManager {
    channels: HashMap<String, Channel>,
}

impl ChannelManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn find(&self, name: &str) -> Option<&Channel> {
        self.channels.get(&irc_to_lower(name))
    }

    pub fn find_mut(&mut self, name: &str) -> Option<&mut Channel> {
        self.channels.get_mut(&irc_to_lower(name))
    }

    /// Fetch `name`, creating it at `now` if absent. The flag is true on creation.
    pub fn get_or_create(&mut self, name: &str, now: i64) -> (&mut Channel, bool) {
        let key = irc_to_lower(name);
        let created = !self.channels.contains_key(&key);
        let channel = self
            .channels
            .entry(key)
            .or_insert_with(|| Channel::new(name, now));
        (channel, created)
    }

    /// Remove `user` from `name`. Returns `Some(true)` if the channel emptied
    /// and was destroyed, `None` if `user` was not a member.
    pub fn part(&mut self, name: &str, user: UserRef) -> Option<bool> {
        let key = irc_to_lower(name);
        let channel = self.channels.get_mut(&key)?;
        channel.members.remove(&user)?;
        if channel.members.is_empty() {
            self.channels.remove(&key);
            return Some(true);
        }
        Some(false)
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Channel> {
        self.channels.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::arena::UserArena;
    use crate::state::{ConnectionInfo, PeerServer, User};
    use std::sync::Arc;

    fn refs(n: usize) -> Vec<UserRef> {
        let mut arena = UserArena::new();
        let server = Arc::new(PeerServer::new("irc.test.net", "0AA"));
        (0..n)
            .map(|i| {
                let conn = ConnectionInfo::new(
                    i as u64,
                    "192.0.2.1:4000".parse().unwrap(),
                    "192.0.2.254:6667".parse().unwrap(),
                );
                arena.insert(User::local(format!("0AAAAAAA{i}"), server.clone(), conn, 0))
            })
            .collect()
    }

    #[test]
    fn test_ranks_follow_highest_status() {
        assert_eq!(MemberModes::default().rank(), 0);
        assert_eq!(MemberModes::voice().rank(), VOICE_VALUE);
        assert_eq!(MemberModes::halfop().rank(), HALFOP_VALUE);
        let both = MemberModes {
            op: true,
            voice: true,
            ..MemberModes::default()
        };
        assert_eq!(both.rank(), OP_VALUE);
        assert_eq!(both.prefix_char(), Some('@'));
    }

    #[test]
    fn test_get_or_create_then_part_destroys() {
        let users = refs(2);
        let mut channels = ChannelManager::new();
        let (chan, created) = channels.get_or_create("#Rust", 100);
        assert!(created);
        chan.members.insert(users[0], MemberModes::op());
        chan.members.insert(users[1], MemberModes::default());

        let (chan, created) = channels.get_or_create("#rust", 200);
        assert!(!created);
        assert_eq!(chan.created_at, 100);
        assert_eq!(chan.name, "#Rust");

        assert_eq!(channels.part("#RUST", users[0]), Some(false));
        assert_eq!(channels.part("#rust", users[0]), None);
        assert_eq!(channels.part("#rust", users[1]), Some(true));
        assert!(channels.is_empty());
    }

    #[test]
    fn test_members_at_least() {
        let users = refs(3);
        let mut chan = Channel::new("#c", 0);
        chan.members.insert(users[0], MemberModes::op());
        chan.members.insert(users[1], MemberModes::halfop());
        chan.members.insert(users[2], MemberModes::voice());
        assert_eq!(chan.members_at_least(HALFOP_VALUE).count(), 2);
        assert_eq!(chan.members_at_least(OP_VALUE).collect::<Vec<_>>(), vec![users[0]]);
        assert_eq!(chan.rank_of(users[2]), VOICE_VALUE);
    }
}
