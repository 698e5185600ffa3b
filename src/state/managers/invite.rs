//! Pending channel invitations.
//!
//! Only local identities hold invites. Each invite is indexed both from
//! its identity and from its channel, so quitting users and destroyed
//! channels drop their invites without a full scan.

use std::collections::{BTreeSet, HashMap};

use tracing::debug;

use crate::casemap::irc_to_lower;
use crate::config::InviteAnnounce;
use crate::state::UserRef;
use crate::state::channel::{HALFOP_VALUE, OP_VALUE};

/// A pending invitation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invite {
    /// Channel name as it was when the invite was issued.
    pub channel: String,
    /// Unix time the invite lapses; `None` never lapses.
    pub expiry: Option<i64>,
}

impl Invite {
    pub fn is_expired(&self, now: i64) -> bool {
        self.expiry.is_some_and(|expiry| now >= expiry)
    }
}

/// What [`InviteManager::create`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Created,
    /// An existing invite got a later (or no) expiry.
    Extended,
    /// An existing invite already outlasted the new one.
    Unchanged,
}

/// Holds invites per identity, with a reverse index per channel.
#[derive(Debug, Default)]
pub struct InviteManager {
    by_user: HashMap<UserRef, HashMap<String, Invite>>,
    by_channel: HashMap<String, BTreeSet<UserRef>>,
}

impl InviteManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Invite `user` to `channel`.
    ///
    /// If an invite already exists, a permanent request makes it permanent;
    /// otherwise the later expiry wins.
    pub fn create(&mut self, user: UserRef, channel: &str, expiry: Option<i64>) -> CreateOutcome {
        let key = irc_to_lower(channel);
        let invites = self.by_user.entry(user).or_default();

        if let Some(existing) = invites.get_mut(&key) {
            let extend = match (existing.expiry, expiry) {
                (None, _) => false,
                (Some(_), None) => true,
                (Some(old), Some(new)) => new > old,
            };
            if !extend {
                return CreateOutcome::Unchanged;
            }
            existing.expiry = expiry;
            return CreateOutcome::Extended;
        }

        invites.insert(
            key.clone(),
            Invite {
                channel: channel.to_string(),
                expiry,
            },
        );
        self.by_channel.entry(key).or_default().insert(user);
        debug!(channel = %channel, expiry = ?expiry, "Invite created");
        crate::metrics::record_invite();
        CreateOutcome::Created
    }

    /// Drop the invite of `user` to `channel`. Returns whether one existed.
    pub fn remove(&mut self, user: UserRef, channel: &str) -> bool {
        let key = irc_to_lower(channel);
        let Some(invites) = self.by_user.get_mut(&user) else {
            return false;
        };
        if invites.remove(&key).is_none() {
            return false;
        }
        if invites.is_empty() {
            self.by_user.remove(&user);
        }
        self.unlink_channel(&key, user);
        true
    }

    /// Whether `user` holds an unexpired invite to `channel`.
    ///
    /// An expired invite found here is removed.
    pub fn is_invited(&mut self, user: UserRef, channel: &str, now: i64) -> bool {
        let key = irc_to_lower(channel);
        let expired = match self.by_user.get(&user).and_then(|invites| invites.get(&key)) {
            None => return false,
            Some(invite) => invite.is_expired(now),
        };
        if expired {
            self.remove(user, channel);
            return false;
        }
        true
    }

    /// Unexpired invites held by `user`. Expired entries are skipped, not removed.
    pub fn list(&self, user: UserRef, now: i64) -> impl Iterator<Item = &Invite> {
        self.by_user
            .get(&user)
            .into_iter()
            .flat_map(|invites| invites.values())
            .filter(move |invite| !invite.is_expired(now))
    }

    /// Identities invited to `channel`, expired entries included.
    pub fn invited_to(&self, channel: &str) -> impl Iterator<Item = UserRef> + '_ {
        self.by_channel
            .get(&irc_to_lower(channel))
            .into_iter()
            .flat_map(|users| users.iter().copied())
    }

    /// Drop every invite of a quitting identity.
    pub fn remove_user(&mut self, user: UserRef) -> usize {
        let Some(invites) = self.by_user.remove(&user) else {
            return 0;
        };
        for key in invites.keys() {
            self.unlink_channel(key, user);
        }
        invites.len()
    }

    /// Drop every invite to a destroyed channel.
    pub fn remove_channel(&mut self, channel: &str) -> usize {
        let key = irc_to_lower(channel);
        let Some(users) = self.by_channel.remove(&key) else {
            return 0;
        };
        for user in &users {
            if let Some(invites) = self.by_user.get_mut(user) {
                invites.remove(&key);
                if invites.is_empty() {
                    self.by_user.remove(user);
                }
            }
        }
        users.len()
    }

    /// Purge expired invites.
    pub fn sweep(&mut self, now: i64) -> usize {
        let expired: Vec<(UserRef, String)> = self
            .by_user
            .iter()
            .flat_map(|(user, invites)| {
                invites
                    .iter()
                    .filter(|(_, invite)| invite.is_expired(now))
                    .map(|(key, _)| (*user, key.clone()))
            })
            .collect();
        for (user, key) in &expired {
            self.remove(*user, key);
        }
        expired.len()
    }

    pub fn len(&self) -> usize {
        self.by_user.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_user.is_empty()
    }

    fn unlink_channel(&mut self, key: &str, user: UserRef) {
        if let Some(users) = self.by_channel.get_mut(key) {
            users.remove(&user);
            if users.is_empty() {
                self.by_channel.remove(key);
            }
        }
    }
}

/// Who hears about a new invite: the status prefix used to address them
/// and the minimum rank, or `None` for nobody.
pub fn announce_audience(mode: InviteAnnounce, halfop_enabled: bool) -> Option<(char, u32)> {
    match mode {
        InviteAnnounce::None => None,
        InviteAnnounce::Ops => Some(('@', OP_VALUE)),
        InviteAnnounce::Dynamic if halfop_enabled => Some(('%', HALFOP_VALUE)),
        InviteAnnounce::Dynamic => Some(('@', OP_VALUE)),
    }
}
