//! User management state and behavior.
//!
//! This module contains the `UserManager` struct, the identity registry.
//! Identities live in a generation-checked arena; the nick map and the UID
//! map index into it and are kept in lockstep by every mutation here.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, trace};

use crate::casemap::irc_to_lower;
use crate::state::arena::{UserArena, UserRef};
use crate::state::uid::UidGenerator;
use crate::state::user::{ConnectionInfo, OperInfo, PeerServer, RegState, User};

/// Registry conflicts caused by external input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("nickname in use: {0}")]
    NickInUse(String),
    #[error("duplicate UID: {0}")]
    DuplicateUid(String),
    #[error("no such identity")]
    NoSuchUser,
}

/// Manages all identities known to this server.
///
/// The UserManager is responsible for:
/// - Allocating UIDs for local connections and admitting remote identities.
/// - Keeping the nick and UID indexes consistent.
/// - Tracking local, operator and service identities and the unregistered count.
/// - Deferring destruction of quitting identities to [`UserManager::cull`].
/// - Issuing fanout tokens for deduplicated delivery.
#[derive(Debug)]
pub struct UserManager {
    arena: UserArena,
    nicks: HashMap<String, UserRef>,
    uids: HashMap<String, UserRef>,
    local: BTreeSet<UserRef>,
    opers: BTreeSet<UserRef>,
    services: HashSet<UserRef>,
    unregistered: usize,
    culls: Vec<UserRef>,
    already_sent_id: u64,
    uid_gen: UidGenerator,
    server: Arc<PeerServer>,
}

impl UserManager {
    pub fn new(server: Arc<PeerServer>) -> Self {
        Self {
            arena: UserArena::new(),
            nicks: HashMap::new(),
            uids: HashMap::new(),
            local: BTreeSet::new(),
            opers: BTreeSet::new(),
            services: HashSet::new(),
            unregistered: 0,
            culls: Vec::new(),
            already_sent_id: 0,
            uid_gen: UidGenerator::new(server.sid.clone()),
            server,
        }
    }

    /// Allocate an unregistered local identity for an accepted connection.
    ///
    /// # Panics
    ///
    /// If the generated UID is already registered.
    pub fn register_local(&mut self, conn: ConnectionInfo, now: i64) -> UserRef {
        let uid = self.uid_gen.next_uid();
        assert!(!self.uids.contains_key(&uid), "UID {uid} allocated twice");

        let user = User::local(uid.clone(), self.server.clone(), conn, now);
        let r = self.arena.insert(user);
        self.uids.insert(uid.clone(), r);
        self.local.insert(r);
        self.unregistered += 1;
        debug!(uid = %uid, ip = %conn.client.ip(), "Local identity allocated");
        r
    }

    /// Admit an identity owned by a peer.
    pub fn introduce_remote(&mut self, mut user: User) -> Result<UserRef, RegistryError> {
        if self.uids.contains_key(&user.uid) {
            return Err(RegistryError::DuplicateUid(user.uid));
        }
        let nick_key = user.nick.as_deref().map(irc_to_lower);
        if let Some(key) = &nick_key
            && self.nicks.contains_key(key)
        {
            return Err(RegistryError::NickInUse(user.nick.unwrap_or_default()));
        }

        user.local = None;
        user.state = RegState::Registered;
        let service = user.server.service;
        let oper = user.is_oper();
        let uid = user.uid.clone();

        let r = self.arena.insert(user);
        self.uids.insert(uid.clone(), r);
        if let Some(key) = nick_key {
            self.nicks.insert(key, r);
        }
        if service {
            self.services.insert(r);
        }
        if oper {
            self.opers.insert(r);
        }
        debug!(uid = %uid, "Remote identity introduced");
        Ok(r)
    }

    pub fn get(&self, r: UserRef) -> Option<&User> {
        self.arena.get(r)
    }

    pub fn get_mut(&mut self, r: UserRef) -> Option<&mut User> {
        self.arena.get_mut(r)
    }

    /// Look up by nick, or by UID when the key starts with a digit.
    pub fn find(&self, key: &str) -> Option<UserRef> {
        if key.starts_with(|c: char| c.is_ascii_digit()) {
            self.find_uid(key)
        } else {
            self.find_nick(key)
        }
    }

    pub fn find_nick(&self, nick: &str) -> Option<UserRef> {
        self.nicks.get(&irc_to_lower(nick)).copied()
    }

    pub fn find_uid(&self, uid: &str) -> Option<UserRef> {
        self.uids.get(uid).copied()
    }

    /// Change (or first set) the nickname of `r`.
    ///
    /// Returns the previous nickname. A case-only change of one's own nick
    /// is allowed.
    pub fn set_nick(&mut self, r: UserRef, nick: &str) -> Result<Option<String>, RegistryError> {
        let key = irc_to_lower(nick);
        if let Some(&owner) = self.nicks.get(&key)
            && owner != r
        {
            return Err(RegistryError::NickInUse(nick.to_string()));
        }

        let user = self.arena.get_mut(r).ok_or(RegistryError::NoSuchUser)?;
        if user.is_quitting() {
            return Err(RegistryError::NoSuchUser);
        }
        let old = user.nick.replace(nick.to_string());
        if let Some(old_nick) = &old {
            let old_key = irc_to_lower(old_nick);
            if old_key != key {
                self.nicks.remove(&old_key);
            }
        }
        self.nicks.insert(key, r);
        trace!(uid = %user.uid, old = ?old, new = %nick, "Nick changed");
        Ok(old)
    }

    /// Unregistered → Registered. Returns false if `r` was not unregistered.
    pub fn mark_registered(&mut self, r: UserRef) -> bool {
        let Some(user) = self.arena.get_mut(r) else {
            return false;
        };
        if user.state != RegState::Unregistered {
            return false;
        }
        user.state = RegState::Registered;
        self.unregistered -= 1;
        true
    }

    /// Grant or revoke operator status.
    pub fn set_oper(&mut self, r: UserRef, oper: Option<OperInfo>) {
        let Some(user) = self.arena.get_mut(r) else {
            return;
        };
        if user.is_quitting() {
            return;
        }
        if oper.is_some() {
            self.opers.insert(r);
        } else {
            self.opers.remove(&r);
        }
        user.modes.oper = oper;
    }

    /// Move `r` to Quitting and unlink it from every index.
    ///
    /// Returns false if `r` is unknown or already quitting. The identity
    /// itself stays readable through its handle until [`UserManager::cull`].
    pub fn quit(&mut self, r: UserRef) -> bool {
        let Some(user) = self.arena.get_mut(r) else {
            return false;
        };
        match user.state {
            RegState::Quitting => return false,
            RegState::Unregistered => self.unregistered -= 1,
            RegState::Registered => {}
        }
        user.state = RegState::Quitting;

        if let Some(nick) = &user.nick {
            let key = irc_to_lower(nick);
            if self.nicks.get(&key) == Some(&r) {
                self.nicks.remove(&key);
            }
        }
        self.uids.remove(&user.uid);
        self.local.remove(&r);
        self.opers.remove(&r);
        self.services.remove(&r);
        self.culls.push(r);
        true
    }

    /// Destroy every identity quit since the last cull.
    pub fn cull(&mut self) -> usize {
        let mut destroyed = 0;
        for r in std::mem::take(&mut self.culls) {
            if let Some(user) = self.arena.remove(r) {
                trace!(uid = %user.uid, "Identity destroyed");
                destroyed += 1;
            }
        }
        destroyed
    }

    /// Start a new deduplicated delivery.
    ///
    /// The returned token is strictly greater than every earlier one, so
    /// an identity whose `already_sent` equals it was reached during this
    /// delivery.
    pub fn next_fanout_token(&mut self) -> u64 {
        self.already_sent_id += 1;
        self.already_sent_id
    }

    /// Live identities, unregistered ones included.
    pub fn iter(&self) -> impl Iterator<Item = (UserRef, &User)> {
        self.arena.iter().filter(|(_, user)| !user.is_quitting())
    }

    /// Handles of local identities in allocation order.
    pub fn local_refs(&self) -> Vec<UserRef> {
        self.local.iter().copied().collect()
    }

    /// Handles of operators in allocation order.
    pub fn oper_refs(&self) -> Vec<UserRef> {
        self.opers.iter().copied().collect()
    }

    /// Every live identity.
    pub fn total(&self) -> usize {
        self.uids.len()
    }

    /// Registered local identities.
    pub fn local_count(&self) -> usize {
        self.local.len() - self.unregistered
    }

    /// Local connections, unregistered ones included.
    pub fn local_connections(&self) -> usize {
        self.local.len()
    }

    pub fn unregistered_count(&self) -> usize {
        self.unregistered
    }

    pub fn service_count(&self) -> usize {
        self.services.len()
    }

    pub fn oper_count(&self) -> usize {
        self.opers.len()
    }

    /// Registered identities that are not services.
    pub fn registered_count(&self) -> usize {
        self.uids.len() - self.unregistered - self.services.len()
    }

    /// Identities awaiting destruction.
    pub fn pending_culls(&self) -> usize {
        self.culls.len()
    }
}
