//! The Matrix - central server state.
//!
//! The Matrix owns the identity registry, the clone tracker, the ban
//! rules, the invites and the channels, and is owned in turn by the core
//! actor, so every mutation runs on one task. The stores never call into
//! each other; operations that touch several of them (admission, quit,
//! applying a ban) are sequenced here.

use std::net::IpAddr;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::casemap::{irc_to_lower, is_channel_name, is_valid_nick};
use crate::clock::Clock;
use crate::config::Config;
use crate::duration::format_duration;
use crate::error::HandlerError;
use crate::message::{Command, Message, Response};
use crate::metrics;
use crate::security::{XLine, XLineError, XLineKind};
use crate::state::channel::{ChannelManager, MemberModes};
use crate::state::hooks::{HookRegistry, ModResult};
use crate::state::managers::{
    AddOutcome, CloneTracker, InviteManager, RegistryError, ServerStats, UserManager, XLineManager,
};
use crate::state::observer::StateObserver;
use crate::state::outbox::Outbox;
use crate::state::{ConnectionInfo, OperInfo, PeerServer, User, UserRef};

/// Penalty charged per command.
const COMMAND_PENALTY: u32 = 1000;

/// Result of admitting a new local connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Accepted(UserRef),
    /// The identity was created and immediately quit.
    Refused { user: UserRef, reason: String },
}

impl Admission {
    pub fn user(&self) -> UserRef {
        match self {
            Admission::Accepted(user) | Admission::Refused { user, .. } => *user,
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, Admission::Accepted(_))
    }
}

/// What storing a ban rule did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct XLineApplied {
    /// An older rule with the same kind and mask was replaced.
    pub replaced: bool,
    /// Local identities disconnected or renamed by the rule.
    pub affected: usize,
}

/// Work done by one maintenance pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaintenanceReport {
    pub registration_timeouts: usize,
    pub ping_timeouts: usize,
    pub pings_sent: usize,
    pub resumed: usize,
    pub invites_expired: usize,
    pub xlines_expired: usize,
}

/// Central server state.
pub struct Matrix {
    /// This server.
    pub server: Arc<PeerServer>,
    pub config: Config,
    pub users: UserManager,
    pub clones: CloneTracker,
    pub xlines: XLineManager,
    pub invites: InviteManager,
    pub channels: ChannelManager,
    pub stats: ServerStats,
    pub hooks: HookRegistry,
    outbox: Arc<dyn Outbox>,
    observer: Arc<dyn StateObserver>,
    clock: Arc<dyn Clock>,
}

impl Matrix {
    pub fn new(
        config: Config,
        outbox: Arc<dyn Outbox>,
        observer: Arc<dyn StateObserver>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let server = Arc::new(PeerServer::new(
            config.server.name.clone(),
            config.server.sid.clone(),
        ));
        let started_at = clock.now();
        Self {
            users: UserManager::new(server.clone()),
            clones: CloneTracker::new(&config.clones),
            xlines: XLineManager::new(config.insane.clone()),
            invites: InviteManager::new(),
            channels: ChannelManager::new(),
            stats: ServerStats::new(started_at),
            hooks: HookRegistry::new(),
            server,
            config,
            outbox,
            observer,
            clock,
        }
    }

    #[inline]
    pub fn now(&self) -> i64 {
        self.clock.now()
    }

    #[inline]
    pub fn server_name(&self) -> &str {
        &self.server.name
    }

    pub fn observer(&self) -> &dyn StateObserver {
        self.observer.as_ref()
    }

    // ------------------------------------------------------------------
    // Delivery
    // ------------------------------------------------------------------

    /// Deliver `msg` to `r`. Replies to identities owned by peers are
    /// handed to the observer for routing.
    pub fn send(&mut self, r: UserRef, msg: Message) {
        let Some(user) = self.users.get_mut(r) else {
            return;
        };
        match user.local.as_mut() {
            Some(local) => {
                local.cmds_out += 1;
                local.bytes_out += msg.to_string().len() as u64 + 2;
                self.outbox.send(&user.uid, msg);
            }
            None => self.observer.on_remote_reply(&user.uid, &msg),
        }
    }

    /// Send a numeric to `r`; its nick is prepended to `params`.
    pub fn reply(&mut self, r: UserRef, response: Response, mut params: Vec<String>) {
        let Some(user) = self.users.get(r) else {
            return;
        };
        params.insert(0, user.nick_or_star().to_string());
        let msg = Message::new(Command::Response(response, params)).with_prefix(self.server_name());
        self.send(r, msg);
    }

    /// Send a server NOTICE to `r`.
    pub fn notice(&mut self, r: UserRef, text: impl Into<String>) {
        let Some(user) = self.users.get(r) else {
            return;
        };
        let msg = Message::new(Command::Notice(user.nick_or_star().to_string(), text.into()))
            .with_prefix(self.server_name());
        self.send(r, msg);
    }

    /// Server notice to local operators subscribed to `category`.
    pub fn snotice(&mut self, category: char, text: &str) {
        info!(target: "snotice", category = %category, "{text}");
        for r in self.users.oper_refs() {
            let subscribed = self
                .users
                .get(r)
                .is_some_and(|user| user.is_local() && user.modes.has_snomask(category));
            if subscribed {
                self.notice(r, format!("*** {text}"));
            }
        }
    }

    /// Local members of `channel` ranked at least `min_rank`, except `except`.
    pub fn channel_audience(
        &self,
        channel: &str,
        min_rank: u32,
        except: Option<UserRef>,
    ) -> Vec<UserRef> {
        let Some(chan) = self.channels.find(channel) else {
            return Vec::new();
        };
        chan.members_at_least(min_rank)
            .filter(|member| Some(*member) != except)
            .filter(|member| self.users.get(*member).is_some_and(User::is_local))
            .collect()
    }

    /// Local identities sharing a channel with `r`, each listed once.
    pub fn neighbors(&mut self, r: UserRef, include_self: bool) -> Vec<UserRef> {
        let token = self.users.next_fanout_token();
        let Some(user) = self.users.get(r) else {
            return Vec::new();
        };
        let channels: Vec<String> = user.channels.iter().cloned().collect();

        let mut out = Vec::new();
        if include_self {
            if let Some(local) = self.users.get_mut(r).and_then(|u| u.local.as_mut()) {
                local.already_sent = token;
                out.push(r);
            }
        } else if let Some(local) = self.users.get_mut(r).and_then(|u| u.local.as_mut()) {
            local.already_sent = token;
        }

        for name in &channels {
            let Some(chan) = self.channels.find(name) else {
                continue;
            };
            for member in chan.members.keys() {
                let Some(local) = self.users.get_mut(*member).and_then(|u| u.local.as_mut()) else {
                    continue;
                };
                if local.already_sent != token {
                    local.already_sent = token;
                    out.push(*member);
                }
            }
        }
        out
    }

    // ------------------------------------------------------------------
    // Identity lifecycle
    // ------------------------------------------------------------------

    /// Register and admit a new local connection.
    pub fn accept(&mut self, conn: ConnectionInfo) -> Admission {
        self.accept_with(conn, |_| {})
    }

    /// Like [`Matrix::accept`], calling `on_allocated` with the new UID
    /// before any admission check can queue output for it.
    pub fn accept_with(&mut self, conn: ConnectionInfo, on_allocated: impl FnOnce(&str)) -> Admission {
        let now = self.now();
        self.stats.connections += 1;
        let r = self.users.register_local(conn, now);

        match self.admit(r, on_allocated) {
            None => {
                self.stats.accepts += 1;
                metrics::record_admission(true);
                Admission::Accepted(r)
            }
            Some(reason) => {
                self.stats.refused += 1;
                metrics::record_admission(false);
                info!(ip = %conn.client.ip(), reason = %reason, "Connection refused");
                self.quit_user(r, &reason, None);
                Admission::Refused { user: r, reason }
            }
        }
    }

    /// Admission checks. Returns the refusal reason, if any.
    fn admit(&mut self, r: UserRef, on_allocated: impl FnOnce(&str)) -> Option<String> {
        let now = self.now();
        let Some(user) = self.users.get(r) else {
            return Some("Internal error".to_string());
        };
        on_allocated(&user.uid);
        self.clones.add_clone(user);
        self.refresh_exempt(r, now);

        let max_clients = self.config.limits.max_clients;
        if max_clients > 0 && self.users.local_connections() > max_clients {
            return Some("No more connections allowed".to_string());
        }

        let Some(user) = self.users.get(r) else {
            return Some("Internal error".to_string());
        };
        if self.hooks.user_register(user) == ModResult::Deny {
            return Some("Connection refused".to_string());
        }

        let counts = self.clones.counts(user);
        let ip = user.ip;
        let limits = &self.config.limits;
        let exceeded = if limits.local_max > 0 && counts.local > limits.local_max {
            Some(("local", limits.local_max))
        } else if limits.global_max > 0 && counts.global > limits.global_max {
            Some(("global", limits.global_max))
        } else {
            None
        };
        if let Some((scope, max)) = exceeded {
            self.snotice(
                'a',
                &format!("WARNING: maximum {scope} connections ({max}) exceeded for IP {ip}"),
            );
            return Some(format!(
                "No more connections allowed from your host via this connect class ({scope})"
            ));
        }

        self.check_lines(r, true)
    }

    /// Re-evaluate the E-line exemption of `r`.
    fn refresh_exempt(&mut self, r: UserRef, now: i64) -> bool {
        let exempt = self
            .users
            .get(r)
            .is_some_and(|user| self.xlines.is_exempt(user, now));
        if let Some(user) = self.users.get_mut(r) {
            user.exempt = exempt;
        }
        exempt
    }

    /// Disconnect `r` if a ban rule matches it, returning the quit reason.
    /// Exempt identities are skipped. Z-lines are only checked when
    /// `connecting`.
    pub fn check_lines(&mut self, r: UserRef, connecting: bool) -> Option<String> {
        let now = self.now();
        let user = self.users.get(r)?;
        if user.exempt || user.is_quitting() {
            return None;
        }
        let hit = XLineKind::bans_at(connecting)
            .iter()
            .find_map(|kind| self.xlines.matches(*kind, user, now))
            .map(|line| (line.kind, line.reason.clone(), line.quit_reason()));
        let (kind, reason, quit_reason) = hit?;

        let who = format!("{}!{}", user.nick_or_star(), user.user_host());
        self.snotice('x', &format!("{kind} active for {who}: {reason}"));
        self.quit_user(r, &quit_reason, None);
        Some(quit_reason)
    }

    /// Set or change the nickname of `r`.
    ///
    /// Local identities may not take a Q-lined nickname.
    pub fn set_nick(&mut self, r: UserRef, nick: &str) -> Result<Option<String>, HandlerError> {
        let now = self.now();
        if !is_valid_nick(nick, self.config.limits.nick_max_len) {
            return Err(HandlerError::ErroneousNickname {
                nick: nick.to_string(),
                reason: "Erroneous Nickname".to_string(),
            });
        }
        let user = self.users.get(r).ok_or(HandlerError::NotRegistered)?;

        if user.is_local()
            && let Some(line) = self.xlines.matches_nick(nick, now)
        {
            let reason = line.reason.clone();
            if user.is_registered() {
                let who = format!("{}!{}", user.nick_or_star(), user.user_host());
                self.snotice('x', &format!("Q-lined nickname {nick} from {who}: {reason}"));
            }
            return Err(HandlerError::ErroneousNickname {
                nick: nick.to_string(),
                reason: format!("Invalid nickname: {reason}"),
            });
        }

        self.rename(r, nick).map_err(|e| match e {
            RegistryError::NickInUse(nick) => HandlerError::NicknameInUse(nick),
            other => HandlerError::Internal(other.to_string()),
        })
    }

    /// Change the nick in the registry and tell neighbors.
    fn rename(&mut self, r: UserRef, nick: &str) -> Result<Option<String>, RegistryError> {
        let old_mask = self.users.get(r).map(User::mask);
        let old = self.users.set_nick(r, nick)?;
        let registered = self.users.get(r).is_some_and(User::is_registered);
        if registered
            && let Some(old_mask) = old_mask
            && old.as_deref() != Some(nick)
        {
            let msg = Message::new(Command::Nick(nick.to_string())).with_prefix(old_mask);
            for n in self.neighbors(r, true) {
                self.send(n, msg.clone());
            }
        }
        Ok(old)
    }

    /// Finish the registration handshake of `r`.
    ///
    /// Returns false if `r` could not register or was banned on the way.
    pub fn complete_registration(&mut self, r: UserRef, ident: &str, realname: &str) -> bool {
        let now = self.now();
        let Some(user) = self.users.get_mut(r) else {
            return false;
        };
        if user.nick.is_none() || !user.is_local() {
            return false;
        }
        user.ident = ident.to_string();
        user.realname = realname.to_string();
        if !self.users.mark_registered(r) {
            return false;
        }

        self.refresh_exempt(r, now);
        if self.check_lines(r, false).is_some() {
            return false;
        }

        let ping = i64::try_from(self.config.idle_timeouts.ping).unwrap_or(i64::MAX);
        let Some(user) = self.users.get_mut(r) else {
            return false;
        };
        if let Some(local) = user.local.as_mut() {
            local.next_ping = now.saturating_add(ping);
            local.ping_ok = true;
            local.idle_lastmsg = now;
        }
        let port = user.local.as_ref().map_or(0, |local| local.conn.server.port());
        let text = format!(
            "Client connecting on port {port}: {}!{} ({}) [{}]",
            user.nick_or_star(),
            user.user_host(),
            user.ip,
            user.realname
        );
        debug!(uid = %user.uid, "Registration complete");
        self.snotice('c', &text);
        true
    }

    /// Admit an identity owned by a peer.
    pub fn introduce_remote(&mut self, user: User) -> Result<UserRef, RegistryError> {
        let r = self.users.introduce_remote(user)?;
        if let Some(user) = self.users.get(r) {
            self.clones.add_clone(user);
        }
        Ok(r)
    }

    /// Grant operator status, or revoke it with `None`.
    pub fn set_oper(&mut self, r: UserRef, oper: Option<OperInfo>, snomasks: &str) {
        let revoke = oper.is_none();
        self.users.set_oper(r, oper);
        if let Some(user) = self.users.get_mut(r) {
            user.modes.snomasks.clear();
            if !revoke {
                user.modes.snomasks.extend(snomasks.chars());
            }
        }
    }

    /// The address of a local identity changed.
    pub fn set_client_ip(&mut self, r: UserRef, ip: IpAddr) {
        let now = self.now();
        let Some(user) = self.users.get(r) else {
            return;
        };
        if user.is_quitting() || !user.is_local() {
            return;
        }
        self.clones.remove_clone(user);
        if let Some(user) = self.users.get_mut(r) {
            user.ip = ip;
            user.real_host = ip.to_string();
            user.host = ip.to_string();
        }
        if let Some(user) = self.users.get(r) {
            self.clones.add_clone(user);
        }
        self.refresh_exempt(r, now);
        self.check_lines(r, true);
    }

    /// The resolved host of a local identity changed.
    pub fn change_real_host(&mut self, r: UserRef, host: &str) {
        let now = self.now();
        let Some(user) = self.users.get_mut(r) else {
            return;
        };
        if user.is_quitting() || !user.is_local() {
            return;
        }
        if user.host == user.real_host {
            user.host = host.to_string();
        }
        user.real_host = host.to_string();
        self.refresh_exempt(r, now);
        self.check_lines(r, false);
    }

    /// Disconnect `r`. Idempotent.
    ///
    /// Neighbors hear `reason`; operators and the log see `oper_reason`
    /// when given. The identity stays addressable until [`Matrix::cull`].
    pub fn quit_user(&mut self, r: UserRef, reason: &str, oper_reason: Option<&str>) -> bool {
        let Some(user) = self.users.get(r) else {
            return false;
        };
        if user.is_quitting() {
            return false;
        }
        let oper_reason = oper_reason.unwrap_or(reason).to_string();
        let uid = user.uid.clone();
        let local = user.is_local();
        let registered = user.is_registered();
        let mask = user.mask();
        let user_host = user.user_host();
        let nick = user.nick_or_star().to_string();
        let server_name = user.server.name.clone();
        let channels: Vec<String> = user.channels.iter().cloned().collect();

        if local {
            let error = Message::new(Command::Error(format!(
                "Closing link: ({user_host}) [{oper_reason}]"
            )));
            self.send(r, error);
        }

        if registered {
            let quit = Message::new(Command::Quit(reason.to_string())).with_prefix(mask);
            for n in self.neighbors(r, false) {
                self.send(n, quit.clone());
            }
            if local {
                self.snotice('q', &format!("Client exiting: {nick} ({user_host}) [{oper_reason}]"));
            } else {
                self.snotice(
                    'Q',
                    &format!("Client exiting on server {server_name}: {nick} ({user_host}) [{oper_reason}]"),
                );
            }
        }

        if let Some(user) = self.users.get(r) {
            self.clones.remove_clone(user);
        }
        if local {
            self.invites.remove_user(r);
        }
        for name in &channels {
            if self.channels.part(name, r) == Some(true) {
                self.invites.remove_channel(name);
            }
        }
        if let Some(user) = self.users.get_mut(r) {
            user.channels.clear();
        }
        self.users.quit(r);

        info!(uid = %uid, reason = %oper_reason, "User quit");
        if local {
            self.outbox.detach(&uid);
            self.observer.on_user_quit(&uid, reason);
        }
        true
    }

    /// Destroy identities that quit during this processing cycle.
    pub fn cull(&mut self) -> usize {
        self.users.cull()
    }

    // ------------------------------------------------------------------
    // Activity accounting
    // ------------------------------------------------------------------

    /// Account one inbound command of `bytes` bytes from `r`.
    pub fn note_command(&mut self, r: UserRef, command: &str, bytes: usize) {
        self.add_penalty(r, COMMAND_PENALTY);
        let now = self.now();
        let Some(local) = self.users.get_mut(r).and_then(|u| u.local.as_mut()) else {
            return;
        };
        local.cmds_in += 1;
        local.bytes_in += bytes as u64;
        if !matches!(command, "PING" | "PONG") {
            local.idle_lastmsg = now;
        }
    }

    /// Add command-flood penalty to a local identity, pausing its input
    /// once the threshold is crossed.
    pub fn add_penalty(&mut self, r: UserRef, amount: u32) {
        let threshold = self.config.limits.penalty_threshold;
        let Some(user) = self.users.get_mut(r) else {
            return;
        };
        let Some(local) = user.local.as_mut() else {
            return;
        };
        local.penalty = local.penalty.saturating_add(amount);
        if !local.throttled && local.penalty > threshold {
            local.throttled = true;
            debug!(uid = %user.uid, penalty = local.penalty, "Input throttled");
            self.outbox.pause_input(&user.uid);
        }
    }

    pub fn note_pong(&mut self, r: UserRef) {
        if let Some(local) = self.users.get_mut(r).and_then(|u| u.local.as_mut()) {
            local.ping_ok = true;
        }
    }

    // ------------------------------------------------------------------
    // Ban rules
    // ------------------------------------------------------------------

    /// Store and enforce a ban rule.
    ///
    /// Rules originated here (`local_origin`) must pass the insane check
    /// and global kinds are propagated; rules from peers are stored as-is.
    pub fn add_xline(&mut self, line: XLine, local_origin: bool) -> Result<XLineApplied, XLineError> {
        let outcome = if local_origin {
            self.xlines
                .add(line.clone(), self.users.iter().map(|(_, user)| user))?
        } else {
            self.xlines.insert(line.clone())
        };
        let replaced = matches!(outcome, AddOutcome::Replaced(_));
        let now = self.now();

        let affected = match line.kind {
            XLineKind::E => {
                for r in self.users.local_refs() {
                    self.refresh_exempt(r, now);
                }
                0
            }
            XLineKind::Q => self.apply_qline(&line),
            _ => self.apply_ban(&line),
        };
        metrics::record_xline_enforced(line.kind.letter(), affected);

        if local_origin && line.kind.is_global() {
            self.observer.on_ban_add(&line);
        }

        let text = if line.duration == 0 {
            format!(
                "{} added a permanent {} on {}: {}",
                line.set_by, line.kind, line.mask, line.reason
            )
        } else {
            format!(
                "{} added a timed {} on {}, expires in {}: {}",
                line.set_by,
                line.kind,
                line.mask,
                format_duration(line.duration),
                line.reason
            )
        };
        self.snotice('x', &text);
        Ok(XLineApplied { replaced, affected })
    }

    fn apply_ban(&mut self, line: &XLine) -> usize {
        let mut affected = 0;
        for r in self.users.local_refs() {
            let hit = self
                .users
                .get(r)
                .is_some_and(|user| !user.exempt && !user.is_quitting() && line.matches(user));
            if hit && self.quit_user(r, &line.quit_reason(), None) {
                affected += 1;
            }
        }
        affected
    }

    /// Registered local users holding a Q-lined nick are renamed to their UID.
    fn apply_qline(&mut self, line: &XLine) -> usize {
        let mut affected = 0;
        for r in self.users.local_refs() {
            let Some(user) = self.users.get(r) else {
                continue;
            };
            if user.exempt || !user.is_registered() || !line.matches(user) {
                continue;
            }
            let uid = user.uid.clone();
            match self.rename(r, &uid) {
                Ok(_) => affected += 1,
                Err(e) => warn!(uid = %uid, error = %e, "Could not force nick change"),
            }
        }
        affected
    }

    /// Remove a ban rule. Identities that lose an exemption are re-checked.
    pub fn remove_xline(
        &mut self,
        kind: XLineKind,
        mask: &str,
        remover: &str,
        local_origin: bool,
    ) -> Option<XLine> {
        let removed = self.xlines.remove(kind, mask)?;
        if kind == XLineKind::E {
            self.reevaluate_exemptions();
        }
        if local_origin && kind.is_global() {
            self.observer.on_ban_remove(kind, &removed.mask, remover);
        }
        self.snotice(
            'x',
            &format!("{remover} removed {kind} on {}: {}", removed.mask, removed.reason),
        );
        Some(removed)
    }

    /// Refresh every local exemption, re-checking all lines for
    /// identities that lost one. Returns how many were disconnected.
    fn reevaluate_exemptions(&mut self) -> usize {
        let now = self.now();
        let mut disconnected = 0;
        for r in self.users.local_refs() {
            let was_exempt = self.users.get(r).is_some_and(|user| user.exempt);
            if was_exempt && !self.refresh_exempt(r, now) && self.check_lines(r, true).is_some() {
                disconnected += 1;
            }
        }
        disconnected
    }

    // ------------------------------------------------------------------
    // Channels
    // ------------------------------------------------------------------

    /// Add `r` to `name`, creating it if needed. The creator gets ops.
    ///
    /// Local identities need an invite, an invite exception or a hook's
    /// approval to enter an invite-only channel; the invite is consumed.
    pub fn join_channel(&mut self, r: UserRef, name: &str) -> Result<(), HandlerError> {
        if !is_channel_name(name) {
            return Err(HandlerError::NoSuchChannel(name.to_string()));
        }
        let now = self.now();
        let key = irc_to_lower(name);
        let user = self.users.get(r).ok_or(HandlerError::NotRegistered)?;
        if user.channels.contains(&key) {
            return Ok(());
        }

        if user.is_local()
            && let Some(chan) = self.channels.find(name)
            && chan.invite_only
            && !self.invites.is_invited(r, name, now)
            && self.hooks.check_invite(user, chan) != ModResult::Allow
        {
            return Err(HandlerError::InviteOnlyChan(chan.name.clone()));
        }

        let mask = user.mask();
        let (chan, created) = self.channels.get_or_create(name, now);
        let modes = if created { MemberModes::op() } else { MemberModes::default() };
        chan.members.insert(r, modes);
        let channel_name = chan.name.clone();
        self.invites.remove(r, name);
        if let Some(user) = self.users.get_mut(r) {
            user.channels.insert(key);
        }

        debug!(channel = %channel_name, created, "Join");
        let join = Message::new(Command::Join(channel_name.clone())).with_prefix(mask);
        for member in self.channel_audience(&channel_name, 0, None) {
            self.send(member, join.clone());
        }
        Ok(())
    }

    /// Remove `r` from `name`, destroying it (and its invites) when empty.
    pub fn part_channel(
        &mut self,
        r: UserRef,
        name: &str,
        reason: Option<&str>,
    ) -> Result<(), HandlerError> {
        let chan = self
            .channels
            .find(name)
            .ok_or_else(|| HandlerError::NoSuchChannel(name.to_string()))?;
        if !chan.has_member(r) {
            return Err(HandlerError::NotOnChannel(chan.name.clone()));
        }
        let channel_name = chan.name.clone();
        let mask = self.users.get(r).map(User::mask).unwrap_or_default();

        let part = Message::new(Command::Part(channel_name.clone(), reason.map(str::to_string)))
            .with_prefix(mask);
        for member in self.channel_audience(&channel_name, 0, None) {
            self.send(member, part.clone());
        }

        if self.channels.part(name, r) == Some(true) {
            let dropped = self.invites.remove_channel(name);
            debug!(channel = %channel_name, invites = dropped, "Channel destroyed");
        }
        if let Some(user) = self.users.get_mut(r) {
            user.channels.remove(&irc_to_lower(name));
        }
        Ok(())
    }

    /// Settle a creation-time conflict with a peer.
    ///
    /// If the peer's timestamp is older the local side loses: it adopts the
    /// older timestamp and drops its modes, ranks, exceptions and invites
    /// for the channel. Returns true if local state was discarded.
    pub fn merge_channel_ts(&mut self, name: &str, remote_ts: i64) -> bool {
        let Some(chan) = self.channels.find_mut(name) else {
            return false;
        };
        if remote_ts >= chan.created_at {
            return false;
        }
        info!(channel = %chan.name, local_ts = chan.created_at, remote_ts, "Channel TS lowered");
        chan.created_at = remote_ts;
        chan.invite_only = false;
        chan.invex.clear();
        for modes in chan.members.values_mut() {
            *modes = MemberModes::default();
        }
        self.invites.remove_channel(name);
        true
    }

    // ------------------------------------------------------------------
    // Maintenance
    // ------------------------------------------------------------------

    /// Periodic per-connection housekeeping followed by the invite and
    /// ban-rule expiry sweeps.
    pub fn maintenance(&mut self) -> MaintenanceReport {
        let now = self.now();
        let mut report = MaintenanceReport::default();
        let ping = i64::try_from(self.config.idle_timeouts.ping).unwrap_or(i64::MAX);
        let registration = i64::try_from(self.config.idle_timeouts.registration).unwrap_or(i64::MAX);
        let command_rate = self.config.limits.command_rate;
        let threshold = self.config.limits.penalty_threshold;

        for r in self.users.local_refs() {
            let Some(user) = self.users.get(r) else {
                continue;
            };
            let Some(local) = user.local.as_ref() else {
                continue;
            };

            if user.is_registered() {
                if now >= local.next_ping {
                    if !local.ping_ok {
                        let secs = now - (local.next_ping - ping);
                        self.quit_user(r, &format!("Ping timeout: {secs} seconds"), None);
                        report.ping_timeouts += 1;
                        continue;
                    }
                    let msg = Message::new(Command::Ping(self.server.name.clone()));
                    self.send(r, msg);
                    if let Some(local) = self.users.get_mut(r).and_then(|u| u.local.as_mut()) {
                        local.ping_ok = false;
                        local.next_ping = now.saturating_add(ping);
                    }
                    report.pings_sent += 1;
                }
            } else if now > user.signon.saturating_add(registration) {
                self.quit_user(r, "Registration timeout", None);
                report.registration_timeouts += 1;
                continue;
            }

            let Some(user) = self.users.get_mut(r) else {
                continue;
            };
            let Some(local) = user.local.as_mut() else {
                continue;
            };
            local.penalty = local.penalty.saturating_sub(command_rate);
            if local.throttled && local.penalty <= threshold {
                local.throttled = false;
                self.outbox.resume_input(&user.uid);
                report.resumed += 1;
            }
        }

        report.invites_expired = self.invites.sweep(now);

        let expired = self.xlines.expire(now);
        report.xlines_expired = expired.len();
        for line in &expired {
            let age = format_duration(u64::try_from(now - line.set_time).unwrap_or(0));
            self.snotice(
                'x',
                &format!(
                    "Removing expired {} {} (set by {} {} ago): {}",
                    line.kind, line.mask, line.set_by, age, line.reason
                ),
            );
        }
        if expired.iter().any(|line| line.kind == XLineKind::E) {
            self.reevaluate_exemptions();
        }

        metrics::set_population(self.users.total(), self.channels.len());

        if report != MaintenanceReport::default() {
            debug!(?report, "Maintenance pass");
        }
        report
    }

    /// Apply a new configuration.
    ///
    /// Clone counts are rebuilt when the range sizes changed. The server's
    /// own name and SID are fixed at startup.
    pub fn rehash(&mut self, config: Config) {
        self.xlines.set_insane(config.insane.clone());
        if self.clones.reconfigure(&config.clones) {
            self.clones.rehash(self.users.iter().map(|(_, user)| user));
            info!(ranges = self.clones.len(), "Clone ranges changed, counts rebuilt");
        }
        self.config = config;
        info!("Configuration reloaded");
    }
}
