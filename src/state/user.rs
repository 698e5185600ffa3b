//! User-related types and state.

use std::collections::{BTreeSet, HashSet};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

/// Registration progress of an identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegState {
    /// Connected, handshake not finished.
    Unregistered,
    /// Fully registered.
    Registered,
    /// Quit; awaiting destruction at the end of the processing cycle.
    Quitting,
}

/// A server that owns identities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerServer {
    pub name: String,
    pub sid: String,
    /// Services (U-lined) server. Its users are not counted as real users.
    pub service: bool,
}

impl PeerServer {
    pub fn new(name: impl Into<String>, sid: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sid: sid.into(),
            service: false,
        }
    }

    pub fn services(name: impl Into<String>, sid: impl Into<String>) -> Self {
        Self {
            service: true,
            ..Self::new(name, sid)
        }
    }
}

/// Operator credentials.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperInfo {
    /// Operator type (e.g., "NetAdmin").
    pub oper_type: String,
    /// Privileges such as `servers/auspex`.
    pub privileges: HashSet<String>,
}

impl OperInfo {
    pub fn new(oper_type: impl Into<String>) -> Self {
        Self {
            oper_type: oper_type.into(),
            privileges: HashSet::new(),
        }
    }

    pub fn with_privilege(mut self, privilege: impl Into<String>) -> Self {
        self.privileges.insert(privilege.into());
        self
    }
}

/// User modes relevant to admission and notices.
#[derive(Debug, Default, Clone)]
pub struct UserModes {
    pub invisible: bool, // +i
    /// +o with its credentials.
    pub oper: Option<OperInfo>,
    /// +s - server notice categories (c, q, x, a, t, ...).
    pub snomasks: BTreeSet<char>,
}

impl UserModes {
    /// Check if user has a specific snomask.
    pub fn has_snomask(&self, mask: char) -> bool {
        self.snomasks.contains(&mask)
    }
}

/// The accepted socket behind a local identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionInfo {
    /// Opaque handle of the I/O task that owns the socket.
    pub conn_id: u64,
    /// Address the listener is bound to.
    pub listener: SocketAddr,
    /// Remote end.
    pub client: SocketAddr,
    /// Local end.
    pub server: SocketAddr,
}

impl ConnectionInfo {
    pub fn new(conn_id: u64, client: SocketAddr, server: SocketAddr) -> Self {
        Self {
            conn_id,
            listener: server,
            client,
            server,
        }
    }
}

/// State that exists only for identities connected to this server.
#[derive(Debug, Clone)]
pub struct LocalState {
    pub conn: ConnectionInfo,
    /// Last time the client sent a command that resets idle time.
    pub idle_lastmsg: i64,
    /// When the next PING is due.
    pub next_ping: i64,
    /// Whether the last PING was answered.
    pub ping_ok: bool,
    /// USER has been received; registration completes once a nick is set.
    pub user_received: bool,
    /// Accumulated command-flood penalty.
    pub penalty: u32,
    /// Input processing is paused until the penalty drains.
    pub throttled: bool,
    /// Fanout token of the last message delivered to this identity.
    pub already_sent: u64,
    pub cmds_in: u64,
    pub bytes_in: u64,
    pub cmds_out: u64,
    pub bytes_out: u64,
}

impl LocalState {
    pub fn new(conn: ConnectionInfo, now: i64) -> Self {
        Self {
            conn,
            idle_lastmsg: now,
            next_ping: now,
            ping_ok: true,
            user_received: false,
            penalty: 0,
            throttled: false,
            already_sent: 0,
            cmds_in: 0,
            bytes_in: 0,
            cmds_out: 0,
            bytes_out: 0,
        }
    }
}

/// A connected identity, local or owned by a peer.
#[derive(Debug, Clone)]
pub struct User {
    pub uid: String,
    /// Unregistered identities may not have picked a nick yet.
    pub nick: Option<String>,
    pub ident: String,
    pub realname: String,
    /// Resolved hostname (or the IP when unresolved).
    pub real_host: String,
    /// Host shown to other users.
    pub host: String,
    pub ip: IpAddr,
    pub state: RegState,
    pub server: Arc<PeerServer>,
    /// Matches an E-line; bypasses K/G/Z checks.
    pub exempt: bool,
    pub modes: UserModes,
    pub away: Option<String>,
    /// Channels this user is in (casemapped names).
    pub channels: HashSet<String>,
    /// Unix timestamp when this user connected.
    pub signon: i64,
    /// Present only for local identities.
    pub local: Option<LocalState>,
}

impl User {
    /// A new unregistered local identity.
    pub fn local(uid: String, server: Arc<PeerServer>, conn: ConnectionInfo, now: i64) -> Self {
        let ip = conn.client.ip();
        Self {
            uid,
            nick: None,
            ident: "unknown".to_string(),
            realname: String::new(),
            real_host: ip.to_string(),
            host: ip.to_string(),
            ip,
            state: RegState::Unregistered,
            server,
            exempt: false,
            modes: UserModes::default(),
            away: None,
            channels: HashSet::new(),
            signon: now,
            local: Some(LocalState::new(conn, now)),
        }
    }

    /// A registered identity introduced by a peer.
    pub fn remote(
        uid: impl Into<String>,
        nick: impl Into<String>,
        ident: impl Into<String>,
        host: impl Into<String>,
        ip: IpAddr,
        server: Arc<PeerServer>,
        signon: i64,
    ) -> Self {
        let host = host.into();
        Self {
            uid: uid.into(),
            nick: Some(nick.into()),
            ident: ident.into(),
            realname: String::new(),
            real_host: host.clone(),
            host,
            ip,
            state: RegState::Registered,
            server,
            exempt: false,
            modes: UserModes::default(),
            away: None,
            channels: HashSet::new(),
            signon,
            local: None,
        }
    }

    #[inline]
    pub fn is_local(&self) -> bool {
        self.local.is_some()
    }

    #[inline]
    pub fn is_registered(&self) -> bool {
        self.state == RegState::Registered
    }

    #[inline]
    pub fn is_quitting(&self) -> bool {
        self.state == RegState::Quitting
    }

    #[inline]
    pub fn is_oper(&self) -> bool {
        self.modes.oper.is_some()
    }

    /// Whether this identity is an operator holding `privilege`.
    pub fn has_privilege(&self, privilege: &str) -> bool {
        self.modes
            .oper
            .as_ref()
            .is_some_and(|oper| oper.privileges.contains(privilege))
    }

    /// Nick, or `*` before one is chosen.
    pub fn nick_or_star(&self) -> &str {
        self.nick.as_deref().unwrap_or("*")
    }

    /// `nick!ident@host` as seen by other users.
    pub fn mask(&self) -> String {
        format!("{}!{}@{}", self.nick_or_star(), self.ident, self.host)
    }

    /// `ident@real_host`.
    pub fn user_host(&self) -> String {
        format!("{}@{}", self.ident, self.real_host)
    }

    /// `ident@ip`.
    pub fn user_ip(&self) -> String {
        format!("{}@{}", self.ident, self.ip)
    }
}
