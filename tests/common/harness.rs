//! In-process test server.

use std::net::SocketAddr;
use std::sync::Arc;

use slircd_gate::clock::ManualClock;
use slircd_gate::config::Config;
use slircd_gate::handlers::{Context, Registry};
use slircd_gate::message::{IncomingMessage, Message, Response};
use slircd_gate::state::{Admission, ConnectionInfo, Matrix, OperInfo, PeerServer, User, UserRef};

use super::recorder::{RecordingObserver, RecordingOutbox};

/// Start of the manual clock.
pub const START: i64 = 1_700_000_000;

/// A `Matrix` and `Registry` driven the way the core actor drives them.
pub struct Harness {
    pub matrix: Matrix,
    pub registry: Registry,
    pub clock: Arc<ManualClock>,
    pub outbox: Arc<RecordingOutbox>,
    pub observer: Arc<RecordingObserver>,
    peer: Arc<PeerServer>,
    next_conn: u64,
    next_remote: u32,
}

#[allow(dead_code)]
impl Harness {
    pub fn new() -> Self {
        Self::with_config(Self::config())
    }

    /// Test defaults: `irc.test.net`, SID `0AA`.
    pub fn config() -> Config {
        let mut config = Config::default();
        config.server.name = "irc.test.net".to_string();
        config.server.network = "TestNet".to_string();
        config.server.sid = "0AA".to_string();
        config
    }

    pub fn with_config(config: Config) -> Self {
        let clock = Arc::new(ManualClock::new(START));
        let outbox = Arc::new(RecordingOutbox::default());
        let observer = Arc::new(RecordingObserver::default());
        let matrix = Matrix::new(config, outbox.clone(), observer.clone(), clock.clone());
        Self {
            matrix,
            registry: Registry::new(),
            clock,
            outbox,
            observer,
            peer: Arc::new(PeerServer::new("peer.test.net", "1BB")),
            next_conn: 0,
            next_remote: 0,
        }
    }

    /// Accept a local connection from `ip`.
    pub fn connect(&mut self, ip: &str) -> Admission {
        self.next_conn += 1;
        let client = SocketAddr::new(ip.parse().expect("bad test IP"), 40000);
        let conn = ConnectionInfo::new(
            self.next_conn,
            client,
            "192.0.2.254:6667".parse().unwrap(),
        );
        let admission = self.matrix.accept(conn);
        self.matrix.cull();
        admission
    }

    /// Connect from `ip` and register as `nick`.
    pub fn register(&mut self, nick: &str, ip: &str) -> UserRef {
        let admission = self.connect(ip);
        let Admission::Accepted(r) = admission else {
            panic!("{nick} refused: {admission:?}");
        };
        self.command(r, &format!("NICK {nick}"));
        self.command(r, &format!("USER {nick} 0 * :{nick} test"));
        assert!(self.user(r).is_registered(), "{nick} did not register");
        r
    }

    /// Introduce a registered identity owned by `peer.test.net`.
    pub fn remote(&mut self, nick: &str, ip: &str) -> UserRef {
        self.next_remote += 1;
        let uid = format!("1BBAAA{:03}", self.next_remote);
        let user = User::remote(
            uid,
            nick,
            nick,
            format!("{nick}.peer.example"),
            ip.parse().unwrap(),
            self.peer.clone(),
            START,
        );
        self.matrix.introduce_remote(user).unwrap()
    }

    /// Make `r` an operator subscribed to every notice category.
    pub fn oper(&mut self, r: UserRef, privileges: &[&str]) {
        let oper = privileges
            .iter()
            .fold(OperInfo::new("NetAdmin"), |oper, p| oper.with_privilege(*p));
        self.matrix.set_oper(r, Some(oper), "acqtxQ");
    }

    /// Run one line from `r`, then end the processing cycle.
    pub fn command(&mut self, r: UserRef, line: &str) {
        let msg = IncomingMessage::parse(line).expect("blank line");
        if self.user(r).is_local() {
            self.matrix.note_command(r, msg.command_name(), line.len());
        }
        let mut ctx = Context::new(&mut self.matrix, r);
        self.registry.dispatch(&mut ctx, &msg);
        self.matrix.cull();
    }

    pub fn user(&self, r: UserRef) -> &User {
        self.matrix.users.get(r).expect("user gone")
    }

    pub fn is_alive(&self, r: UserRef) -> bool {
        self.matrix.users.get(r).is_some_and(|user| !user.is_quitting())
    }

    /// Whether `r` holds a live invite to `channel`.
    pub fn is_invited(&mut self, r: UserRef, channel: &str) -> bool {
        let now = self.matrix.now();
        self.matrix.invites.is_invited(r, channel, now)
    }

    pub fn uid(&self, r: UserRef) -> String {
        self.user(r).uid.clone()
    }

    /// Messages delivered to `r` (local) or routed to it (remote).
    pub fn sent(&self, r: UserRef) -> Vec<Message> {
        let uid = self.uid(r);
        if self.user(r).is_local() {
            self.outbox.messages_for(&uid)
        } else {
            self.observer.replies_for(&uid)
        }
    }

    pub fn numerics(&self, r: UserRef) -> Vec<Response> {
        self.sent(r).iter().filter_map(Message::response).collect()
    }

    pub fn notices(&self, r: UserRef) -> Vec<String> {
        self.sent(r)
            .iter()
            .filter_map(|msg| msg.notice_text().map(str::to_string))
            .collect()
    }

    /// The first numeric `response` sent to `r`.
    pub fn find_numeric(&self, r: UserRef, response: Response) -> Option<Message> {
        self.sent(r)
            .into_iter()
            .find(|msg| msg.response() == Some(response))
    }

    /// Forget everything recorded so far.
    pub fn clear(&self) {
        self.outbox.clear();
        self.observer.clear();
    }
}
