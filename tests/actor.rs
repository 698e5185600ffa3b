//! The core actor driven through its handle.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use slircd_gate::clock::ManualClock;
use slircd_gate::config::Config;
use slircd_gate::handlers::Registry;
use slircd_gate::message::{Command, Message, Response};
use slircd_gate::state::actor::{ActorGone, CoreActor, MatrixHandle};
use slircd_gate::state::observer::NullObserver;
use slircd_gate::state::outbox::{Mailboxes, Outgoing};
use slircd_gate::state::{ConnectionInfo, Matrix};

fn spawn(config: Config) -> (MatrixHandle, JoinHandle<Matrix>) {
    let mailboxes = Arc::new(Mailboxes::new());
    let matrix = Matrix::new(
        config,
        mailboxes.clone(),
        Arc::new(NullObserver),
        Arc::new(ManualClock::new(1_700_000_000)),
    );
    // Maintenance only on request.
    CoreActor::new(matrix, Registry::new(), mailboxes, Duration::from_secs(3600)).spawn()
}

fn config() -> Config {
    let mut config = Config::default();
    config.server.name = "irc.test.net".to_string();
    config.server.sid = "0AA".to_string();
    config
}

fn conn(id: u64, ip: &str) -> ConnectionInfo {
    ConnectionInfo::new(
        id,
        format!("{ip}:40000").parse().unwrap(),
        "192.0.2.254:6667".parse().unwrap(),
    )
}

async fn next(rx: &mut mpsc::Receiver<Outgoing>) -> Option<Outgoing> {
    timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for the core")
}

async fn next_message(rx: &mut mpsc::Receiver<Outgoing>) -> Message {
    loop {
        match next(rx).await {
            Some(Outgoing::Message(msg)) => return msg,
            Some(_) => continue,
            None => panic!("mailbox closed"),
        }
    }
}

/// Accept and register `nick`, returning its UID once 001 arrived.
async fn connect(
    handle: &MatrixHandle,
    id: u64,
    nick: &str,
    ip: &str,
) -> (String, mpsc::Receiver<Outgoing>) {
    let (tx, mut rx) = mpsc::channel(64);
    let uid = handle.accept(conn(id, ip), tx).await.unwrap().unwrap();
    handle.command(&uid, &format!("NICK {nick}")).await.unwrap();
    handle
        .command(&uid, &format!("USER {nick} 0 * :{nick}"))
        .await
        .unwrap();
    let welcome = next_message(&mut rx).await;
    assert_eq!(welcome.response(), Some(Response::RPL_WELCOME));
    (uid, rx)
}

#[tokio::test]
async fn test_register_and_shutdown() {
    let (handle, task) = spawn(config());
    let (uid, mut rx) = connect(&handle, 1, "alice", "10.0.0.1").await;
    assert!(uid.starts_with("0AA"));

    handle.command(&uid, "PING :hello").await.unwrap();
    let pong = next_message(&mut rx).await;
    assert_eq!(pong.to_string(), ":irc.test.net PONG irc.test.net hello");

    handle.shutdown().await.unwrap();
    let matrix = task.await.unwrap();
    assert_eq!(matrix.users.total(), 0);

    let error = next_message(&mut rx).await;
    assert_eq!(
        error.command,
        Command::Error("Closing link: (alice@10.0.0.1) [Server shutting down]".into())
    );
    assert_eq!(next(&mut rx).await, Some(Outgoing::Close));
    assert_eq!(next(&mut rx).await, None);

    assert_eq!(handle.command(&uid, "PING :late").await, Err(ActorGone));
}

#[tokio::test]
async fn test_refused_connection_is_closed() {
    let mut config = config();
    config.limits.local_max = 1;
    let (handle, task) = spawn(config);
    let _first = connect(&handle, 1, "alice", "10.0.0.1").await;

    let (tx, mut rx) = mpsc::channel(8);
    let refused = handle.accept(conn(2, "10.0.0.1"), tx).await.unwrap();
    assert_eq!(
        refused,
        Err::<String, String>(
            "No more connections allowed from your host via this connect class (local)".to_string()
        )
    );
    let error = next_message(&mut rx).await;
    assert!(matches!(error.command, Command::Error(_)));
    assert_eq!(next(&mut rx).await, Some(Outgoing::Close));

    handle.shutdown().await.unwrap();
    let matrix = task.await.unwrap();
    assert_eq!(matrix.stats.refused, 1);
}

#[tokio::test]
async fn test_disconnect_tells_neighbors() {
    let (handle, task) = spawn(config());
    let (alice, _alice_rx) = connect(&handle, 1, "alice", "10.0.0.1").await;
    let (bob, mut bob_rx) = connect(&handle, 2, "bob", "10.0.0.2").await;
    handle.command(&alice, "JOIN #c").await.unwrap();
    handle.command(&bob, "JOIN #c").await.unwrap();
    // bob's own JOIN echo.
    let join = next_message(&mut bob_rx).await;
    assert_eq!(join.command, Command::Join("#c".into()));

    handle.disconnect(&alice, "Connection reset by peer").await.unwrap();
    let quit = next_message(&mut bob_rx).await;
    assert_eq!(
        quit.to_string(),
        ":alice!alice@10.0.0.1 QUIT :Connection reset by peer"
    );

    handle.shutdown().await.unwrap();
    task.await.unwrap();
}

#[tokio::test]
async fn test_maintenance_and_rehash() {
    let (handle, task) = spawn(config());
    let _alice = connect(&handle, 1, "alice", "10.0.0.1").await;

    let report = handle.maintenance().await.unwrap();
    assert_eq!(report.ping_timeouts, 0);

    let mut new_config = config();
    new_config.clones.ipv4_prefix = 24;
    handle.rehash(new_config).await.unwrap();

    handle.shutdown().await.unwrap();
    let matrix = task.await.unwrap();
    assert_eq!(matrix.config.clones.ipv4_prefix, 24);
}

#[tokio::test]
async fn test_unknown_uid_is_ignored() {
    let (handle, task) = spawn(config());
    handle.command("0AAZZZZZZ", "QUIT").await.unwrap();
    handle.disconnect("0AAZZZZZZ", "gone").await.unwrap();
    handle.shutdown().await.unwrap();
    let matrix = task.await.unwrap();
    assert_eq!(matrix.stats.connections, 0);
}
