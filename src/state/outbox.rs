//! Delivery of outbound traffic to connection tasks.
//!
//! The core never blocks on a socket. Each local connection registers a
//! bounded queue in [`Mailboxes`]; the core pushes into it with
//! `try_send` and drops the message with a warning when it is full.

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::message::Message;

/// What a connection task receives from the core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outgoing {
    Message(Message),
    /// The input penalty crossed the threshold; stop reading from the socket.
    PauseInput,
    /// The input penalty has drained; resume reading from the socket.
    ResumeInput,
    /// Flush and close the socket.
    Close,
}

/// Sink for traffic addressed to local identities.
pub trait Outbox: Send + Sync {
    fn send(&self, uid: &str, msg: Message);

    fn pause_input(&self, _uid: &str) {}

    fn resume_input(&self, _uid: &str) {}

    /// The identity quit; close its connection once queued traffic is flushed.
    fn detach(&self, _uid: &str) {}
}

/// Per-connection queues keyed by UID.
#[derive(Debug, Default)]
pub struct Mailboxes {
    senders: DashMap<String, mpsc::Sender<Outgoing>>,
}

impl Mailboxes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the queue of a newly accepted connection.
    pub fn attach(&self, uid: &str, sender: mpsc::Sender<Outgoing>) {
        self.senders.insert(uid.to_string(), sender);
    }

    pub fn len(&self) -> usize {
        self.senders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }

    fn push(&self, uid: &str, item: Outgoing) {
        let Some(sender) = self.senders.get(uid) else {
            debug!(uid = %uid, "No mailbox for identity");
            return;
        };
        if let Err(e) = sender.try_send(item) {
            warn!(uid = %uid, error = %e, "Dropping outbound message");
        }
    }
}

impl Outbox for Mailboxes {
    fn send(&self, uid: &str, msg: Message) {
        self.push(uid, Outgoing::Message(msg));
    }

    fn pause_input(&self, uid: &str) {
        self.push(uid, Outgoing::PauseInput);
    }

    fn resume_input(&self, uid: &str) {
        self.push(uid, Outgoing::ResumeInput);
    }

    fn detach(&self, uid: &str) {
        if let Some((_, sender)) = self.senders.remove(uid) {
            let _ = sender.try_send(Outgoing::Close);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Command;

    #[tokio::test]
    async fn test_send_and_detach() {
        let mailboxes = Mailboxes::new();
        let (tx, mut rx) = mpsc::channel(4);
        mailboxes.attach("0AAAAAAAA", tx);

        mailboxes.send("0AAAAAAAA", Message::new(Command::Ping("irc.test.net".into())));
        mailboxes.resume_input("0AAAAAAAA");
        mailboxes.detach("0AAAAAAAA");
        mailboxes.send("0AAAAAAAA", Message::new(Command::Ping("late".into())));

        assert!(matches!(rx.recv().await, Some(Outgoing::Message(_))));
        assert_eq!(rx.recv().await, Some(Outgoing::ResumeInput));
        assert_eq!(rx.recv().await, Some(Outgoing::Close));
        assert_eq!(rx.recv().await, None);
        assert!(mailboxes.is_empty());
    }

    #[test]
    fn test_full_queue_drops() {
        let mailboxes = Mailboxes::new();
        let (tx, mut rx) = mpsc::channel(1);
        mailboxes.attach("0AAAAAAAA", tx);
        mailboxes.send("0AAAAAAAA", Message::new(Command::Ping("1".into())));
        mailboxes.send("0AAAAAAAA", Message::new(Command::Ping("2".into())));
        match rx.try_recv() {
            Ok(Outgoing::Message(msg)) => assert_eq!(msg.trailing(), Some("1")),
            other => panic!("unexpected {other:?}"),
        }
        assert!(rx.try_recv().is_err());
    }
}
