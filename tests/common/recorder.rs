//! Recording outbox and observer.

use parking_lot::Mutex;

use slircd_gate::message::{Message, Response};
use slircd_gate::security::{XLine, XLineKind};
use slircd_gate::state::observer::{InviteForward, StateObserver};
use slircd_gate::state::outbox::{Outbox, Outgoing};

/// Outbox that keeps everything it is asked to deliver.
#[derive(Default)]
pub struct RecordingOutbox {
    sent: Mutex<Vec<(String, Outgoing)>>,
}

#[allow(dead_code)]
impl RecordingOutbox {
    /// Messages delivered to `uid`, oldest first.
    pub fn messages_for(&self, uid: &str) -> Vec<Message> {
        self.sent
            .lock()
            .iter()
            .filter(|(to, _)| to == uid)
            .filter_map(|(_, item)| match item {
                Outgoing::Message(msg) => Some(msg.clone()),
                _ => None,
            })
            .collect()
    }

    /// Everything delivered to `uid`, control messages included.
    pub fn events_for(&self, uid: &str) -> Vec<Outgoing> {
        self.sent
            .lock()
            .iter()
            .filter(|(to, _)| to == uid)
            .map(|(_, item)| item.clone())
            .collect()
    }

    /// Numerics delivered to `uid`.
    pub fn numerics_for(&self, uid: &str) -> Vec<Response> {
        self.messages_for(uid)
            .iter()
            .filter_map(Message::response)
            .collect()
    }

    /// NOTICE texts delivered to `uid`.
    pub fn notices_for(&self, uid: &str) -> Vec<String> {
        self.messages_for(uid)
            .iter()
            .filter_map(|msg| msg.notice_text().map(str::to_string))
            .collect()
    }

    pub fn clear(&self) {
        self.sent.lock().clear();
    }
}

impl Outbox for RecordingOutbox {
    fn send(&self, uid: &str, msg: Message) {
        self.sent.lock().push((uid.to_string(), Outgoing::Message(msg)));
    }

    fn pause_input(&self, uid: &str) {
        self.sent.lock().push((uid.to_string(), Outgoing::PauseInput));
    }

    fn resume_input(&self, uid: &str) {
        self.sent.lock().push((uid.to_string(), Outgoing::ResumeInput));
    }

    fn detach(&self, uid: &str) {
        self.sent.lock().push((uid.to_string(), Outgoing::Close));
    }
}

/// What the observer was told.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observed {
    Quit { uid: String, reason: String },
    BanAdd { kind: XLineKind, mask: String },
    BanRemove { kind: XLineKind, mask: String },
    InviteForward(InviteForward),
    UninviteForward(InviteForward),
    RemoteReply { uid: String, msg: Message },
}

/// Observer that keeps every callback.
#[derive(Default)]
pub struct RecordingObserver {
    seen: Mutex<Vec<Observed>>,
}

#[allow(dead_code)]
impl RecordingObserver {
    pub fn seen(&self) -> Vec<Observed> {
        self.seen.lock().clone()
    }

    /// Replies routed to the remote identity `uid`.
    pub fn replies_for(&self, uid: &str) -> Vec<Message> {
        self.seen
            .lock()
            .iter()
            .filter_map(|event| match event {
                Observed::RemoteReply { uid: to, msg } if to == uid => Some(msg.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.seen.lock().clear();
    }
}

impl StateObserver for RecordingObserver {
    fn on_user_quit(&self, uid: &str, reason: &str) {
        self.seen.lock().push(Observed::Quit {
            uid: uid.to_string(),
            reason: reason.to_string(),
        });
    }

    fn on_ban_add(&self, line: &XLine) {
        self.seen.lock().push(Observed::BanAdd {
            kind: line.kind,
            mask: line.mask.clone(),
        });
    }

    fn on_ban_remove(&self, kind: XLineKind, mask: &str, _remover: &str) {
        self.seen.lock().push(Observed::BanRemove {
            kind,
            mask: mask.to_string(),
        });
    }

    fn on_invite_forward(&self, invite: &InviteForward) {
        self.seen.lock().push(Observed::InviteForward(invite.clone()));
    }

    fn on_uninvite_forward(&self, invite: &InviteForward) {
        self.seen.lock().push(Observed::UninviteForward(invite.clone()));
    }

    fn on_remote_reply(&self, uid: &str, msg: &Message) {
        self.seen.lock().push(Observed::RemoteReply {
            uid: uid.to_string(),
            msg: msg.clone(),
        });
    }
}
