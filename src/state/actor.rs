//! The core actor.
//!
//! All admission state lives in one [`Matrix`] owned by a single task.
//! Connection tasks and peer links talk to it through a [`MatrixHandle`],
//! which wraps a bounded channel of [`CoreEvent`]s. The actor applies one
//! event at a time, runs periodic maintenance on a timer, and culls the
//! identities that quit at the end of every cycle.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::config::Config;
use crate::handlers::{Context, Registry};
use crate::message::IncomingMessage;
use crate::state::outbox::{Mailboxes, Outgoing};
use crate::state::{Admission, ConnectionInfo, MaintenanceReport, Matrix};
use crate::telemetry::spans;

/// Capacity of the core's event queue.
const EVENT_QUEUE: usize = 1024;

/// Events the core actor processes.
#[derive(Debug)]
pub enum CoreEvent {
    /// A new local connection. Replies with the UID, or the refusal reason.
    Accept {
        conn: ConnectionInfo,
        mailbox: mpsc::Sender<Outgoing>,
        reply_tx: oneshot::Sender<Result<String, String>>,
    },
    /// One line from a local client, or relayed by a peer on behalf of `uid`.
    Command { uid: String, line: String },
    /// The socket of a local identity closed.
    Disconnect { uid: String, reason: String },
    /// Apply a new configuration.
    Rehash {
        config: Box<Config>,
        reply_tx: oneshot::Sender<()>,
    },
    /// Run a maintenance pass now.
    Maintenance {
        reply_tx: oneshot::Sender<MaintenanceReport>,
    },
    Shutdown,
}

/// The core actor has stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("core actor is not running")]
pub struct ActorGone;

/// Cloneable front door to the core actor.
#[derive(Debug, Clone)]
pub struct MatrixHandle {
    tx: mpsc::Sender<CoreEvent>,
}

impl MatrixHandle {
    /// Admit a connection whose outbound traffic goes to `mailbox`.
    ///
    /// `Ok(Err(reason))` means the connection was refused; the mailbox has
    /// already received the ERROR line and a close.
    pub async fn accept(
        &self,
        conn: ConnectionInfo,
        mailbox: mpsc::Sender<Outgoing>,
    ) -> Result<Result<String, String>, ActorGone> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(CoreEvent::Accept {
            conn,
            mailbox,
            reply_tx,
        })
        .await?;
        reply_rx.await.map_err(|_| ActorGone)
    }

    pub async fn command(&self, uid: &str, line: &str) -> Result<(), ActorGone> {
        self.send(CoreEvent::Command {
            uid: uid.to_string(),
            line: line.to_string(),
        })
        .await
    }

    pub async fn disconnect(&self, uid: &str, reason: &str) -> Result<(), ActorGone> {
        self.send(CoreEvent::Disconnect {
            uid: uid.to_string(),
            reason: reason.to_string(),
        })
        .await
    }

    pub async fn rehash(&self, config: Config) -> Result<(), ActorGone> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(CoreEvent::Rehash {
            config: Box::new(config),
            reply_tx,
        })
        .await?;
        reply_rx.await.map_err(|_| ActorGone)
    }

    pub async fn maintenance(&self) -> Result<MaintenanceReport, ActorGone> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(CoreEvent::Maintenance { reply_tx }).await?;
        reply_rx.await.map_err(|_| ActorGone)
    }

    pub async fn shutdown(&self) -> Result<(), ActorGone> {
        self.send(CoreEvent::Shutdown).await
    }

    async fn send(&self, event: CoreEvent) -> Result<(), ActorGone> {
        self.tx.send(event).await.map_err(|_| ActorGone)
    }
}

/// Owner of the [`Matrix`].
pub struct CoreActor {
    matrix: Matrix,
    registry: Registry,
    mailboxes: Arc<Mailboxes>,
    tick: Duration,
}

impl CoreActor {
    /// `mailboxes` must be the outbox `matrix` was built with.
    pub fn new(
        matrix: Matrix,
        registry: Registry,
        mailboxes: Arc<Mailboxes>,
        tick: Duration,
    ) -> Self {
        Self {
            matrix,
            registry,
            mailboxes,
            tick,
        }
    }

    /// Spawn the actor. The join handle yields the final state on shutdown.
    pub fn spawn(self) -> (MatrixHandle, JoinHandle<Matrix>) {
        let (tx, rx) = mpsc::channel(EVENT_QUEUE);
        let task = tokio::spawn(self.run(rx));
        (MatrixHandle { tx }, task)
    }

    /// The main actor loop.
    pub async fn run(mut self, mut rx: mpsc::Receiver<CoreEvent>) -> Matrix {
        let mut ticker = tokio::time::interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        info!(server = %self.matrix.server_name(), "Core actor started");
        loop {
            tokio::select! {
                event = rx.recv() => match event {
                    Some(CoreEvent::Shutdown) | None => break,
                    Some(event) => self.handle_event(event),
                },
                _ = ticker.tick() => {
                    self.matrix.maintenance();
                }
            }
            self.matrix.cull();
        }

        for r in self.matrix.users.local_refs() {
            self.matrix.quit_user(r, "Server shutting down", None);
        }
        let culled = self.matrix.cull();
        info!(culled, "Core actor stopped");
        self.matrix
    }

    fn handle_event(&mut self, event: CoreEvent) {
        match event {
            CoreEvent::Accept {
                conn,
                mailbox,
                reply_tx,
            } => {
                let span = spans::connection(conn.conn_id, conn.client.ip());
                let _enter = span.enter();
                let mailboxes = &self.mailboxes;
                let admission = self
                    .matrix
                    .accept_with(conn, |uid| mailboxes.attach(uid, mailbox));
                let result = match admission {
                    Admission::Accepted(r) => self
                        .matrix
                        .users
                        .get(r)
                        .map(|user| user.uid.clone())
                        .ok_or_else(|| "Internal error".to_string()),
                    Admission::Refused { reason, .. } => Err(reason),
                };
                let _ = reply_tx.send(result);
            }
            CoreEvent::Command { uid, line } => self.handle_command(&uid, &line),
            CoreEvent::Disconnect { uid, reason } => {
                if let Some(r) = self.matrix.users.find_uid(&uid) {
                    self.matrix.quit_user(r, &reason, None);
                }
            }
            CoreEvent::Rehash { config, reply_tx } => {
                self.matrix.rehash(*config);
                let _ = reply_tx.send(());
            }
            CoreEvent::Maintenance { reply_tx } => {
                let _ = reply_tx.send(self.matrix.maintenance());
            }
            CoreEvent::Shutdown => {}
        }
    }

    fn handle_command(&mut self, uid: &str, line: &str) {
        let Some(source) = self.matrix.users.find_uid(uid) else {
            debug!(uid = %uid, "Command for unknown identity dropped");
            return;
        };
        let Some(msg) = IncomingMessage::parse(line) else {
            return;
        };
        let is_local = self.matrix.users.get(source).is_some_and(|user| user.is_local());
        if is_local {
            self.matrix
                .note_command(source, msg.command_name(), line.len());
        }

        let mut ctx = Context::new(&mut self.matrix, source);
        self.registry.dispatch(&mut ctx, &msg);
    }
}
