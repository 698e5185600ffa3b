//! Handler context and trait.

use crate::error::{HandlerError, HandlerResult};
use crate::message::{IncomingMessage, Message, Response};
use crate::state::{Matrix, User, UserRef};

/// Handler context passed to each command handler.
///
/// `source` is the identity the command is attributed to: a local client,
/// or a remote identity on whose behalf a peer relayed the line.
pub struct Context<'a> {
    /// Shared server state.
    pub matrix: &'a mut Matrix,
    pub source: UserRef,
}

impl<'a> Context<'a> {
    pub fn new(matrix: &'a mut Matrix, source: UserRef) -> Self {
        Self { matrix, source }
    }

    /// The source identity. `None` only if it was destroyed mid-command.
    pub fn user(&self) -> Option<&User> {
        self.matrix.users.get(self.source)
    }

    /// The source's nick, or `*` before one is chosen.
    pub fn nick(&self) -> String {
        self.user()
            .map(|user| user.nick_or_star().to_string())
            .unwrap_or_else(|| "*".to_string())
    }

    pub fn is_local(&self) -> bool {
        self.user().is_some_and(User::is_local)
    }

    pub fn is_registered(&self) -> bool {
        self.user().is_some_and(User::is_registered)
    }

    pub fn is_oper(&self) -> bool {
        self.user().is_some_and(User::is_oper)
    }

    pub fn server_name(&self) -> &str {
        self.matrix.server_name()
    }

    /// Build and send a numeric to the source in one call.
    pub fn reply(&mut self, response: Response, params: Vec<String>) {
        self.matrix.reply(self.source, response, params);
    }

    /// Send a server NOTICE to the source.
    pub fn notice(&mut self, text: impl Into<String>) {
        self.matrix.notice(self.source, text);
    }

    pub fn send(&mut self, msg: Message) {
        self.matrix.send(self.source, msg);
    }

    /// Report `err` to the source as the numeric it maps to, if any.
    pub fn send_error(&mut self, err: &HandlerError, cmd_name: &str) {
        let nick = self.nick();
        if let Some(reply) = err.to_irc_reply(self.server_name(), &nick, cmd_name) {
            self.send(reply);
        }
    }
}

/// A command handler.
///
/// Handlers run on the core actor with exclusive access to the
/// [`Matrix`]; they never block.
pub trait Handler: Send + Sync {
    fn handle(&self, ctx: &mut Context<'_>, msg: &IncomingMessage) -> HandlerResult;

    /// Whether the source must have completed registration.
    fn requires_registration(&self) -> bool {
        true
    }
}
