//! Command handler registry and dispatch.

use std::collections::HashMap;

use tracing::debug;

use super::context::{Context, Handler};
use crate::error::HandlerError;
use crate::handlers::{
    bans::{BanAddHandler, BanRemoveHandler},
    channel::{InviteHandler, JoinHandler, PartHandler, UninviteHandler},
    connection::{NickHandler, PingHandler, PongHandler, QuitHandler, UserHandler},
    server_query::StatsHandler,
};
use crate::message::IncomingMessage;
use crate::security::XLineKind;
use crate::telemetry::{CommandTimer, spans};

/// Registry of command handlers.
pub struct Registry {
    handlers: HashMap<&'static str, Box<dyn Handler>>,
}

impl Registry {
    /// Create a new registry with all handlers registered.
    pub fn new() -> Self {
        let mut handlers: HashMap<&'static str, Box<dyn Handler>> = HashMap::new();

        // Connection/registration handlers
        handlers.insert("NICK", Box::new(NickHandler));
        handlers.insert("USER", Box::new(UserHandler));
        handlers.insert("PING", Box::new(PingHandler));
        handlers.insert("PONG", Box::new(PongHandler));
        handlers.insert("QUIT", Box::new(QuitHandler));

        // Channel handlers
        handlers.insert("JOIN", Box::new(JoinHandler));
        handlers.insert("PART", Box::new(PartHandler));
        handlers.insert("INVITE", Box::new(InviteHandler));
        handlers.insert("UNINVITE", Box::new(UninviteHandler));

        // Server query handlers
        handlers.insert("STATS", Box::new(StatsHandler));

        // Ban handlers
        for kind in XLineKind::ALL {
            handlers.insert(kind.add_command(), Box::new(BanAddHandler::new(kind)));
            handlers.insert(kind.remove_command(), Box::new(BanRemoveHandler::new(kind)));
        }

        Self { handlers }
    }

    /// Whether `command` has a handler.
    pub fn knows(&self, command: &str) -> bool {
        self.handlers.contains_key(command)
    }

    /// Dispatch a message to the appropriate handler.
    ///
    /// Errors are reported to the source here; handlers only return them.
    pub fn dispatch(&self, ctx: &mut Context<'_>, msg: &IncomingMessage) {
        let cmd_name = msg.command_name();
        let source_nick = ctx.nick();
        let target = msg.arg(0).filter(|a| a.starts_with('#') || a.starts_with('&'));
        let span = spans::command(cmd_name, &source_nick, target);
        let _enter = span.enter();

        let result = match self.handlers.get(cmd_name) {
            None => {
                ctx.matrix.stats.unknown_commands += 1;
                Err(HandlerError::UnknownCommand(cmd_name.to_string()))
            }
            Some(handler) if handler.requires_registration() && !ctx.is_registered() => {
                Err(HandlerError::NotRegistered)
            }
            Some(handler) => {
                ctx.matrix.stats.record_command(cmd_name);
                let _timer = CommandTimer::new(cmd_name);
                handler.handle(ctx, msg)
            }
        };

        if let Err(e) = result {
            debug!(command = %cmd_name, error = %e, code = e.error_code(), "Command error");
            ctx.send_error(&e, cmd_name);
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
