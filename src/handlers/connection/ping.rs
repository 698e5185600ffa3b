//! PING and PONG handlers.

use super::super::{Context, Handler};
use crate::error::{HandlerError, HandlerResult};
use crate::message::{Command, IncomingMessage, Message};

/// Handler for PING command.
pub struct PingHandler;

impl Handler for PingHandler {
    fn handle(&self, ctx: &mut Context<'_>, msg: &IncomingMessage) -> HandlerResult {
        // PING <token>
        let token = msg.arg(0).ok_or(HandlerError::NeedMoreParams)?;
        let server = ctx.server_name().to_string();
        let pong = Message::new(Command::Pong(server.clone(), token.to_string())).with_prefix(server);
        ctx.send(pong);
        Ok(())
    }

    fn requires_registration(&self) -> bool {
        false
    }
}

/// Handler for PONG command.
pub struct PongHandler;

impl Handler for PongHandler {
    fn handle(&self, ctx: &mut Context<'_>, _msg: &IncomingMessage) -> HandlerResult {
        ctx.matrix.note_pong(ctx.source);
        Ok(())
    }

    fn requires_registration(&self) -> bool {
        false
    }
}
