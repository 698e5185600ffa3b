//! NICK command handler.

use super::super::{Context, Handler};
use super::welcome::try_complete_registration;
use crate::error::{HandlerError, HandlerResult};
use crate::message::IncomingMessage;

/// Handler for NICK command.
///
/// `NICK <nickname>`
pub struct NickHandler;

impl Handler for NickHandler {
    fn handle(&self, ctx: &mut Context<'_>, msg: &IncomingMessage) -> HandlerResult {
        let nick = msg
            .arg(0)
            .filter(|nick| !nick.is_empty())
            .ok_or(HandlerError::NeedMoreParams)?;

        ctx.matrix.set_nick(ctx.source, nick)?;
        try_complete_registration(ctx);
        Ok(())
    }

    fn requires_registration(&self) -> bool {
        false
    }
}
