//! QUIT command handler.

use tracing::info;

use super::super::{Context, Handler};
use crate::error::HandlerResult;
use crate::message::IncomingMessage;

/// Handler for QUIT command.
///
/// `QUIT [:<reason>]`
pub struct QuitHandler;

impl Handler for QuitHandler {
    fn handle(&self, ctx: &mut Context<'_>, msg: &IncomingMessage) -> HandlerResult {
        let reason = match msg.arg(0) {
            Some(text) if ctx.is_local() => format!("Quit: {text}"),
            Some(text) => text.to_string(),
            None => "Client exited".to_string(),
        };
        info!(nick = %ctx.nick(), reason = %reason, "Client quit");
        ctx.matrix.quit_user(ctx.source, &reason, None);
        Ok(())
    }

    fn requires_registration(&self) -> bool {
        false
    }
}
