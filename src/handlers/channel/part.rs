//! PART command handler.

use super::super::{Context, Handler, split_targets};
use crate::error::{HandlerError, HandlerResult};
use crate::message::IncomingMessage;

/// Handler for PART command.
///
/// `PART <channel>{,<channel>} [:<reason>]`
pub struct PartHandler;

impl Handler for PartHandler {
    fn handle(&self, ctx: &mut Context<'_>, msg: &IncomingMessage) -> HandlerResult {
        let targets = msg.arg(0).ok_or(HandlerError::NeedMoreParams)?;
        let reason = msg.arg(1);
        for name in split_targets(targets) {
            if let Err(e) = ctx.matrix.part_channel(ctx.source, name, reason) {
                ctx.send_error(&e, "PART");
            }
        }
        Ok(())
    }
}
