//! JOIN command handler.

use super::super::{Context, Handler, split_targets};
use crate::error::{HandlerError, HandlerResult};
use crate::message::IncomingMessage;

/// Handler for JOIN command.
///
/// `JOIN <channel>{,<channel>}`
///
/// A failure on one channel is reported and the rest are still tried.
pub struct JoinHandler;

impl Handler for JoinHandler {
    fn handle(&self, ctx: &mut Context<'_>, msg: &IncomingMessage) -> HandlerResult {
        let targets = msg.arg(0).ok_or(HandlerError::NeedMoreParams)?;
        for name in split_targets(targets) {
            if let Err(e) = ctx.matrix.join_channel(ctx.source, name) {
                ctx.send_error(&e, "JOIN");
            }
        }
        Ok(())
    }
}
