//! USER command handler.

use super::super::{Context, Handler};
use super::welcome::try_complete_registration;
use crate::error::{HandlerError, HandlerResult};
use crate::message::IncomingMessage;

/// Longest ident kept; the rest is cut.
const MAX_IDENT_LEN: usize = 10;

/// Handler for USER command.
///
/// `USER <ident> <mode> <unused> :<realname>`
pub struct UserHandler;

impl Handler for UserHandler {
    fn handle(&self, ctx: &mut Context<'_>, msg: &IncomingMessage) -> HandlerResult {
        if msg.arg_count() < 4 {
            return Err(HandlerError::NeedMoreParams);
        }
        let (Some(ident), Some(realname)) = (msg.arg(0), msg.arg(3)) else {
            return Err(HandlerError::NeedMoreParams);
        };
        if ident.is_empty() {
            return Err(HandlerError::NeedMoreParams);
        }

        let user = ctx
            .matrix
            .users
            .get_mut(ctx.source)
            .ok_or(HandlerError::NotRegistered)?;
        if user.is_registered() {
            return Err(HandlerError::AlreadyRegistered);
        }
        let Some(local) = user.local.as_mut() else {
            return Err(HandlerError::RemoteRejected("USER from a remote identity"));
        };
        if local.user_received {
            return Err(HandlerError::AlreadyRegistered);
        }
        local.user_received = true;
        user.ident = ident.chars().take(MAX_IDENT_LEN).collect();
        user.realname = realname.to_string();

        try_complete_registration(ctx);
        Ok(())
    }

    fn requires_registration(&self) -> bool {
        false
    }
}
