//! Helper functions shared by handlers.

use super::Context;
use crate::error::HandlerError;
use crate::message::{Command, Message};

/// Create a server NOTICE addressed to `target`.
pub fn server_notice(server_name: &str, target: &str, text: impl Into<String>) -> Message {
    Message::new(Command::Notice(target.to_string(), text.into())).with_prefix(server_name)
}

/// Require the source to be an IRC operator. Returns its nick.
pub fn require_oper(ctx: &Context<'_>) -> Result<String, HandlerError> {
    if ctx.is_oper() {
        Ok(ctx.nick())
    } else {
        Err(HandlerError::NoPrivileges)
    }
}

/// Split a comma-separated target list, skipping empty entries.
pub fn split_targets(arg: &str) -> impl Iterator<Item = &str> {
    arg.split(',').filter(|target| !target.is_empty())
}
