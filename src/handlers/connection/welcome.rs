//! Registration completion.

use tracing::info;

use super::super::Context;
use crate::message::Response;

/// Complete registration once both NICK and USER have been received.
///
/// Returns true if the source is now registered.
pub(super) fn try_complete_registration(ctx: &mut Context<'_>) -> bool {
    let Some(user) = ctx.user() else {
        return false;
    };
    let ready = !user.is_registered()
        && user.nick.is_some()
        && user.local.as_ref().is_some_and(|local| local.user_received);
    if !ready {
        return false;
    }
    let ident = user.ident.clone();
    let realname = user.realname.clone();

    if !ctx.matrix.complete_registration(ctx.source, &ident, &realname) {
        return false;
    }

    let Some(user) = ctx.user() else {
        return false;
    };
    let mask = user.mask();
    info!(uid = %user.uid, nick = %user.nick_or_star(), "Client registered");
    let welcome = format!(
        "Welcome to the {} IRC Network {mask}",
        ctx.matrix.config.server.network
    );
    ctx.reply(Response::RPL_WELCOME, vec![welcome]);
    true
}
