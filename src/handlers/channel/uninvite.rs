//! UNINVITE command handler
//!
//! `UNINVITE <nick> <channel>` revokes a pending invite.

use tracing::info;

use super::super::{Context, Handler, server_notice};
use crate::error::{HandlerError, HandlerResult};
use crate::message::{IncomingMessage, Response};
use crate::state::User;
use crate::state::channel::HALFOP_VALUE;
use crate::state::observer::InviteForward;

/// Handler for UNINVITE command.
pub struct UninviteHandler;

impl Handler for UninviteHandler {
    fn handle(&self, ctx: &mut Context<'_>, msg: &IncomingMessage) -> HandlerResult {
        let (Some(target_arg), Some(channel_arg)) = (msg.arg(0), msg.arg(1)) else {
            return Err(HandlerError::NeedMoreParams);
        };
        let local = ctx.is_local();

        let chan = ctx
            .matrix
            .channels
            .find(channel_arg)
            .ok_or_else(|| HandlerError::NoSuchChannel(channel_arg.to_string()))?;
        let users = &ctx.matrix.users;
        let target = if local {
            users.find_nick(target_arg)
        } else {
            users.find(target_arg)
        }
        .filter(|r| users.get(*r).is_some_and(User::is_registered))
        .ok_or_else(|| HandlerError::NoSuchNick(target_arg.to_string()))?;

        if local && chan.rank_of(ctx.source) < HALFOP_VALUE {
            return Err(HandlerError::ChanOpPrivsNeeded {
                channel: chan.name.clone(),
                halfop: chan.rank_of(ctx.source) != HALFOP_VALUE,
            });
        }

        let (Some(source_user), Some(target_user)) = (users.get(ctx.source), users.get(target)) else {
            return Err(HandlerError::Internal("uninvite participant vanished".into()));
        };
        let channel = chan.name.clone();
        let channel_ts = chan.created_at;
        let source_nick = source_user.nick_or_star().to_string();
        let source_uid = source_user.uid.clone();
        let target_nick = target_user.nick_or_star().to_string();
        let target_uid = target_user.uid.clone();

        if !target_user.is_local() {
            if local {
                ctx.matrix.observer().on_uninvite_forward(&InviteForward {
                    source_uid,
                    target_uid,
                    channel,
                    channel_ts,
                    duration: None,
                });
            }
            return Ok(());
        }

        if !ctx.matrix.invites.remove(target, &channel) {
            return Err(HandlerError::NotInvited {
                nick: target_nick,
                channel,
            });
        }

        info!(source = %source_nick, target = %target_nick, channel = %channel, "Uninvite");
        ctx.reply(
            Response::ERR_INVITEREMOVED,
            vec![channel.clone(), target_nick.clone(), "Uninvited".into()],
        );
        ctx.matrix.reply(
            target,
            Response::RPL_UNINVITED,
            vec![
                source_nick.clone(),
                channel.clone(),
                format!("You were uninvited from {channel} by {source_nick}"),
            ],
        );

        let notice = server_notice(
            ctx.server_name(),
            &channel,
            format!("*** {source_nick} uninvited {target_nick}."),
        );
        for member in ctx.matrix.channel_audience(&channel, 0, None) {
            ctx.matrix.send(member, notice.clone());
        }
        Ok(())
    }
}
