//! INVITE command handler
//!
//! `INVITE <nick> <channel> [<duration>]` from a local client.
//! `INVITE <nick|uid> <channel> <channel-ts> [<seconds>]` relayed by a peer.
//! `INVITE` with no parameters lists the source's pending invites.

use tracing::{debug, info};

use super::super::{Context, Handler, server_notice};
use crate::duration::parse_duration;
use crate::error::{HandlerError, HandlerResult};
use crate::message::{Command, IncomingMessage, Message, Response};
use crate::state::User;
use crate::state::channel::HALFOP_VALUE;
use crate::state::hooks::ModResult;
use crate::state::managers::announce_audience;
use crate::state::observer::InviteForward;

/// Handler for INVITE command.
pub struct InviteHandler;

impl Handler for InviteHandler {
    fn handle(&self, ctx: &mut Context<'_>, msg: &IncomingMessage) -> HandlerResult {
        let local = ctx.is_local();
        let Some(target_arg) = msg.arg(0) else {
            if local {
                list_invites(ctx);
                return Ok(());
            }
            return Err(HandlerError::RemoteRejected("INVITE without a target"));
        };
        let channel_arg = msg.arg(1).ok_or(HandlerError::NeedMoreParams)?;
        let now = ctx.matrix.now();

        let (remote_ts, duration) = if local {
            (None, local_duration(msg.arg(2))?)
        } else {
            let (ts, duration) = remote_args(msg.arg(2), msg.arg(3))?;
            (Some(ts), duration)
        };

        let chan = ctx
            .matrix
            .channels
            .find(channel_arg)
            .ok_or_else(|| HandlerError::NoSuchChannel(channel_arg.to_string()))?;
        let channel = chan.name.clone();
        let channel_ts = chan.created_at;

        let users = &ctx.matrix.users;
        let target = if local {
            users.find_nick(target_arg)
        } else {
            users.find(target_arg)
        }
        .filter(|r| users.get(*r).is_some_and(User::is_registered))
        .ok_or_else(|| HandlerError::NoSuchNick(target_arg.to_string()))?;

        if let Some(ts) = remote_ts
            && channel_ts < ts
        {
            debug!(channel = %channel, local_ts = channel_ts, remote_ts = ts, "Stale INVITE dropped");
            return Err(HandlerError::RemoteRejected("channel timestamp is newer than ours"));
        }

        let (Some(source_user), Some(target_user)) = (users.get(ctx.source), users.get(target)) else {
            return Err(HandlerError::Internal("invite participant vanished".into()));
        };
        if local && !chan.has_member(ctx.source) {
            return Err(HandlerError::NotOnChannel(channel));
        }
        if chan.has_member(target) {
            return Err(HandlerError::UserOnChannel {
                nick: target_user.nick_or_star().to_string(),
                channel,
            });
        }

        let verdict = ctx.matrix.hooks.user_pre_invite(source_user, target_user, chan);
        if verdict == ModResult::Deny {
            debug!(channel = %channel, "Invite denied by hook");
            return Ok(());
        }
        if local && verdict != ModResult::Allow && chan.rank_of(ctx.source) < HALFOP_VALUE {
            return Err(HandlerError::ChanOpPrivsNeeded {
                channel,
                halfop: ctx.matrix.config.channels.halfop,
            });
        }

        let source_nick = source_user.nick_or_star().to_string();
        let source_mask = source_user.mask();
        let source_uid = source_user.uid.clone();
        let target_nick = target_user.nick_or_star().to_string();
        let target_uid = target_user.uid.clone();
        let target_local = target_user.is_local();
        let target_away = target_user.away.clone();

        if target_local {
            let expiry = duration.map(|secs| now.saturating_add(i64::try_from(secs).unwrap_or(i64::MAX)));
            let outcome = ctx.matrix.invites.create(target, &channel, expiry);
            debug!(?outcome, ?expiry, "Invite stored");
            let invite = Message::new(Command::Invite(target_nick.clone(), channel.clone()))
                .with_prefix(source_mask);
            ctx.matrix.send(target, invite);
        } else if local {
            ctx.matrix.observer().on_invite_forward(&InviteForward {
                source_uid,
                target_uid,
                channel: channel.clone(),
                channel_ts,
                duration,
            });
        }

        if local {
            ctx.reply(Response::RPL_INVITING, vec![target_nick.clone(), channel.clone()]);
            if let Some(away) = target_away {
                ctx.reply(Response::RPL_AWAY, vec![target_nick.clone(), away]);
            }
        }

        info!(source = %source_nick, target = %target_nick, channel = %channel, "Invite");
        announce(ctx, &channel, &source_nick, &target_nick);
        Ok(())
    }
}

/// `INVITE` with no parameters: one 336 row per pending invite, then 337.
fn list_invites(ctx: &mut Context<'_>) {
    let now = ctx.matrix.now();
    let channels: Vec<String> = ctx
        .matrix
        .invites
        .list(ctx.source, now)
        .map(|invite| invite.channel.clone())
        .collect();
    for channel in channels {
        ctx.reply(Response::RPL_INVITELIST, vec![channel]);
    }
    ctx.reply(Response::RPL_ENDOFINVITELIST, vec!["End of INVITE list".into()]);
}

/// Optional local duration; `0` never expires.
fn local_duration(arg: Option<&str>) -> Result<Option<u64>, HandlerError> {
    let Some(arg) = arg else {
        return Ok(None);
    };
    let secs = parse_duration(arg).map_err(|_| HandlerError::InvalidDuration)?;
    Ok((secs > 0).then_some(secs))
}

/// Channel timestamp and lifetime in seconds as relayed by a peer.
///
/// The timestamp is mandatory.
fn remote_args(ts: Option<&str>, secs: Option<&str>) -> Result<(i64, Option<u64>), HandlerError> {
    let ts = ts
        .ok_or(HandlerError::RemoteRejected("missing channel timestamp"))?
        .parse::<i64>()
        .map_err(|_| HandlerError::RemoteRejected("malformed channel timestamp"))?;
    let secs = secs
        .map(|secs| secs.parse::<u64>())
        .transpose()
        .map_err(|_| HandlerError::RemoteRejected("malformed invite duration"))?;
    Ok((ts, secs.filter(|secs| *secs > 0)))
}

/// Tell the configured audience about a new invite.
fn announce(ctx: &mut Context<'_>, channel: &str, source_nick: &str, target_nick: &str) {
    let channels = &ctx.matrix.config.channels;
    let Some((prefix, min_rank)) = announce_audience(channels.invite_announce, channels.halfop)
    else {
        return;
    };
    let notice = server_notice(
        ctx.server_name(),
        &format!("{prefix}{channel}"),
        format!("*** {source_nick} invited {target_nick} into the channel"),
    );
    for member in ctx.matrix.channel_audience(channel, min_rank, Some(ctx.source)) {
        ctx.matrix.send(member, notice.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_duration() {
        assert_eq!(local_duration(None), Ok(None));
        assert_eq!(local_duration(Some("0")), Ok(None));
        assert_eq!(local_duration(Some("1h")), Ok(Some(3600)));
        assert_eq!(local_duration(Some("soon")), Err(HandlerError::InvalidDuration));
    }

    #[test]
    fn test_remote_args() {
        assert_eq!(remote_args(Some("100"), Some("60")), Ok((100, Some(60))));
        assert_eq!(remote_args(Some("100"), Some("0")), Ok((100, None)));
        assert_eq!(remote_args(Some("100"), None), Ok((100, None)));
        assert_eq!(
            remote_args(None, None),
            Err(HandlerError::RemoteRejected("missing channel timestamp"))
        );
        assert!(matches!(
            remote_args(Some("yesterday"), None),
            Err(HandlerError::RemoteRejected(_))
        ));
    }
}
