//! X-line add and remove handlers.
//!
//! `<KIND>LINE <mask> [<duration>] :<reason>` adds a rule, permanent when
//! the duration is omitted or zero. `UN<KIND>LINE <mask>` removes it.
//! Host kinds accept the nick of a connected user in place of a mask.

use tracing::{info, warn};

use super::super::{Context, Handler, require_oper};
use crate::duration::parse_duration;
use crate::error::{HandlerError, HandlerResult};
use crate::message::IncomingMessage;
use crate::security::{XLine, XLineError, XLineKind};

/// Handler for the commands adding X-lines.
pub struct BanAddHandler {
    kind: XLineKind,
}

impl BanAddHandler {
    pub fn new(kind: XLineKind) -> Self {
        Self { kind }
    }
}

impl Handler for BanAddHandler {
    fn handle(&self, ctx: &mut Context<'_>, msg: &IncomingMessage) -> HandlerResult {
        let nick = require_oper(ctx)?;
        let kind = self.kind;

        let (Some(target), Some(second)) = (msg.arg(0), msg.arg(1)) else {
            return Err(HandlerError::NeedMoreParams);
        };
        let (duration, reason) = match msg.arg(2) {
            Some(reason) => (
                parse_duration(second).map_err(|_| HandlerError::InvalidDuration)?,
                reason,
            ),
            None => (0, second),
        };

        let mask = expand_nick(ctx, kind, target);
        let now = ctx.matrix.now();
        let line = match XLine::new(kind, &mask, reason, nick.as_str(), now, duration) {
            Ok(line) => line,
            Err(e) => {
                ctx.notice(format!("*** {e}"));
                return Ok(());
            }
        };
        let mask = line.mask.clone();

        match ctx.matrix.add_xline(line, true) {
            Ok(applied) => {
                info!(
                    oper = %nick,
                    kind = %kind,
                    mask = %mask,
                    duration,
                    replaced = applied.replaced,
                    affected = applied.affected,
                    "X-line added"
                );
                let verb = if applied.replaced { "Updated" } else { "Added" };
                let text = if applied.affected > 0 {
                    format!("*** {verb} {kind} on {mask} ({} affected)", applied.affected)
                } else {
                    format!("*** {verb} {kind} on {mask}")
                };
                ctx.notice(text);
            }
            Err(XLineError::Insane {
                kind,
                mask,
                percent,
            }) => {
                warn!(oper = %nick, kind = %kind, mask = %mask, percent, "Insane X-line rejected");
                ctx.matrix.snotice(
                    'a',
                    &format!(
                        "WARNING: {nick} tried to set a {kind} mask of {mask}, which covers {percent:.2}% of the network!"
                    ),
                );
                ctx.notice(format!(
                    "*** {kind} mask {mask} covers {percent:.2}% of the network and was not added"
                ));
            }
            Err(e) => ctx.notice(format!("*** {e}")),
        }
        Ok(())
    }
}

/// Handler for the commands removing X-lines.
pub struct BanRemoveHandler {
    kind: XLineKind,
}

impl BanRemoveHandler {
    pub fn new(kind: XLineKind) -> Self {
        Self { kind }
    }
}

impl Handler for BanRemoveHandler {
    fn handle(&self, ctx: &mut Context<'_>, msg: &IncomingMessage) -> HandlerResult {
        let nick = require_oper(ctx)?;
        let kind = self.kind;
        let target = msg
            .arg(0)
            .filter(|target| !target.is_empty())
            .ok_or(HandlerError::NeedMoreParams)?;

        let mask = match kind.normalize_mask(target) {
            Ok(mask) => mask,
            Err(e) => {
                ctx.notice(format!("*** {e}"));
                return Ok(());
            }
        };

        match ctx.matrix.remove_xline(kind, &mask, &nick, true) {
            Some(line) => {
                info!(oper = %nick, kind = %kind, mask = %line.mask, "X-line removed");
                ctx.notice(format!("*** Removed {kind} on {}", line.mask));
            }
            None => ctx.notice(format!("*** {kind} {mask} not found on the list.")),
        }
        Ok(())
    }
}

/// Replace the nick of a registered user with a mask covering its host
/// (its IP for Z-lines). Anything that already looks like a mask is kept.
fn expand_nick(ctx: &Context<'_>, kind: XLineKind, target: &str) -> String {
    let host_based = kind.is_host_kind() || kind == XLineKind::Z;
    if !host_based || target.contains(['@', '.', ':', '*', '?', '/']) {
        return target.to_string();
    }
    let users = &ctx.matrix.users;
    match users
        .find_nick(target)
        .and_then(|r| users.get(r))
        .filter(|user| user.is_registered())
    {
        Some(user) if kind == XLineKind::Z => user.ip.to_string(),
        Some(user) => format!("*@{}", user.real_host),
        None => target.to_string(),
    }
}
