//! STATS handler for server statistics.
//!
//! | Symbol | Reply |
//! |--------|-------|
//! | k g Z q e R | X-lines of that kind (223) |
//! | P | Online operators (249) |
//! | T | Connection counters (249) |
//! | z | Store sizes (249) |
//! | l L | Local connections by host or IP (211) |
//! | u | Uptime (242) |
//! | m | Command usage (212) |
//!
//! Every served request ends with 219.

use tracing::debug;

use super::super::{Context, Handler};
use crate::casemap::irc_eq;
use crate::duration::format_duration;
use crate::error::{HandlerError, HandlerResult};
use crate::message::{IncomingMessage, Response};
use crate::security::XLineKind;
use crate::state::Matrix;
use crate::state::hooks::{ModResult, StatsRows};

/// Extra penalty for a non-operator asking another server.
const REMOTE_STATS_PENALTY: u32 = 2000;

/// Privilege required for STATS symbols outside `userstats`.
const AUSPEX: &str = "servers/auspex";

/// Handler for STATS command.
///
/// `STATS <symbol> [<server>]`
pub struct StatsHandler;

impl Handler for StatsHandler {
    fn handle(&self, ctx: &mut Context<'_>, msg: &IncomingMessage) -> HandlerResult {
        let symbol = msg
            .arg(0)
            .and_then(|arg| arg.chars().next())
            .ok_or(HandlerError::NeedMoreParams)?;

        if let Some(server) = msg.arg(1)
            && !irc_eq(server, ctx.server_name())
        {
            // Answered by the named server; relaying is the link layer's job.
            if ctx.is_local() && !ctx.is_oper() {
                ctx.matrix.add_penalty(ctx.source, REMOTE_STATS_PENALTY);
            }
            return Ok(());
        }

        let user = ctx
            .user()
            .ok_or_else(|| HandlerError::Internal("STATS source vanished".into()))?;
        let local = user.is_local();
        let allowed = ctx.matrix.config.stats.is_public(symbol)
            || if local {
                user.has_privilege(AUSPEX)
            } else {
                user.is_oper()
            };
        let who = format!("{} ({})", user.nick_or_star(), user.user_host());
        let kind = if local { "Stats" } else { "Remote stats" };

        if !allowed {
            ctx.matrix
                .snotice('t', &format!("{kind} '{symbol}' denied for {who}"));
            ctx.reply(
                Response::ERR_NOPRIVILEGES,
                vec![format!(
                    "Permission Denied - STATS {symbol} requires the {AUSPEX} priv."
                )],
            );
            return Ok(());
        }

        let mut rows = StatsRows::new();
        let verdict = ctx.matrix.hooks.stats(symbol, user, &mut rows);
        if verdict == ModResult::Passthrough {
            rows = build_rows(&*ctx.matrix, symbol);
        } else {
            debug!(symbol = %symbol, rows = rows.len(), "STATS answered by hook");
        }

        for (response, params) in rows {
            ctx.reply(response, params);
        }
        ctx.reply(
            Response::RPL_ENDOFSTATS,
            vec![symbol.to_string(), "End of /STATS report".into()],
        );
        ctx.matrix
            .snotice('t', &format!("{kind} '{symbol}' requested by {who}"));
        Ok(())
    }
}

/// Built-in rows for `symbol`. Unknown symbols produce none.
fn build_rows(matrix: &Matrix, symbol: char) -> StatsRows {
    let now = matrix.now();
    let mut rows = StatsRows::new();

    if let Some(kind) = XLineKind::from_stats_symbol(symbol) {
        for line in matrix.xlines.list(kind, now) {
            rows.push((
                Response::RPL_STATSXLINE,
                vec![
                    kind.letter().to_string(),
                    line.mask.clone(),
                    line.set_time.to_string(),
                    line.duration.to_string(),
                    line.set_by.clone(),
                    line.reason.clone(),
                ],
            ));
        }
        return rows;
    }

    match symbol {
        'P' => {
            let mut opers = 0;
            for r in matrix.users.oper_refs() {
                let Some(user) = matrix.users.get(r) else {
                    continue;
                };
                if user.server.service || user.is_quitting() {
                    continue;
                }
                let idle = match &user.local {
                    Some(local) => format_duration(u64::try_from(now - local.idle_lastmsg).unwrap_or(0)),
                    None => "unavailable".to_string(),
                };
                rows.push((
                    Response::RPL_STATSDEBUG,
                    vec![format!(
                        "{} ({}@{}) Idle: {idle}",
                        user.nick_or_star(),
                        user.ident,
                        user.host
                    )],
                ));
                opers += 1;
            }
            rows.push((Response::RPL_STATSDEBUG, vec![format!("{opers} OPER(s)")]));
        }
        'T' => {
            let stats = &matrix.stats;
            for line in [
                format!("accepts {} refused {}", stats.accepts, stats.refused),
                format!("unknown commands {}", stats.unknown_commands),
                format!("nick collisions {}", stats.collisions),
                format!("connection count {}", stats.connections),
            ] {
                rows.push((Response::RPL_STATSDEBUG, vec![line]));
            }
        }
        'z' => {
            for line in [
                format!("Users: {}", matrix.users.total()),
                format!("Channels: {}", matrix.channels.len()),
                format!("Clone ranges: {}", matrix.clones.len()),
                format!("Invites: {}", matrix.invites.len()),
                format!("X-lines: {}", matrix.xlines.len()),
                format!("Commands: {}", matrix.stats.total_commands()),
            ] {
                rows.push((Response::RPL_STATSDEBUG, vec![line]));
            }
        }
        'l' | 'L' => {
            let by_host = symbol == 'l';
            rows.push((
                Response::RPL_STATSLINKINFO,
                vec![format!(
                    "nick[ident@{}] sendq cmds_out bytes_out cmds_in bytes_in time_open",
                    if by_host { "host" } else { "ip" }
                )],
            ));
            for r in matrix.users.local_refs() {
                let Some(user) = matrix.users.get(r) else {
                    continue;
                };
                let Some(local) = &user.local else {
                    continue;
                };
                let addr = if by_host {
                    user.host.clone()
                } else {
                    user.ip.to_string()
                };
                rows.push((
                    Response::RPL_STATSLINKINFO,
                    vec![format!(
                        "{}[{}@{addr}] 0 {} {} {} {} {}",
                        user.nick_or_star(),
                        user.ident,
                        local.cmds_out,
                        local.bytes_out,
                        local.cmds_in,
                        local.bytes_in,
                        now - user.signon
                    )],
                ));
            }
        }
        'u' => {
            let up = matrix.stats.uptime(now);
            rows.push((
                Response::RPL_STATSUPTIME,
                vec![format!(
                    "Server up {} days, {:02}:{:02}:{:02}",
                    up / 86_400,
                    (up % 86_400) / 3600,
                    (up % 3600) / 60,
                    up % 60
                )],
            ));
        }
        'm' => {
            for (command, count) in matrix.stats.command_counts() {
                rows.push((
                    Response::RPL_STATSCOMMANDS,
                    vec![command.to_string(), count.to_string()],
                ));
            }
        }
        _ => {}
    }
    rows
}
