//! IRC command handlers.
//!
//! This module contains the [`Handler`] trait and the command [`Registry`]
//! that dispatches incoming lines to it. Handlers run on the core actor
//! and mutate the [`Matrix`](crate::state::Matrix) directly through the
//! [`Context`].

mod bans;
mod channel;
mod connection;
mod core;
mod helpers;
mod server_query;

pub use self::core::{Context, Handler, Registry};
pub use helpers::{require_oper, server_notice, split_targets};

pub use bans::{BanAddHandler, BanRemoveHandler};
pub use channel::{InviteHandler, JoinHandler, PartHandler, UninviteHandler};
pub use connection::{NickHandler, PingHandler, PongHandler, QuitHandler, UserHandler};
pub use server_query::StatsHandler;
