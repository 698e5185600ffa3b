//! Channel command handlers.
//!
//! Handles JOIN, PART, INVITE and UNINVITE.

mod invite;
mod join;
mod part;
mod uninvite;

pub use invite::InviteHandler;
pub use join::JoinHandler;
pub use part::PartHandler;
pub use uninvite::UninviteHandler;
