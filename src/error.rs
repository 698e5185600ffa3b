//! Unified error handling for command processing.
//!
//! Handlers return [`HandlerError`]; the registry turns it into the
//! numeric the issuing client sees (if any) and a static label for logs.

use thiserror::Error;

use crate::message::{Command, Message, Response};

/// Errors that can occur during command handling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandlerError {
    #[error("not enough parameters")]
    NeedMoreParams,

    #[error("not registered")]
    NotRegistered,

    #[error("already registered")]
    AlreadyRegistered,

    #[error("no such nick: {0}")]
    NoSuchNick(String),

    #[error("no such channel: {0}")]
    NoSuchChannel(String),

    #[error("not on channel: {0}")]
    NotOnChannel(String),

    #[error("{nick} is already on {channel}")]
    UserOnChannel { nick: String, channel: String },

    /// `halfop` selects the "half-operator" wording.
    #[error("channel privileges needed on {channel}")]
    ChanOpPrivsNeeded { channel: String, halfop: bool },

    #[error("permission denied")]
    NoPrivileges,

    #[error("invalid duration")]
    InvalidDuration,

    #[error("cannot join invite-only channel {0}")]
    InviteOnlyChan(String),

    #[error("{nick} is not invited to {channel}")]
    NotInvited { nick: String, channel: String },

    #[error("erroneous nickname {nick}: {reason}")]
    ErroneousNickname { nick: String, reason: String },

    #[error("nickname in use: {0}")]
    NicknameInUse(String),

    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// A peer sent something stale or malformed. Dropped without a reply.
    #[error("remote command rejected: {0}")]
    RemoteRejected(&'static str),

    #[error("internal error: {0}")]
    Internal(String),
}

impl HandlerError {
    /// Get a static error code string for log labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NeedMoreParams => "need_more_params",
            Self::NotRegistered => "not_registered",
            Self::AlreadyRegistered => "already_registered",
            Self::NoSuchNick(_) => "no_such_nick",
            Self::NoSuchChannel(_) => "no_such_channel",
            Self::NotOnChannel(_) => "not_on_channel",
            Self::UserOnChannel { .. } => "user_on_channel",
            Self::ChanOpPrivsNeeded { .. } => "chanop_privs_needed",
            Self::NoPrivileges => "no_privileges",
            Self::InvalidDuration => "invalid_duration",
            Self::InviteOnlyChan(_) => "invite_only_chan",
            Self::NotInvited { .. } => "not_invited",
            Self::ErroneousNickname { .. } => "erroneous_nickname",
            Self::NicknameInUse(_) => "nickname_in_use",
            Self::UnknownCommand(_) => "unknown_command",
            Self::RemoteRejected(_) => "remote_rejected",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Convert to an IRC error reply message.
    ///
    /// Returns `None` for errors that don't warrant a client-visible reply.
    pub fn to_irc_reply(&self, server_name: &str, nick: &str, cmd_name: &str) -> Option<Message> {
        let nick = nick.to_string();
        let command = match self {
            Self::NeedMoreParams => Command::Response(
                Response::ERR_NEEDMOREPARAMS,
                vec![nick, cmd_name.to_string(), "Not enough parameters".into()],
            ),
            Self::NotRegistered => Command::Response(
                Response::ERR_NOTREGISTERED,
                vec![nick, "You have not registered".into()],
            ),
            Self::AlreadyRegistered => Command::Response(
                Response::ERR_ALREADYREGISTERED,
                vec![nick, "You may not reregister".into()],
            ),
            Self::NoSuchNick(target) => Command::Response(
                Response::ERR_NOSUCHNICK,
                vec![nick, target.clone(), "No such nick".into()],
            ),
            Self::NoSuchChannel(channel) => Command::Response(
                Response::ERR_NOSUCHCHANNEL,
                vec![nick, channel.clone(), "No such channel".into()],
            ),
            Self::NotOnChannel(channel) => Command::Response(
                Response::ERR_NOTONCHANNEL,
                vec![nick, channel.clone(), "You're not on that channel!".into()],
            ),
            Self::UserOnChannel { nick: target, channel } => Command::Response(
                Response::ERR_USERONCHANNEL,
                vec![nick, target.clone(), channel.clone(), "is already on channel".into()],
            ),
            Self::ChanOpPrivsNeeded { channel, halfop } => Command::Response(
                Response::ERR_CHANOPRIVSNEEDED,
                vec![
                    nick,
                    channel.clone(),
                    format!("You must be a channel {}operator", if *halfop { "half-" } else { "" }),
                ],
            ),
            Self::NoPrivileges => Command::Response(
                Response::ERR_NOPRIVILEGES,
                vec![nick, "Permission Denied - You're not an IRC operator".into()],
            ),
            Self::InvalidDuration => {
                Command::Notice(nick, format!("*** Invalid duration for {}", cmd_name.to_lowercase()))
            }
            Self::InviteOnlyChan(channel) => Command::Response(
                Response::ERR_INVITEONLYCHAN,
                vec![nick, channel.clone(), "Cannot join channel (+i)".into()],
            ),
            Self::NotInvited { nick: target, channel } => Command::Response(
                Response::ERR_NOTINVITED,
                vec![
                    nick,
                    target.clone(),
                    channel.clone(),
                    format!("Is not invited to channel {channel}"),
                ],
            ),
            Self::ErroneousNickname { nick: bad, reason } => Command::Response(
                Response::ERR_ERRONEUSNICKNAME,
                vec![nick, bad.clone(), reason.clone()],
            ),
            Self::NicknameInUse(bad) => Command::Response(
                Response::ERR_NICKNAMEINUSE,
                vec![nick, bad.clone(), "Nickname is already in use".into()],
            ),
            Self::UnknownCommand(cmd) => Command::Response(
                Response::ERR_UNKNOWNCOMMAND,
                vec![nick, cmd.clone(), "Unknown command".into()],
            ),

            // These errors don't get client-visible replies
            Self::RemoteRejected(_) | Self::Internal(_) => return None,
        };
        Some(Message::new(command).with_prefix(server_name))
    }
}

/// Result type for command handlers.
pub type HandlerResult = Result<(), HandlerError>;
