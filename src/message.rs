//! IRC messages.
//!
//! The core never touches sockets. It produces [`Message`] values addressed
//! to identities, and the outbox hands them to whichever task owns the
//! connection. [`Display`](std::fmt::Display) renders the wire form.
//! Inbound lines arrive already framed and are split by [`IncomingMessage::parse`].

use std::fmt;

/// Numeric replies produced by this server.
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Response {
    RPL_WELCOME = 1,
    RPL_STATSLINKINFO = 211,
    RPL_STATSCOMMANDS = 212,
    RPL_ENDOFSTATS = 219,
    RPL_STATSXLINE = 223,
    RPL_STATSUPTIME = 242,
    RPL_STATSDEBUG = 249,
    RPL_AWAY = 301,
    RPL_INVITELIST = 336,
    RPL_ENDOFINVITELIST = 337,
    RPL_INVITING = 341,
    ERR_NOSUCHNICK = 401,
    ERR_NOSUCHSERVER = 402,
    ERR_NOSUCHCHANNEL = 403,
    ERR_UNKNOWNCOMMAND = 421,
    ERR_ERRONEUSNICKNAME = 432,
    ERR_NICKNAMEINUSE = 433,
    ERR_NOTONCHANNEL = 442,
    ERR_USERONCHANNEL = 443,
    ERR_NOTREGISTERED = 451,
    ERR_NEEDMOREPARAMS = 461,
    ERR_ALREADYREGISTERED = 462,
    ERR_INVITEONLYCHAN = 473,
    ERR_NOPRIVILEGES = 481,
    ERR_CHANOPRIVSNEEDED = 482,
    ERR_INVITEREMOVED = 494,
    ERR_NOTINVITED = 505,
    RPL_UNINVITED = 653,
}

impl Response {
    /// The three-digit numeric.
    #[inline]
    pub fn code(self) -> u16 {
        self as u16
    }
}

/// Message payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Numeric reply; the first parameter is the recipient's nick.
    Response(Response, Vec<String>),
    Notice(String, String),
    Invite(String, String),
    Join(String),
    Part(String, Option<String>),
    Quit(String),
    Nick(String),
    Ping(String),
    /// Server name and the echoed token.
    Pong(String, String),
    Error(String),
}

/// An IRC message with an optional source prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub prefix: Option<String>,
    pub command: Command,
}

impl Message {
    pub fn new(command: Command) -> Self {
        Self {
            prefix: None,
            command,
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// The numeric if this is a numeric reply.
    pub fn response(&self) -> Option<Response> {
        match &self.command {
            Command::Response(response, _) => Some(*response),
            _ => None,
        }
    }

    /// The text of a NOTICE.
    pub fn notice_text(&self) -> Option<&str> {
        match &self.command {
            Command::Notice(_, text) => Some(text),
            _ => None,
        }
    }

    /// The last parameter, as rendered after the `:` on the wire.
    pub fn trailing(&self) -> Option<&str> {
        match &self.command {
            Command::Response(_, params) => params.last().map(String::as_str),
            Command::Notice(_, text) => Some(text),
            Command::Invite(_, channel) => Some(channel),
            Command::Join(channel) => Some(channel),
            Command::Part(channel, reason) => reason.as_deref().or(Some(channel)),
            Command::Quit(reason) | Command::Error(reason) => Some(reason),
            Command::Nick(nick) => Some(nick),
            Command::Ping(token) | Command::Pong(_, token) => Some(token),
        }
    }
}

fn write_params(f: &mut fmt::Formatter<'_>, params: &[&str]) -> fmt::Result {
    let Some((last, middle)) = params.split_last() else {
        return Ok(());
    };
    for param in middle {
        write!(f, " {param}")?;
    }
    if last.is_empty() || last.contains(' ') || last.starts_with(':') {
        write!(f, " :{last}")
    } else {
        write!(f, " {last}")
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(prefix) = &self.prefix {
            write!(f, ":{prefix} ")?;
        }
        match &self.command {
            Command::Response(response, params) => {
                write!(f, "{:03}", response.code())?;
                let params: Vec<&str> = params.iter().map(String::as_str).collect();
                write_params(f, &params)
            }
            Command::Notice(target, text) => {
                write!(f, "NOTICE")?;
                write_params(f, &[target.as_str(), text.as_str()])
            }
            Command::Invite(nick, channel) => {
                write!(f, "INVITE")?;
                write_params(f, &[nick.as_str(), channel.as_str()])
            }
            Command::Join(channel) => {
                write!(f, "JOIN")?;
                write_params(f, &[channel.as_str()])
            }
            Command::Part(channel, reason) => {
                write!(f, "PART")?;
                match reason {
                    Some(reason) => write_params(f, &[channel.as_str(), reason.as_str()]),
                    None => write_params(f, &[channel.as_str()]),
                }
            }
            Command::Quit(reason) => {
                write!(f, "QUIT")?;
                write_params(f, &[reason.as_str()])
            }
            Command::Nick(nick) => {
                write!(f, "NICK")?;
                write_params(f, &[nick.as_str()])
            }
            Command::Ping(token) => {
                write!(f, "PING")?;
                write_params(f, &[token.as_str()])
            }
            Command::Pong(server, token) => {
                write!(f, "PONG")?;
                write_params(f, &[server.as_str(), token.as_str()])
            }
            Command::Error(reason) => {
                write!(f, "ERROR")?;
                write_params(f, &[reason.as_str()])
            }
        }
    }
}

/// A command line received from a client or relayed by a peer.
///
/// The source prefix, if any, is dropped: the sender is known from the
/// connection (or the UID the peer attributed the line to).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    command: String,
    params: Vec<String>,
}

impl IncomingMessage {
    pub fn new(command: &str, params: &[&str]) -> Self {
        Self {
            command: command.to_ascii_uppercase(),
            params: params.iter().map(|p| (*p).to_string()).collect(),
        }
    }

    /// Split one line into command and parameters. Returns `None` for a
    /// blank line.
    pub fn parse(line: &str) -> Option<Self> {
        let mut rest = line.trim_end_matches(['\r', '\n']).trim_start_matches(' ');
        if let Some(sourced) = rest.strip_prefix(':') {
            rest = sourced
                .split_once(' ')
                .map_or("", |(_, tail)| tail)
                .trim_start_matches(' ');
        }

        let (command, mut rest) = rest.split_once(' ').unwrap_or((rest, ""));
        if command.is_empty() {
            return None;
        }

        let mut params = Vec::new();
        loop {
            rest = rest.trim_start_matches(' ');
            if rest.is_empty() {
                break;
            }
            if let Some(trailing) = rest.strip_prefix(':') {
                params.push(trailing.to_string());
                break;
            }
            match rest.split_once(' ') {
                Some((param, tail)) => {
                    params.push(param.to_string());
                    rest = tail;
                }
                None => {
                    params.push(rest.to_string());
                    break;
                }
            }
        }

        Some(Self {
            command: command.to_ascii_uppercase(),
            params,
        })
    }

    /// Upper-cased command name.
    pub fn command_name(&self) -> &str {
        &self.command
    }

    pub fn arg(&self, n: usize) -> Option<&str> {
        self.params.get(n).map(String::as_str)
    }

    pub fn arg_count(&self) -> usize {
        self.params.len()
    }
}
