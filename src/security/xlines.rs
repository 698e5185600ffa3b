//! X-Lines: server-level ban rules.
//!
//! | Kind | Scope | Matches |
//! |------|-------|---------|
//! | K | Local | ident@host (CIDR aware) |
//! | G | Global | ident@host (CIDR aware) |
//! | Z | Global | IP address or CIDR range |
//! | Q | Global | Nickname |
//! | E | Global | ident@host; exempts from K/G/Z |
//! | R | Global | Regex on `nick!ident@host realname` |
//!
//! A rule with `duration == 0` is permanent; otherwise it is inert from
//! `set_time + duration` onward.

use std::fmt;

use regex::{Regex, RegexBuilder};
use thiserror::Error;

use crate::matching::{match_cidr, wildcard_match};
use crate::state::User;

/// X-line kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum XLineKind {
    K,
    G,
    Z,
    Q,
    E,
    R,
}

impl XLineKind {
    pub const ALL: [XLineKind; 6] = [
        XLineKind::K,
        XLineKind::G,
        XLineKind::Z,
        XLineKind::Q,
        XLineKind::E,
        XLineKind::R,
    ];

    /// Kind letter as used in quit reasons and notices.
    pub fn letter(self) -> char {
        match self {
            XLineKind::K => 'K',
            XLineKind::G => 'G',
            XLineKind::Z => 'Z',
            XLineKind::Q => 'Q',
            XLineKind::E => 'E',
            XLineKind::R => 'R',
        }
    }

    /// STATS symbol listing rules of this kind.
    pub fn stats_symbol(self) -> char {
        match self {
            XLineKind::K => 'k',
            XLineKind::G => 'g',
            XLineKind::Z => 'Z',
            XLineKind::Q => 'q',
            XLineKind::E => 'e',
            XLineKind::R => 'R',
        }
    }

    pub fn from_stats_symbol(symbol: char) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.stats_symbol() == symbol)
    }

    /// Whether rules of this kind are shared with the rest of the network.
    pub fn is_global(self) -> bool {
        !matches!(self, XLineKind::K)
    }

    /// Whether the mask has an `ident@host` form.
    pub fn is_host_kind(self) -> bool {
        matches!(self, XLineKind::K | XLineKind::G | XLineKind::E)
    }

    /// Operator command adding a rule of this kind.
    pub fn add_command(self) -> &'static str {
        match self {
            XLineKind::K => "KLINE",
            XLineKind::G => "GLINE",
            XLineKind::Z => "ZLINE",
            XLineKind::Q => "QLINE",
            XLineKind::E => "ELINE",
            XLineKind::R => "RLINE",
        }
    }

    pub fn remove_command(self) -> &'static str {
        match self {
            XLineKind::K => "UNKLINE",
            XLineKind::G => "UNGLINE",
            XLineKind::Z => "UNZLINE",
            XLineKind::Q => "UNQLINE",
            XLineKind::E => "UNELINE",
            XLineKind::R => "UNRLINE",
        }
    }

    /// Canonical form of `mask` for this kind.
    ///
    /// Host kinds without an `@` get a `*@` ident part. Z-lines accept an
    /// ident part only if it is `*`.
    pub fn normalize_mask(self, mask: &str) -> Result<String, XLineError> {
        let kind = self;
        let mask = mask.trim();
        if mask.is_empty() {
            return Err(XLineError::InvalidMask {
                kind,
                reason: "mask is empty",
            });
        }
        let mask = match kind {
            XLineKind::K | XLineKind::G | XLineKind::E => match mask.rsplit_once('@') {
                Some((_, "")) | Some(("", _)) => {
                    return Err(XLineError::InvalidMask {
                        kind,
                        reason: "mask must be ident@host",
                    });
                }
                Some(_) => mask.to_string(),
                None => format!("*@{mask}"),
            },
            XLineKind::Z => match mask.rsplit_once('@') {
                Some(("*", addr)) if !addr.is_empty() => addr.to_string(),
                Some(_) => {
                    return Err(XLineError::InvalidMask {
                        kind,
                        reason: "Z-lines cannot include a username",
                    });
                }
                None => mask.to_string(),
            },
            XLineKind::Q => {
                if mask.contains(['!', '@', ' ']) {
                    return Err(XLineError::InvalidMask {
                        kind,
                        reason: "Q-lines match nicknames only",
                    });
                }
                mask.to_string()
            }
            XLineKind::R => mask.to_string(),
        };
        Ok(mask)
    }

    /// Kinds checked against connecting and registering users, in order.
    pub fn bans_at(connecting: bool) -> &'static [XLineKind] {
        if connecting {
            &[XLineKind::G, XLineKind::K, XLineKind::Z, XLineKind::R]
        } else {
            &[XLineKind::G, XLineKind::K, XLineKind::R]
        }
    }
}

impl fmt::Display for XLineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-line", self.letter())
    }
}

/// Rejected ban rules.
#[derive(Debug, Error)]
pub enum XLineError {
    #[error("{kind} mask {mask} covers {percent:.2}% of the network")]
    Insane {
        kind: XLineKind,
        mask: String,
        percent: f64,
    },
    #[error("invalid {kind} mask: {reason}")]
    InvalidMask {
        kind: XLineKind,
        reason: &'static str,
    },
    #[error("invalid regular expression: {0}")]
    InvalidRegex(#[from] regex::Error),
}

/// A ban rule.
#[derive(Debug, Clone)]
pub struct XLine {
    pub kind: XLineKind,
    pub mask: String,
    pub reason: String,
    pub set_by: String,
    /// Unix time the rule was set.
    pub set_time: i64,
    /// Seconds until expiry; 0 is permanent.
    pub duration: u64,
    regex: Option<Regex>,
}

impl XLine {
    /// Build a rule, normalizing the mask for its kind (see
    /// [`XLineKind::normalize_mask`]). R-lines compile their mask as a
    /// case-insensitive regular expression.
    pub fn new(
        kind: XLineKind,
        mask: &str,
        reason: impl Into<String>,
        set_by: impl Into<String>,
        set_time: i64,
        duration: u64,
    ) -> Result<Self, XLineError> {
        let mask = kind.normalize_mask(mask)?;
        let regex = match kind {
            XLineKind::R => Some(RegexBuilder::new(&mask).case_insensitive(true).build()?),
            _ => None,
        };

        Ok(Self {
            kind,
            mask,
            reason: reason.into(),
            set_by: set_by.into(),
            set_time,
            duration,
            regex,
        })
    }

    /// Unix time the rule stops applying, or `None` if permanent.
    pub fn expiry(&self) -> Option<i64> {
        if self.duration == 0 {
            return None;
        }
        let duration = i64::try_from(self.duration).unwrap_or(i64::MAX);
        Some(self.set_time.saturating_add(duration))
    }

    /// Check if this X-line has expired at `now`.
    pub fn is_expired(&self, now: i64) -> bool {
        self.expiry().is_some_and(|expiry| now >= expiry)
    }

    /// Quit reason for users disconnected by this rule.
    pub fn quit_reason(&self) -> String {
        format!("{}-Lined: {}", self.kind.letter(), self.reason)
    }

    /// Check if this X-line matches `user`.
    pub fn matches(&self, user: &User) -> bool {
        match self.kind {
            XLineKind::K | XLineKind::G | XLineKind::E => {
                let (ident_mask, host_mask) = self
                    .mask
                    .rsplit_once('@')
                    .unwrap_or(("*", self.mask.as_str()));
                wildcard_match(ident_mask, &user.ident)
                    && (match_cidr(&user.real_host, host_mask)
                        || match_cidr(&user.host, host_mask)
                        || match_cidr(&user.ip.to_string(), host_mask))
            }
            XLineKind::Z => match_cidr(&user.ip.to_string(), &self.mask),
            XLineKind::Q => user.nick.as_deref().is_some_and(|nick| self.matches_nick(nick)),
            XLineKind::R => self.regex.as_ref().is_some_and(|re| {
                let nick = user.nick_or_star();
                re.is_match(&format!("{}!{} {}", nick, user.user_host(), user.realname))
                    || re.is_match(&format!("{}!{} {}", nick, user.user_ip(), user.realname))
            }),
        }
    }

    /// Q-line test against a nickname that is not set yet.
    pub fn matches_nick(&self, nick: &str) -> bool {
        self.kind == XLineKind::Q && wildcard_match(&self.mask, nick)
    }

    /// Coverage test used by the insane-ban check.
    ///
    /// Host kinds are tested against `ident@real_host` and `ident@ip`;
    /// other kinds use [`XLine::matches`].
    pub fn covers(&self, user: &User) -> bool {
        if self.kind.is_host_kind() {
            match_cidr(&user.user_host(), &self.mask) || match_cidr(&user.user_ip(), &self.mask)
        } else {
            self.matches(user)
        }
    }
}
