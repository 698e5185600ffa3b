//! IRC case-mapping and name validation.
//!
//! Nicknames and channel names are compared under the `rfc1459` case
//! mapping, where `[]\~` are the upper-case forms of `{}|^`. Every map in
//! the registry is keyed by the folded form produced here.

/// Fold one character under RFC 1459 case mapping.
#[inline]
pub const fn irc_lower_char(c: char) -> char {
    match c {
        '[' => '{',
        ']' => '}',
        '\\' => '|',
        '~' => '^',
        'A'..='Z' => (c as u8 + 32) as char,
        _ => c,
    }
}

/// Fold a string under RFC 1459 case mapping.
pub fn irc_to_lower(s: &str) -> String {
    s.chars().map(irc_lower_char).collect()
}

/// Case-insensitive comparison under RFC 1459 case mapping.
pub fn irc_eq(a: &str, b: &str) -> bool {
    a.len() == b.len()
        && a
            .chars()
            .zip(b.chars())
            .all(|(ca, cb)| irc_lower_char(ca) == irc_lower_char(cb))
}

#[inline]
fn is_special(c: char) -> bool {
    matches!(c, '[' | ']' | '\\' | '`' | '_' | '^' | '{' | '|' | '}')
}

/// Whether `nick` is a syntactically valid nickname of at most `max_len` bytes.
///
/// A nickname starts with a letter or one of ``[]\`_^{|}`` and continues with
/// letters, digits, specials or `-`. A leading digit is reserved for UIDs.
pub fn is_valid_nick(nick: &str, max_len: usize) -> bool {
    if nick.is_empty() || nick.len() > max_len {
        return false;
    }
    let mut chars = nick.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || is_special(first) => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || is_special(c) || c == '-')
}

/// Whether `name` looks like a channel name.
pub fn is_channel_name(name: &str) -> bool {
    name.len() > 1
        && name.starts_with('#')
        && !name.chars().any(|c| matches!(c, ' ' | ',' | '\x07' | '\0' | '\r' | '\n'))
}
