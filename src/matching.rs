//! Mask matching: glob wildcards and CIDR ranges.

use std::net::IpAddr;

use ipnet::IpNet;

use crate::casemap::irc_lower_char;

/// Match `text` against a glob `pattern` (`*` any run, `?` any one char).
///
/// Comparison is case-insensitive under RFC 1459 case mapping.
pub fn wildcard_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().map(irc_lower_char).collect();
    let text: Vec<char> = text.chars().map(irc_lower_char).collect();

    let mut p = 0;
    let mut t = 0;
    let mut star_p = None;
    let mut star_t = 0;

    while t < text.len() {
        if p < pattern.len() && (pattern[p] == '?' || pattern[p] == text[t]) {
            p += 1;
            t += 1;
        } else if p < pattern.len() && pattern[p] == '*' {
            star_p = Some(p);
            star_t = t;
            p += 1;
        } else if let Some(sp) = star_p {
            p = sp + 1;
            star_t += 1;
            t = star_t;
        } else {
            return false;
        }
    }

    pattern[p..].iter().all(|&c| c == '*')
}

/// Match `text` against `mask`, treating an address part written in CIDR
/// notation as a network.
///
/// Both may carry an `ident@` part, which is compared with
/// [`wildcard_match`]. When the mask's address part is a network and the
/// text's address part is an IP address, containment decides; otherwise
/// the comparison falls back to glob matching.
pub fn match_cidr(text: &str, mask: &str) -> bool {
    if let Some((mask_ident, mask_addr)) = mask.rsplit_once('@') {
        let Some((text_ident, text_addr)) = text.rsplit_once('@') else {
            return false;
        };
        return wildcard_match(mask_ident, text_ident) && match_cidr(text_addr, mask_addr);
    }

    if mask.contains('/')
        && let (Ok(net), Ok(ip)) = (mask.parse::<IpNet>(), text.parse::<IpAddr>())
    {
        return net.contains(&ip);
    }

    wildcard_match(mask, text)
}

/// Whether the mask matches everything it could be tested against.
pub fn is_all_wildcards(mask: &str) -> bool {
    mask.chars().all(|c| matches!(c, '*' | '?' | '@' | '!' | '.'))
}
