//! Insane ban detection.
//!
//! Before a rule is stored, its mask is tested against every known identity
//! (unregistered ones included). A mask covering more than the configured
//! percentage of the population is refused unless its kind is bypassed.

use crate::config::InsaneConfig;
use crate::state::User;

use super::xlines::XLine;

/// How much of the population a mask covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Coverage {
    pub matched: usize,
    pub total: usize,
}

impl Coverage {
    /// Percentage of the population matched; 0 for an empty population.
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.matched as f64 / self.total as f64 * 100.0
    }
}

/// Count the identities `line` would cover.
pub fn coverage<'a>(line: &XLine, users: impl IntoIterator<Item = &'a User>) -> Coverage {
    let mut coverage = Coverage {
        matched: 0,
        total: 0,
    };
    for user in users {
        coverage.total += 1;
        if line.covers(user) {
            coverage.matched += 1;
        }
    }
    coverage
}

/// Returns the covered percentage if `line` is insane under `config`.
///
/// A mask that matches nobody is never insane.
pub fn check<'a>(
    config: &InsaneConfig,
    line: &XLine,
    users: impl IntoIterator<Item = &'a User>,
) -> Option<f64> {
    if config.bypass(line.kind) {
        return None;
    }
    let coverage = coverage(line, users);
    if coverage.matched == 0 {
        return None;
    }
    let percent = coverage.percent();
    (percent > config.trigger()).then_some(percent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::XLineKind;
    use crate::state::PeerServer;
    use std::sync::Arc;

    fn population(ips: &[&str]) -> Vec<User> {
        let server = Arc::new(PeerServer::new("remote.test.net", "1BB"));
        ips.iter()
            .enumerate()
            .map(|(i, ip)| {
                User::remote(
                    format!("1BBAAAAA{i}"),
                    format!("user{i}"),
                    "ident",
                    format!("host{i}.example.com"),
                    ip.parse().unwrap(),
                    server.clone(),
                    0,
                )
            })
            .collect()
    }

    #[test]
    fn test_match_all_is_insane() {
        let users = population(&["10.0.0.1", "10.0.0.2", "10.0.0.3"]);
        let line = XLine::new(XLineKind::G, "*@*", "r", "o", 0, 0).unwrap();
        assert_eq!(check(&InsaneConfig::default(), &line, &users), Some(100.0));
    }

    #[test]
    fn test_narrow_mask_is_sane() {
        let users = population(&["10.0.0.1", "10.0.0.2", "10.0.0.3"]);
        let line = XLine::new(XLineKind::G, "*@10.0.0.1", "r", "o", 0, 0).unwrap();
        assert_eq!(check(&InsaneConfig::default(), &line, &users), None);
    }

    #[test]
    fn test_empty_population_is_sane() {
        let users: Vec<User> = Vec::new();
        let line = XLine::new(XLineKind::Z, "*", "r", "o", 0, 0).unwrap();
        assert_eq!(check(&InsaneConfig::default(), &line, &users), None);
    }

    #[test]
    fn test_bypass_flag_allows_insane_mask() {
        let users = population(&["10.0.0.1"]);
        let line = XLine::new(XLineKind::Z, "*", "r", "o", 0, 0).unwrap();
        let mut config = InsaneConfig::default();
        config.ipmasks = true;
        assert_eq!(check(&config, &line, &users), None);
    }

    #[test]
    fn test_trigger_is_strictly_greater() {
        let users = population(&["10.0.0.1", "10.0.0.2"]);
        let line = XLine::new(XLineKind::Z, "10.0.0.1", "r", "o", 0, 0).unwrap();
        let at_fifty = InsaneConfig::default().with_trigger(50.0);
        assert_eq!(check(&at_fifty, &line, &users), None);
        let below = InsaneConfig::default().with_trigger(49.9);
        assert_eq!(check(&below, &line, &users), Some(50.0));
    }
}
