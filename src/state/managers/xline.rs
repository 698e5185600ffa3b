//! Ban rule storage.
//!
//! Rules are stored per kind, keyed by casemapped mask, so a second rule
//! with the same kind and mask replaces the first. Expired rules stop
//! matching immediately and are purged by [`XLineManager::expire`].

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, info};

use crate::casemap::irc_to_lower;
use crate::config::InsaneConfig;
use crate::security::{XLine, XLineError, XLineKind, insane};
use crate::state::User;

/// Result of storing a rule.
#[derive(Debug, Clone)]
pub enum AddOutcome {
    Added,
    /// An older rule with the same kind and mask was replaced.
    Replaced(XLine),
}

/// Holds active ban rules of every kind.
#[derive(Debug)]
pub struct XLineManager {
    lines: HashMap<XLineKind, BTreeMap<String, XLine>>,
    insane: InsaneConfig,
}

impl XLineManager {
    pub fn new(insane: InsaneConfig) -> Self {
        Self {
            lines: HashMap::new(),
            insane,
        }
    }

    pub fn set_insane(&mut self, insane: InsaneConfig) {
        self.insane = insane;
    }

    /// Whether `line` would cover too much of `users`. Returns the percentage if so.
    pub fn matches_everyone<'a>(
        &self,
        line: &XLine,
        users: impl IntoIterator<Item = &'a User>,
    ) -> Option<f64> {
        insane::check(&self.insane, line, users)
    }

    /// Store `line` after the insane check against `users`.
    pub fn add<'a>(
        &mut self,
        line: XLine,
        users: impl IntoIterator<Item = &'a User>,
    ) -> Result<AddOutcome, XLineError> {
        if let Some(percent) = self.matches_everyone(&line, users) {
            return Err(XLineError::Insane {
                kind: line.kind,
                mask: line.mask,
                percent,
            });
        }
        Ok(self.insert(line))
    }

    /// Store `line` without the insane check (rules received from peers).
    pub fn insert(&mut self, line: XLine) -> AddOutcome {
        let key = irc_to_lower(&line.mask);
        debug!(kind = %line.kind, mask = %line.mask, duration = line.duration, "X-line stored");
        match self.lines.entry(line.kind).or_default().insert(key, line) {
            Some(old) => AddOutcome::Replaced(old),
            None => AddOutcome::Added,
        }
    }

    /// Remove the rule of `kind` with `mask`.
    pub fn remove(&mut self, kind: XLineKind, mask: &str) -> Option<XLine> {
        let rules = self.lines.get_mut(&kind)?;
        let removed = rules.remove(&irc_to_lower(mask));
        if rules.is_empty() {
            self.lines.remove(&kind);
        }
        removed
    }

    /// Find a rule of `kind` with exactly this mask.
    pub fn get(&self, kind: XLineKind, mask: &str) -> Option<&XLine> {
        self.lines.get(&kind)?.get(&irc_to_lower(mask))
    }

    /// First unexpired rule of `kind` matching `user`.
    pub fn matches(&self, kind: XLineKind, user: &User, now: i64) -> Option<&XLine> {
        self.lines
            .get(&kind)?
            .values()
            .find(|line| !line.is_expired(now) && line.matches(user))
    }

    /// First unexpired Q-line matching a nickname.
    pub fn matches_nick(&self, nick: &str, now: i64) -> Option<&XLine> {
        self.lines
            .get(&XLineKind::Q)?
            .values()
            .find(|line| !line.is_expired(now) && line.matches_nick(nick))
    }

    /// Whether an unexpired E-line covers `user`.
    pub fn is_exempt(&self, user: &User, now: i64) -> bool {
        self.matches(XLineKind::E, user, now).is_some()
    }

    /// Unexpired rules of `kind` in mask order.
    pub fn list(&self, kind: XLineKind, now: i64) -> impl Iterator<Item = &XLine> {
        self.lines
            .get(&kind)
            .into_iter()
            .flat_map(|rules| rules.values())
            .filter(move |line| !line.is_expired(now))
    }

    /// Purge expired rules of every kind, returning them.
    pub fn expire(&mut self, now: i64) -> Vec<XLine> {
        let mut expired = Vec::new();
        for rules in self.lines.values_mut() {
            let keys: Vec<String> = rules
                .iter()
                .filter(|(_, line)| line.is_expired(now))
                .map(|(key, _)| key.clone())
                .collect();
            for key in keys {
                if let Some(line) = rules.remove(&key) {
                    info!(kind = %line.kind, mask = %line.mask, "X-line expired");
                    expired.push(line);
                }
            }
        }
        self.lines.retain(|_, rules| !rules.is_empty());
        expired
    }

    /// Stored rules, expired ones not yet purged included.
    pub fn len(&self) -> usize {
        self.lines.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}
