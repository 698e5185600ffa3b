//! Runtime statistics.
//!
//! Counters reported by `STATS T`, `STATS z`, `STATS m` and `STATS u`.
//! Owned by the core actor, so plain integers suffice.

use std::collections::BTreeMap;

/// Server runtime counters.
#[derive(Debug, Default)]
pub struct ServerStats {
    /// Connections admitted.
    pub accepts: u64,
    /// Connections refused at admission.
    pub refused: u64,
    /// Commands received that no handler knows.
    pub unknown_commands: u64,
    /// Nick collisions with peers.
    pub collisions: u64,
    /// Connections accepted since startup, refused ones included.
    pub connections: u64,
    /// Unix time the server started.
    pub started_at: i64,
    commands: BTreeMap<String, u64>,
}

impl ServerStats {
    pub fn new(started_at: i64) -> Self {
        Self {
            started_at,
            ..Self::default()
        }
    }

    /// Count one use of `command`.
    pub fn record_command(&mut self, command: &str) {
        *self.commands.entry(command.to_string()).or_default() += 1;
    }

    /// Per-command usage in name order.
    pub fn command_counts(&self) -> impl Iterator<Item = (&str, u64)> {
        self.commands.iter().map(|(name, count)| (name.as_str(), *count))
    }

    /// Total commands handled.
    pub fn total_commands(&self) -> u64 {
        self.commands.values().sum()
    }

    /// Seconds since startup.
    pub fn uptime(&self, now: i64) -> u64 {
        u64::try_from(now - self.started_at).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_counts_are_sorted() {
        let mut stats = ServerStats::new(0);
        stats.record_command("STATS");
        stats.record_command("INVITE");
        stats.record_command("STATS");
        let counts: Vec<_> = stats.command_counts().collect();
        assert_eq!(counts, vec![("INVITE", 1), ("STATS", 2)]);
        assert_eq!(stats.total_commands(), 3);
    }

    #[test]
    fn test_uptime_never_negative() {
        let stats = ServerStats::new(1_000);
        assert_eq!(stats.uptime(1_090), 90);
        assert_eq!(stats.uptime(10), 0);
    }
}
