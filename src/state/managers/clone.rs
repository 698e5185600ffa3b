//! Clone counting per address range.
//!
//! Every live identity is counted once in the global count of its range,
//! and local identities once more in the local count. A range with no
//! identities left has no entry.

use std::collections::HashMap;
use std::net::IpAddr;

use ipnet::IpNet;
use tracing::debug;

use crate::config::CloneConfig;
use crate::state::User;

/// Identities sharing one address range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CloneCounts {
    pub global: u32,
    pub local: u32,
}

/// Tracks [`CloneCounts`] keyed by masked address range.
#[derive(Debug)]
pub struct CloneTracker {
    ranges: HashMap<IpNet, CloneCounts>,
    ipv4_prefix: u8,
    ipv6_prefix: u8,
}

impl CloneTracker {
    pub fn new(config: &CloneConfig) -> Self {
        Self {
            ranges: HashMap::new(),
            ipv4_prefix: config.ipv4_prefix.min(32),
            ipv6_prefix: config.ipv6_prefix.min(128),
        }
    }

    /// The range `ip` belongs to.
    pub fn range_of(&self, ip: IpAddr) -> IpNet {
        let prefix = match ip {
            IpAddr::V4(_) => self.ipv4_prefix,
            IpAddr::V6(_) => self.ipv6_prefix,
        };
        IpNet::new(ip, prefix)
            .map(|net| net.trunc())
            .unwrap_or_else(|_| IpNet::from(ip))
    }

    /// Count `user` in its range.
    pub fn add_clone(&mut self, user: &User) {
        let range = self.range_of(user.ip);
        let counts = self.ranges.entry(range).or_default();
        counts.global += 1;
        if user.is_local() {
            counts.local += 1;
        }
    }

    /// Remove `user` from its range, dropping the entry when it empties.
    ///
    /// # Panics
    ///
    /// If `user` was never counted in this range.
    pub fn remove_clone(&mut self, user: &User) {
        let range = self.range_of(user.ip);
        let Some(counts) = self.ranges.get_mut(&range) else {
            panic!("clone range {range} missing for {}", user.uid);
        };
        assert!(counts.global > 0, "clone range {range} underflow for {}", user.uid);
        counts.global -= 1;
        if user.is_local() {
            assert!(counts.local > 0, "local clone range {range} underflow for {}", user.uid);
            counts.local -= 1;
        }
        if counts.global == 0 {
            self.ranges.remove(&range);
        }
    }

    /// Counts for the range `user` is in; zeros if none are recorded.
    pub fn counts(&self, user: &User) -> CloneCounts {
        self.counts_for(user.ip)
    }

    pub fn counts_for(&self, ip: IpAddr) -> CloneCounts {
        self.ranges
            .get(&self.range_of(ip))
            .copied()
            .unwrap_or_default()
    }

    /// Discard all counts and recount from `users`.
    pub fn rehash<'a>(&mut self, users: impl IntoIterator<Item = &'a User>) {
        self.ranges.clear();
        for user in users {
            self.add_clone(user);
        }
        debug!(ranges = self.ranges.len(), "Clone counts rebuilt");
    }

    /// Adopt new range sizes. Returns true if they changed.
    pub fn reconfigure(&mut self, config: &CloneConfig) -> bool {
        let ipv4_prefix = config.ipv4_prefix.min(32);
        let ipv6_prefix = config.ipv6_prefix.min(128);
        let changed = ipv4_prefix != self.ipv4_prefix || ipv6_prefix != self.ipv6_prefix;
        self.ipv4_prefix = ipv4_prefix;
        self.ipv6_prefix = ipv6_prefix;
        changed
    }

    /// Number of ranges with at least one identity.
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}
