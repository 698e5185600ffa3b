//! Server query handlers.

mod stats;

pub use stats::StatsHandler;
