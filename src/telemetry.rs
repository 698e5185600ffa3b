//! Telemetry utilities for command timing and tracing spans.

use std::time::Instant;

use tracing::trace;

/// Guard for timing command execution.
///
/// Records the command latency when dropped.
pub struct CommandTimer {
    command: String,
    start: Instant,
}

impl CommandTimer {
    /// Start timing a command.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            start: Instant::now(),
        }
    }
}

impl Drop for CommandTimer {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        crate::metrics::record_command(&self.command, elapsed.as_secs_f64());
        trace!(command = %self.command, elapsed_us = elapsed.as_micros() as u64, "Command handled");
    }
}

/// Standardized span constructors for IRC observability.
pub mod spans {
    use std::net::IpAddr;

    use tracing::{Span, info_span};

    /// Create a span for a client connection.
    pub fn connection(conn_id: u64, ip: IpAddr) -> Span {
        info_span!("connection", conn_id, ip = %ip)
    }

    /// Create a span for a command execution.
    pub fn command(name: &str, source: &str, target: Option<&str>) -> Span {
        if let Some(target) = target {
            info_span!("command", name = %name, source = %source, target = %target)
        } else {
            info_span!("command", name = %name, source = %source)
        }
    }
}
