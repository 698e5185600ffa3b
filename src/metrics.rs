//! Prometheus metrics for the admission core.
//!
//! Metrics are registered once by [`init`]. Until then every recording
//! helper is a no-op, so tests and embedders that never call `init` pay
//! nothing.
//!
//! - `gate_admissions_total{result}` - accepted/refused connections
//! - `gate_xlines_enforced_total{kind}` - identities removed by a rule
//! - `gate_command_total{command}` - commands dispatched by name
//! - `gate_command_duration_seconds{command}` - command latency histogram
//! - `gate_connected_users` - live identities, local and remote

use std::sync::OnceLock;

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

static REGISTRY: OnceLock<Registry> = OnceLock::new();

pub fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

static ADMISSIONS: OnceLock<IntCounterVec> = OnceLock::new();
static XLINES_ENFORCED: OnceLock<IntCounterVec> = OnceLock::new();
static INVITES_ISSUED: OnceLock<IntCounter> = OnceLock::new();
static COMMAND_COUNTER: OnceLock<IntCounterVec> = OnceLock::new();
static COMMAND_LATENCY: OnceLock<HistogramVec> = OnceLock::new();
static CONNECTED_USERS: OnceLock<IntGauge> = OnceLock::new();
static ACTIVE_CHANNELS: OnceLock<IntGauge> = OnceLock::new();

/// Register every metric. Safe to call more than once.
pub fn init() {
    let r = registry();

    macro_rules! register {
        ($metric:ident, $init:expr) => {
            if $metric.get().is_none() {
                match $init {
                    Ok(m) => {
                        if let Err(e) = r.register(Box::new(m.clone())) {
                            tracing::warn!(error = %e, concat!("Failed to register metric ", stringify!($metric)));
                        }
                        let _ = $metric.set(m);
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, concat!("Failed to create metric ", stringify!($metric)));
                    }
                }
            }
        };
    }

    register!(ADMISSIONS, IntCounterVec::new(
        Opts::new("gate_admissions_total", "Connections admitted or refused"),
        &["result"]));
    register!(XLINES_ENFORCED, IntCounterVec::new(
        Opts::new("gate_xlines_enforced_total", "Identities removed by a server ban"),
        &["kind"]));
    register!(INVITES_ISSUED, IntCounter::new("gate_invites_issued_total", "Channel invites stored"));
    register!(COMMAND_COUNTER, IntCounterVec::new(
        Opts::new("gate_command_total", "Commands dispatched by name"),
        &["command"]));
    register!(COMMAND_LATENCY, HistogramVec::new(
        HistogramOpts::new("gate_command_duration_seconds", "Command latency by name")
            .buckets(vec![0.00001, 0.00005, 0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05]),
        &["command"]));
    register!(CONNECTED_USERS, IntGauge::new("gate_connected_users", "Live identities"));
    register!(ACTIVE_CHANNELS, IntGauge::new("gate_active_channels", "Channels with members"));
}

/// Encode all metrics in the Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let families = registry().gather();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode Prometheus metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

pub fn record_admission(accepted: bool) {
    if let Some(m) = ADMISSIONS.get() {
        let result = if accepted { "accepted" } else { "refused" };
        m.with_label_values(&[result]).inc();
    }
}

pub fn record_xline_enforced(kind: char, count: usize) {
    if count == 0 {
        return;
    }
    if let Some(m) = XLINES_ENFORCED.get() {
        let kind = kind.to_string();
        m.with_label_values(&[kind.as_str()]).inc_by(count as u64);
    }
}

pub fn record_invite() {
    if let Some(m) = INVITES_ISSUED.get() {
        m.inc();
    }
}

/// Count one dispatch of `command` taking `seconds`.
pub fn record_command(command: &str, seconds: f64) {
    if let Some(m) = COMMAND_COUNTER.get() {
        m.with_label_values(&[command]).inc();
    }
    if let Some(m) = COMMAND_LATENCY.get() {
        m.with_label_values(&[command]).observe(seconds);
    }
}

pub fn set_population(users: usize, channels: usize) {
    if let Some(m) = CONNECTED_USERS.get() {
        m.set(users as i64);
    }
    if let Some(m) = ACTIVE_CHANNELS.get() {
        m.set(channels as i64);
    }
}
