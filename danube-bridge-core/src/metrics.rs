//! Bridge observability via the `metrics` facade.
//!
//! Counters and gauges are emitted through [`metrics`]; the embedding process
//! decides on the exporter (Prometheus, statsd, none). All series carry a
//! `role` label so the producer and consumer sides stay distinguishable.

use metrics::{counter, gauge, histogram};
use std::time::Duration;

/// Metrics recorder for one bridge role.
#[derive(Debug, Clone, Copy)]
pub struct BridgeMetrics {
    role: &'static str,
}

impl BridgeMetrics {
    /// Create a recorder labelled with the given role ("producer"/"consumer").
    pub fn new(role: &'static str) -> Self {
        Self { role }
    }

    /// Mark the role as running (1) or idle (0).
    pub fn set_running(&self, running: bool) {
        gauge!("bridge_role_running", "role" => self.role).set(if running { 1.0 } else { 0.0 });
    }

    /// Count a failed initialization, labelled by setup phase.
    pub fn record_init_failure(&self, phase: &'static str) {
        counter!("bridge_init_failures_total", "role" => self.role, "phase" => phase).increment(1);
    }

    /// Count a successfully sent message.
    pub fn record_send(&self) {
        counter!("bridge_messages_sent_total", "role" => self.role).increment(1);
    }

    /// Count a rejected or failed send.
    pub fn record_send_error(&self) {
        counter!("bridge_send_errors_total", "role" => self.role).increment(1);
    }

    /// Count a message delivered by the broker to the pump.
    pub fn record_received(&self) {
        counter!("bridge_messages_received_total", "role" => self.role).increment(1);
    }

    /// Count a message accepted into the relay queue.
    pub fn record_relayed(&self) {
        counter!("bridge_messages_relayed_total", "role" => self.role).increment(1);
    }

    /// Count a message skipped by the tag filter.
    pub fn record_filtered(&self) {
        counter!("bridge_messages_filtered_total", "role" => self.role).increment(1);
    }

    /// Count a poll that returned without a message.
    pub fn record_timeout(&self) {
        counter!("bridge_poll_timeouts_total", "role" => self.role).increment(1);
    }

    /// Record the time a send spent in the broker client.
    pub fn record_send_time(&self, duration: Duration) {
        histogram!("bridge_send_duration_seconds", "role" => self.role)
            .record(duration.as_secs_f64());
    }
}

/// Count a payload dropped because the relay queue was full.
///
/// Free function rather than a method: the relay's push handle lives on the
/// broker callback path and does not carry a role.
pub(crate) fn record_relay_drop() {
    counter!("bridge_relay_dropped_total").increment(1);
}
