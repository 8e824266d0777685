//! Producer role lifecycle.
//!
//! One [`ProducerState`] exists per process. Every field lives behind a
//! single async mutex held for the whole check-act sequence of each
//! operation, so no caller ever observes a half-updated state.

use crate::config::LinkConfig;
use crate::error::{InitCode, ShutdownCode};
use crate::link::{BrokerLink, ProducerTransport, SendStatus};
use crate::metrics::BridgeMetrics;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

/// Terminal result of a send attempt, before boundary marshalling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// The broker stored the message and assigned it an identifier.
    Sent { message_id: String },
    /// The transport call succeeded but the broker answered non-OK.
    Rejected { status: String },
    /// The transport call itself failed.
    Failed { reason: String },
    /// Topic or body was empty.
    InvalidParams,
    /// The producer is not initialized.
    NotRunning,
}

/// Singleton lifecycle holder for the producing side.
pub struct ProducerState {
    inner: Mutex<ProducerInner>,
    metrics: BridgeMetrics,
}

#[derive(Default)]
struct ProducerInner {
    handle: Option<Box<dyn ProducerTransport>>,
    running: bool,
    last_error: Option<String>,
    config: Option<LinkConfig>,
}

impl ProducerState {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(ProducerInner::default()),
            metrics: BridgeMetrics::new("producer"),
        }
    }

    /// Build and start the producer-side broker client.
    ///
    /// Idempotent against repeated or racing calls: whoever wins the lock
    /// first performs the start, everyone after observes AlreadyRunning.
    pub async fn initialize(
        &self,
        link: &dyn BrokerLink,
        broker_url: &str,
        group: &str,
    ) -> InitCode {
        let mut inner = self.inner.lock().await;

        if inner.running {
            info!("Producer is already running");
            return InitCode::AlreadyRunning;
        }

        inner.last_error = None;

        if broker_url.is_empty() || group.is_empty() {
            warn!(
                "Invalid producer parameters: url='{}', group='{}'",
                broker_url, group
            );
            inner.last_error =
                Some("Invalid parameters: broker URL or group cannot be empty".to_string());
            return InitCode::InvalidParams;
        }

        let config = LinkConfig::for_producer(broker_url, group);
        info!("Initializing producer: url={}, group={}", broker_url, group);

        match link.open_producer(&config).await {
            Ok(handle) => {
                inner.handle = Some(handle);
                inner.config = Some(config);
                inner.running = true;
                self.metrics.set_running(true);
                info!("Producer started successfully");
                InitCode::Ok
            }
            Err(e) => {
                error!("Producer initialization failed: {}", e);
                self.metrics.record_init_failure(e.phase());
                inner.last_error = Some(e.to_string());
                e.init_code()
            }
        }
    }

    /// Send one message and wait for the broker's answer.
    ///
    /// The collaborator's own deadline governs how long this blocks; there is
    /// no caller-supplied timeout on the send path.
    pub async fn send(&self, topic: &str, tag: &str, body: &[u8]) -> SendOutcome {
        let mut inner = self.inner.lock().await;

        if inner.running && inner.handle.is_none() {
            warn!("Producer marked running with no client, resetting state");
            inner.running = false;
            self.metrics.set_running(false);
        }
        if !inner.running {
            warn!("Send attempted while producer is not running");
            return SendOutcome::NotRunning;
        }

        if topic.is_empty() || body.is_empty() {
            warn!("Invalid send parameters: topic='{}'", topic);
            return SendOutcome::InvalidParams;
        }

        let started = Instant::now();
        let result = match inner.handle.as_mut() {
            Some(handle) => handle.send(topic, tag, body).await,
            None => return SendOutcome::NotRunning,
        };

        match result {
            Ok(receipt) => match receipt.status {
                SendStatus::Ok => {
                    self.metrics.record_send();
                    self.metrics.record_send_time(started.elapsed());
                    info!("Message sent: topic={}, id={}", topic, receipt.message_id);
                    SendOutcome::Sent {
                        message_id: receipt.message_id,
                    }
                }
                SendStatus::Other(status) => {
                    error!("Send refused by broker: status={}", status);
                    self.metrics.record_send_error();
                    inner.last_error = Some(format!("Send failed with status {}", status));
                    SendOutcome::Rejected { status }
                }
            },
            Err(e) => {
                error!("Send failed: {}", e);
                self.metrics.record_send_error();
                inner.last_error = Some(e.to_string());
                SendOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Stop the broker client and return to Idle.
    pub async fn shutdown(&self) -> ShutdownCode {
        let mut inner = self.inner.lock().await;

        if !inner.running {
            info!("Producer is not running");
            return ShutdownCode::NotRunning;
        }

        let Some(mut handle) = inner.handle.take() else {
            // Corrupted state: the flag says running but no client exists.
            // Repair the flag and report the failure, never success.
            error!("Producer marked running with no client, resetting state");
            inner.running = false;
            inner.last_error = Some("Producer instance missing while marked running".to_string());
            self.metrics.set_running(false);
            return ShutdownCode::Failed;
        };

        match handle.shutdown().await {
            Ok(()) => {
                inner.running = false;
                self.metrics.set_running(false);
                info!("Producer shutdown successfully");
                ShutdownCode::Ok
            }
            Err(e) => {
                // Keep the handle and the running flag so the caller may
                // retry the shutdown.
                error!("Producer shutdown failed: {}", e);
                inner.last_error = Some(e.to_string());
                inner.handle = Some(handle);
                ShutdownCode::Failed
            }
        }
    }

    /// Whether the producer is currently running.
    pub async fn is_running(&self) -> bool {
        self.inner.lock().await.running
    }

    /// Human-readable description of the most recent failure.
    pub async fn last_error(&self) -> Option<String> {
        self.inner.lock().await.last_error.clone()
    }

    /// Connection parameters of the current or most recent run.
    pub async fn current_config(&self) -> Option<LinkConfig> {
        self.inner.lock().await.config.clone()
    }
}

impl Default for ProducerState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::testing::FakeBroker;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_initialize_success() {
        let broker = FakeBroker::new();
        let state = ProducerState::new();

        let code = state
            .initialize(&broker, "http://localhost:6650", "task_group")
            .await;

        assert_eq!(code, InitCode::Ok);
        assert!(state.is_running().await);
        assert!(state.last_error().await.is_none());
        assert_eq!(state.current_config().await.unwrap().group, "task_group");
    }

    #[tokio::test]
    async fn test_initialize_twice_reports_already_running() {
        let broker = FakeBroker::new();
        let state = ProducerState::new();

        assert_eq!(
            state.initialize(&broker, "http://localhost:6650", "g").await,
            InitCode::Ok
        );
        assert_eq!(
            state.initialize(&broker, "http://localhost:6650", "g").await,
            InitCode::AlreadyRunning
        );
        // Only one client was ever opened.
        assert_eq!(broker.opens.load(Ordering::Relaxed), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_initialize_race_starts_exactly_once() {
        let broker = FakeBroker::new();
        *broker.connect_delay.lock().unwrap() = Duration::from_millis(50);
        let state = Arc::new(ProducerState::new());

        let mut calls = Vec::new();
        for _ in 0..4 {
            let broker = Arc::clone(&broker);
            let state = Arc::clone(&state);
            calls.push(tokio::spawn(async move {
                state.initialize(&broker, "http://localhost:6650", "g").await
            }));
        }

        let mut codes = Vec::new();
        for call in calls {
            codes.push(call.await.unwrap());
        }

        assert_eq!(codes.iter().filter(|c| **c == InitCode::Ok).count(), 1);
        assert_eq!(
            codes
                .iter()
                .filter(|c| **c == InitCode::AlreadyRunning)
                .count(),
            3
        );
        assert_eq!(broker.opens.load(Ordering::Relaxed), 1);
        assert!(state.is_running().await);
    }

    #[tokio::test]
    async fn test_initialize_invalid_params_never_contacts_broker() {
        let broker = FakeBroker::new();
        let state = ProducerState::new();

        assert_eq!(
            state.initialize(&broker, "", "task_group").await,
            InitCode::InvalidParams
        );
        assert_eq!(
            state.initialize(&broker, "http://localhost:6650", "").await,
            InitCode::InvalidParams
        );

        assert_eq!(broker.opens.load(Ordering::Relaxed), 0);
        assert!(!state.is_running().await);
        assert!(state.last_error().await.unwrap().contains("Invalid"));
    }

    #[tokio::test]
    async fn test_initialize_failure_phases_are_distinguishable() {
        let state = ProducerState::new();

        let broker = FakeBroker::new();
        broker.fail_construct.store(true, Ordering::Relaxed);
        assert_eq!(
            state.initialize(&broker, "http://localhost:6650", "g").await,
            InitCode::ConstructFailed
        );
        assert!(state
            .last_error()
            .await
            .unwrap()
            .starts_with("Create client failed"));
        assert!(!state.is_running().await);

        let broker = FakeBroker::new();
        broker.fail_start.store(true, Ordering::Relaxed);
        assert_eq!(
            state.initialize(&broker, "http://localhost:6650", "g").await,
            InitCode::StartFailed
        );
        assert!(state.last_error().await.unwrap().starts_with("Start failed"));
        assert!(!state.is_running().await);
    }

    #[tokio::test]
    async fn test_send_before_initialize() {
        let state = ProducerState::new();
        assert_eq!(
            state.send("t", "", b"hello").await,
            SendOutcome::NotRunning
        );
    }

    #[tokio::test]
    async fn test_send_validates_topic_and_body() {
        let broker = FakeBroker::new();
        let state = ProducerState::new();
        state.initialize(&broker, "http://localhost:6650", "g").await;

        assert_eq!(state.send("", "", b"hello").await, SendOutcome::InvalidParams);
        assert_eq!(state.send("t", "", b"").await, SendOutcome::InvalidParams);
        assert!(broker.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_send_success_carries_message_id() {
        let broker = FakeBroker::new();
        let state = ProducerState::new();
        state.initialize(&broker, "http://localhost:6650", "g").await;

        let outcome = state.send("t", "t1", b"hello").await;
        let SendOutcome::Sent { message_id } = outcome else {
            panic!("expected Sent, got {:?}", outcome);
        };
        assert!(message_id.starts_with("FAKE-"));

        let sent = broker.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0], ("t".to_string(), "t1".to_string(), b"hello".to_vec()));
    }

    #[tokio::test]
    async fn test_send_untagged_is_allowed() {
        let broker = FakeBroker::new();
        let state = ProducerState::new();
        state.initialize(&broker, "http://localhost:6650", "g").await;

        assert!(matches!(
            state.send("t", "", b"hello").await,
            SendOutcome::Sent { .. }
        ));
    }

    #[tokio::test]
    async fn test_send_transport_failure() {
        let broker = FakeBroker::new();
        let state = ProducerState::new();
        state.initialize(&broker, "http://localhost:6650", "g").await;

        broker.fail_send.store(true, Ordering::Relaxed);
        let outcome = state.send("t", "", b"hello").await;
        assert!(matches!(outcome, SendOutcome::Failed { .. }));
        assert!(state.last_error().await.is_some());
        // A failed send does not disturb the lifecycle.
        assert!(state.is_running().await);
    }

    #[tokio::test]
    async fn test_send_logical_rejection() {
        let broker = FakeBroker::new();
        let state = ProducerState::new();
        state.initialize(&broker, "http://localhost:6650", "g").await;

        *broker.reject_status.lock().unwrap() = Some("FLUSH_DISK_TIMEOUT".to_string());
        assert_eq!(
            state.send("t", "", b"hello").await,
            SendOutcome::Rejected {
                status: "FLUSH_DISK_TIMEOUT".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_shutdown_before_initialize() {
        let state = ProducerState::new();
        assert_eq!(state.shutdown().await, ShutdownCode::NotRunning);
    }

    #[tokio::test]
    async fn test_shutdown_returns_to_idle() {
        let broker = FakeBroker::new();
        let state = ProducerState::new();
        state.initialize(&broker, "http://localhost:6650", "g").await;

        assert_eq!(state.shutdown().await, ShutdownCode::Ok);
        assert!(!state.is_running().await);
        // A second shutdown finds nothing to do.
        assert_eq!(state.shutdown().await, ShutdownCode::NotRunning);
    }

    #[tokio::test]
    async fn test_shutdown_failure_keeps_state_for_retry() {
        let broker = FakeBroker::new();
        let state = ProducerState::new();
        state.initialize(&broker, "http://localhost:6650", "g").await;

        broker.fail_shutdown.store(true, Ordering::Relaxed);
        assert_eq!(state.shutdown().await, ShutdownCode::Failed);
        assert!(state.is_running().await);

        broker.fail_shutdown.store(false, Ordering::Relaxed);
        assert_eq!(state.shutdown().await, ShutdownCode::Ok);
        assert!(!state.is_running().await);
    }

    #[tokio::test]
    async fn test_shutdown_repairs_corrupted_state() {
        let state = ProducerState::new();
        state.inner.lock().await.running = true;

        assert_eq!(state.shutdown().await, ShutdownCode::Failed);
        assert!(!state.is_running().await);
        assert!(state.last_error().await.is_some());
    }

    #[tokio::test]
    async fn test_send_repairs_corrupted_state() {
        let state = ProducerState::new();
        state.inner.lock().await.running = true;

        assert_eq!(state.send("t", "", b"x").await, SendOutcome::NotRunning);
        assert!(!state.is_running().await);
    }

    #[tokio::test]
    async fn test_reinitialize_after_shutdown() {
        let broker = FakeBroker::new();
        let state = ProducerState::new();

        state.initialize(&broker, "http://localhost:6650", "g").await;
        state.shutdown().await;
        assert_eq!(
            state.initialize(&broker, "http://localhost:6650", "g").await,
            InitCode::Ok
        );
        assert!(state.is_running().await);
        assert_eq!(broker.opens.load(Ordering::Relaxed), 2);
    }
}
