//! Consumer role lifecycle.
//!
//! Structurally the twin of the producer state, plus ownership of the relay
//! queue. The queue is created once with the state and survives consumer
//! restarts; shutdown drains it so a later run starts with an empty backlog.

use crate::config::{BridgeSettings, LinkConfig};
use crate::error::{InitCode, ShutdownCode};
use crate::link::{BrokerLink, ConsumerTransport};
use crate::metrics::BridgeMetrics;
use crate::relay::RelayQueue;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Result of one poll of the relay queue, before boundary marshalling.
///
/// The three delivery outcomes are disjoint by construction: a zero-length
/// message body yields `Empty`, never an empty `Payload`, and never collides
/// with `TimedOut`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// A non-empty message body.
    Payload(Vec<u8>),
    /// A message arrived with a zero-length body.
    Empty,
    /// No message within the timeout.
    TimedOut,
    /// The consumer is not initialized.
    NotRunning,
}

/// Singleton lifecycle holder for the consuming side.
pub struct ConsumerState {
    inner: Mutex<ConsumerInner>,
    relay: RelayQueue,
    default_poll_timeout: Duration,
    metrics: BridgeMetrics,
}

#[derive(Default)]
struct ConsumerInner {
    handle: Option<Box<dyn ConsumerTransport>>,
    running: bool,
    last_error: Option<String>,
    config: Option<LinkConfig>,
}

impl ConsumerState {
    /// Create the consumer state and its relay queue. The queue capacity is
    /// fixed here for the lifetime of the process.
    pub fn new(settings: &BridgeSettings) -> Self {
        Self {
            inner: Mutex::new(ConsumerInner::default()),
            relay: RelayQueue::new(settings.relay_capacity),
            default_poll_timeout: settings.default_poll_timeout(),
            metrics: BridgeMetrics::new("consumer"),
        }
    }

    /// Build, subscribe and start the consumer-side broker client.
    ///
    /// On success the collaborator's delivery pump feeds this state's relay
    /// queue until shutdown. Idempotent against repeated or racing calls.
    pub async fn initialize(
        &self,
        link: &dyn BrokerLink,
        broker_url: &str,
        topic: &str,
        group: &str,
        tag: &str,
    ) -> InitCode {
        let mut inner = self.inner.lock().await;

        if inner.running {
            info!("Consumer is already running");
            return InitCode::AlreadyRunning;
        }

        inner.last_error = None;

        if broker_url.is_empty() || topic.is_empty() || group.is_empty() {
            warn!(
                "Invalid consumer parameters: url='{}', topic='{}', group='{}'",
                broker_url, topic, group
            );
            inner.last_error = Some(
                "Invalid parameters: broker URL, topic or group cannot be empty".to_string(),
            );
            return InitCode::InvalidParams;
        }

        let config = LinkConfig::for_consumer(broker_url, topic, group, tag);
        info!(
            "Initializing consumer: url={}, topic={}, group={}, tag={:?}",
            broker_url, topic, group, tag
        );

        match link.open_consumer(&config, self.relay.sender()).await {
            Ok(handle) => {
                inner.handle = Some(handle);
                inner.config = Some(config);
                inner.running = true;
                self.metrics.set_running(true);
                info!("Consumer started successfully");
                InitCode::Ok
            }
            Err(e) => {
                error!("Consumer initialization failed: {}", e);
                self.metrics.record_init_failure(e.phase());
                inner.last_error = Some(e.to_string());
                e.init_code()
            }
        }
    }

    /// Wait for the next relayed message.
    ///
    /// `None` (the boundary's non-positive timeout) normalizes to the
    /// configured default rather than "return immediately". The role lock is
    /// released before the wait, so a concurrent shutdown is never stalled by
    /// a poller.
    pub async fn next_message(&self, timeout: Option<Duration>) -> PollOutcome {
        {
            let mut inner = self.inner.lock().await;
            if inner.running && inner.handle.is_none() {
                warn!("Consumer marked running with no client, resetting state");
                inner.running = false;
                self.metrics.set_running(false);
            }
            if !inner.running {
                warn!("Poll attempted while consumer is not running");
                return PollOutcome::NotRunning;
            }
        }

        let timeout = timeout.unwrap_or(self.default_poll_timeout);
        debug!("Waiting up to {:?} for a relayed message", timeout);

        match self.relay.pop(timeout).await {
            Some(payload) if payload.is_empty() => {
                warn!("Received message with empty body");
                PollOutcome::Empty
            }
            Some(payload) => {
                debug!("Message received: {} bytes", payload.len());
                PollOutcome::Payload(payload)
            }
            None => {
                debug!("Timeout waiting for message");
                self.metrics.record_timeout();
                PollOutcome::TimedOut
            }
        }
    }

    /// Stop the broker client, then drain the relay queue so a later run
    /// starts without a stale backlog.
    pub async fn shutdown(&self) -> ShutdownCode {
        let mut inner = self.inner.lock().await;

        if !inner.running {
            info!("Consumer is not running");
            return ShutdownCode::NotRunning;
        }

        let Some(mut handle) = inner.handle.take() else {
            error!("Consumer marked running with no client, resetting state");
            inner.running = false;
            inner.last_error = Some("Consumer instance missing while marked running".to_string());
            self.metrics.set_running(false);
            return ShutdownCode::Failed;
        };

        match handle.shutdown().await {
            Ok(()) => {
                inner.running = false;
                self.metrics.set_running(false);
                let drained = self.relay.drain();
                if drained > 0 {
                    debug!("Drained {} buffered message(s)", drained);
                }
                info!("Consumer shutdown successfully");
                ShutdownCode::Ok
            }
            Err(e) => {
                error!("Consumer shutdown failed: {}", e);
                inner.last_error = Some(e.to_string());
                inner.handle = Some(handle);
                ShutdownCode::Failed
            }
        }
    }

    /// Whether the consumer is currently running.
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

    /// The relay queue, for observability (buffered count, drop counter).
    pub fn relay(&self) -> &RelayQueue {
        &self.relay
    }
}
