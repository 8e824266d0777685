//! Bounded relay queue between broker delivery and boundary polling.
//!
//! The broker client delivers messages from its own worker tasks; the foreign
//! host retrieves them from whatever thread it likes, blocking with a timeout.
//! This queue is the decoupling point: a fixed-capacity FIFO with a
//! non-blocking producer side and a timeout-capable consumer side.
//!
//! Backpressure is drop-on-full: when the queue is saturated the newest
//! payload is discarded and counted, and the delivery path never blocks. The
//! queue is created once per process and survives consumer restarts; shutdown
//! drains it instead of destroying it.

use crate::metrics;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Fixed-capacity FIFO of opaque message payloads.
pub struct RelayQueue {
    tx: flume::Sender<Vec<u8>>,
    rx: flume::Receiver<Vec<u8>>,
    dropped: Arc<AtomicU64>,
    capacity: usize,
}

/// Cloneable push handle handed to the broker delivery pump.
#[derive(Clone)]
pub struct RelaySender {
    tx: flume::Sender<Vec<u8>>,
    dropped: Arc<AtomicU64>,
}

impl RelayQueue {
    /// Create a queue holding at most `capacity` payloads. Capacity is fixed
    /// for the lifetime of the queue; values below 1 are clamped to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, rx) = flume::bounded(capacity);
        Self {
            tx,
            rx,
            dropped: Arc::new(AtomicU64::new(0)),
            capacity,
        }
    }

    /// A push handle for the delivery side.
    pub fn sender(&self) -> RelaySender {
        RelaySender {
            tx: self.tx.clone(),
            dropped: Arc::clone(&self.dropped),
        }
    }

    /// Wait up to `timeout` for the next payload.
    ///
    /// Returns `None` on timeout. Concurrent callers compete on the same
    /// FIFO; each payload is handed to exactly one of them. The wait is
    /// cancellation-clean: on timeout nothing keeps running.
    pub async fn pop(&self, timeout: Duration) -> Option<Vec<u8>> {
        match tokio::time::timeout(timeout, self.rx.recv_async()).await {
            Ok(Ok(payload)) => Some(payload),
            // The queue owns a sender, so disconnection cannot happen while
            // it is alive; treat it as "no message" rather than panicking.
            Ok(Err(_)) => None,
            Err(_) => None,
        }
    }

    /// Discard everything currently buffered. Returns the number of payloads
    /// removed.
    pub fn drain(&self) -> usize {
        let mut removed = 0;
        while self.rx.try_recv().is_ok() {
            removed += 1;
        }
        removed
    }

    /// Number of payloads currently buffered.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Whether the queue is currently empty.
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// The fixed capacity this queue was created with.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total payloads dropped because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl RelaySender {
    /// Push a payload without blocking.
    ///
    /// Returns `false` when the queue is full and the payload was dropped.
    /// The drop is counted and logged; the caller (the broker delivery path)
    /// must not treat it as a delivery failure.
    pub fn push(&self, payload: Vec<u8>) -> bool {
        match self.tx.try_send(payload) {
            Ok(()) => true,
            Err(flume::TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                metrics::record_relay_drop();
                warn!("Relay queue is full, dropping message");
                false
            }
            Err(flume::TrySendError::Disconnected(_)) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn test_fifo_order() {
        let queue = RelayQueue::new(8);
        let sender = queue.sender();

        for i in 0..3u8 {
            assert!(sender.push(vec![i]));
        }

        for i in 0..3u8 {
            let payload = queue.pop(Duration::from_millis(100)).await.unwrap();
            assert_eq!(payload, vec![i]);
        }
    }

    #[tokio::test]
    async fn test_drop_on_full_keeps_oldest() {
        let queue = RelayQueue::new(3);
        let sender = queue.sender();

        for i in 0..5u8 {
            sender.push(vec![i]);
        }

        assert_eq!(queue.len(), 3);
        assert_eq!(queue.dropped(), 2);

        // The first-accepted payloads survive; the overflow was discarded.
        for i in 0..3u8 {
            let payload = queue.pop(Duration::from_millis(100)).await.unwrap();
            assert_eq!(payload, vec![i]);
        }
    }

    #[test]
    fn test_push_never_blocks_when_full() {
        let queue = RelayQueue::new(1);
        let sender = queue.sender();

        sender.push(b"first".to_vec());
        let started = Instant::now();
        assert!(!sender.push(b"overflow".to_vec()));
        // try_send must return immediately, not wait for a reader.
        assert!(started.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_pop_timeout_fidelity() {
        let queue = RelayQueue::new(4);

        for _ in 0..3 {
            let requested = Duration::from_millis(200);
            let started = Instant::now();
            assert!(queue.pop(requested).await.is_none());
            let elapsed = started.elapsed();
            assert!(elapsed >= requested, "returned early: {:?}", elapsed);
            assert!(
                elapsed < requested + Duration::from_millis(250),
                "overshot timeout: {:?}",
                elapsed
            );
        }
    }

    #[tokio::test]
    async fn test_empty_payload_passes_through() {
        let queue = RelayQueue::new(4);
        queue.sender().push(Vec::new());

        let payload = queue.pop(Duration::from_millis(100)).await.unwrap();
        assert!(payload.is_empty());
    }

    #[tokio::test]
    async fn test_drain_removes_everything() {
        let queue = RelayQueue::new(8);
        let sender = queue.sender();
        for i in 0..5u8 {
            sender.push(vec![i]);
        }

        assert_eq!(queue.drain(), 5);
        assert!(queue.is_empty());
        assert_eq!(queue.drain(), 0);
    }

    #[tokio::test]
    async fn test_capacity_clamped_to_one() {
        let queue = RelayQueue::new(0);
        assert_eq!(queue.capacity(), 1);
        assert!(queue.sender().push(b"x".to_vec()));
        assert!(!queue.sender().push(b"y".to_vec()));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_competing_takers_each_message_delivered_once() {
        let queue = Arc::new(RelayQueue::new(64));
        let sender = queue.sender();

        let mut takers = Vec::new();
        for _ in 0..4 {
            let queue = Arc::clone(&queue);
            takers.push(tokio::spawn(async move {
                let mut got = Vec::new();
                while let Some(payload) = queue.pop(Duration::from_millis(200)).await {
                    got.push(payload);
                }
                got
            }));
        }

        for i in 0..32u8 {
            sender.push(vec![i]);
        }

        let mut all = Vec::new();
        for taker in takers {
            all.extend(taker.await.unwrap());
        }

        // Every payload retrieved exactly once across all takers.
        all.sort();
        let expected: Vec<Vec<u8>> = (0..32u8).map(|i| vec![i]).collect();
        assert_eq!(all, expected);
    }
}
