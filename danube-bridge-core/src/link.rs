//! Seam between the role state machines and the broker client.
//!
//! The state machines never talk to `danube-client` directly; they drive
//! these traits. The production implementation is [`danube::DanubeLink`];
//! tests substitute a fake broker so lifecycle behavior is exercised without
//! a network.

use crate::error::{BridgeResult, LinkError};
use crate::relay::RelaySender;
use crate::LinkConfig;
use async_trait::async_trait;

pub mod danube;

/// Broker-assigned result of a synchronous send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendReceipt {
    /// Identifier the broker assigned to the stored message.
    pub message_id: String,
    /// Whether the broker accepted the message.
    pub status: SendStatus,
}

/// Logical send status distinct from transport failure: the call succeeded
/// but the broker may still have refused the message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendStatus {
    /// The broker stored the message.
    Ok,
    /// The broker answered with a non-OK status.
    Other(String),
}

/// A started producer-side broker client.
#[async_trait]
pub trait ProducerTransport: Send {
    /// Synchronously send one message and wait for the broker's answer.
    ///
    /// `tag` may be empty, meaning untagged. Transport failures surface as
    /// `Err`; a logical broker refusal surfaces as a receipt with a non-OK
    /// status.
    async fn send(&mut self, topic: &str, tag: &str, body: &[u8]) -> BridgeResult<SendReceipt>;

    /// Stop the client. On error the transport stays usable for a retry.
    async fn shutdown(&mut self) -> BridgeResult<()>;
}

/// A started consumer-side broker client. Delivery happens out-of-band into
/// the relay queue; the transport itself only manages lifecycle.
#[async_trait]
pub trait ConsumerTransport: Send {
    /// Stop the client and its delivery pump. On error the transport stays
    /// usable for a retry.
    async fn shutdown(&mut self) -> BridgeResult<()>;
}

/// Factory opening started transports against a broker.
///
/// Each open is all-or-nothing: a handle is returned only after the full
/// construct/subscribe/start sequence succeeded, so a partial failure can
/// never leak a half-started client into a role state.
#[async_trait]
pub trait BrokerLink: Send + Sync {
    /// Build and start a producer-side client.
    async fn open_producer(
        &self,
        config: &LinkConfig,
    ) -> Result<Box<dyn ProducerTransport>, LinkError>;

    /// Build, subscribe and start a consumer-side client whose delivery pump
    /// pushes payloads into `relay`. Every delivered message is acknowledged
    /// to the broker regardless of whether the relay accepted it.
    async fn open_consumer(
        &self,
        config: &LinkConfig,
        relay: RelaySender,
    ) -> Result<Box<dyn ConsumerTransport>, LinkError>;
}
