//! Danube-backed implementation of the broker link.
//!
//! Producer side: Danube producers are bound to a topic, while the boundary
//! names the topic per send, so one client fans out to per-topic producers
//! created on demand at first send.
//!
//! Consumer side: subscription runs a delivery pump task that moves payloads
//! from the client's stream into the relay queue and acknowledges every
//! message. Danube has no broker-side tag selector; the tag filter is applied
//! in the pump over the `"tag"` message attribute, which the producer side
//! sets on tagged sends.

use super::{BrokerLink, ConsumerTransport, ProducerTransport, SendReceipt, SendStatus};
use crate::error::{BridgeError, BridgeResult, LinkError};
use crate::metrics::BridgeMetrics;
use crate::relay::RelaySender;
use crate::LinkConfig;
use async_trait::async_trait;
use danube_client::{DanubeClient, Producer, SubType};
use danube_core::message::StreamMessage;
use std::collections::HashMap;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Attribute key carrying the message tag across the broker.
pub(crate) const TAG_ATTRIBUTE: &str = "tag";

/// Factory for Danube-backed transports.
#[derive(Debug, Clone, Copy, Default)]
pub struct DanubeLink;

async fn connect(broker_url: &str) -> Result<DanubeClient, LinkError> {
    info!("Creating Danube client: url={}", broker_url);
    DanubeClient::builder()
        .service_url(broker_url)
        .build()
        .await
        .map_err(|e| LinkError::construct_with_source("Failed to create Danube client", e))
}

#[async_trait]
impl BrokerLink for DanubeLink {
    async fn open_producer(
        &self,
        config: &LinkConfig,
    ) -> Result<Box<dyn ProducerTransport>, LinkError> {
        let client = connect(&config.broker_url).await?;
        info!("Danube producer client ready: group={}", config.group);
        Ok(Box::new(DanubeProducer {
            client,
            group: config.group.clone(),
            producers: HashMap::new(),
        }))
    }

    async fn open_consumer(
        &self,
        config: &LinkConfig,
        relay: RelaySender,
    ) -> Result<Box<dyn ConsumerTransport>, LinkError> {
        let client = connect(&config.broker_url).await?;

        info!(
            "Subscribing: topic={}, group={}, tag={:?}",
            config.topic, config.group, config.tag
        );
        let mut consumer = client
            .new_consumer()
            .with_topic(&config.topic)
            .with_consumer_name(&config.group)
            .with_subscription(&config.group)
            .with_subscription_type(SubType::Shared)
            .build();

        consumer
            .subscribe()
            .await
            .map_err(|e| LinkError::subscribe_with_source("Failed to subscribe to topic", e))?;

        let mut stream = consumer
            .receive()
            .await
            .map_err(|e| LinkError::start_with_source("Failed to start message stream", e))?;
        info!("Consumer message stream started");

        let cancel = CancellationToken::new();
        let pump = tokio::spawn({
            let cancel = cancel.clone();
            let tag_filter = config.tag.clone();
            let metrics = BridgeMetrics::new("consumer");
            async move {
                loop {
                    let message: StreamMessage = tokio::select! {
                        _ = cancel.cancelled() => break,
                        received = stream.recv() => match received {
                            Some(message) => message,
                            None => {
                                debug!("Broker message stream closed");
                                break;
                            }
                        },
                    };

                    metrics.record_received();

                    let tag = message
                        .attributes
                        .get(TAG_ATTRIBUTE)
                        .map(String::as_str)
                        .unwrap_or_default();
                    if !tag_filter.is_empty() && tag != tag_filter {
                        metrics.record_filtered();
                    } else if relay.push(message.payload.clone()) {
                        metrics.record_relayed();
                    }

                    // Acknowledge unconditionally: a relay drop is a local
                    // backpressure decision, not a delivery failure.
                    if let Err(e) = consumer.ack(&message).await {
                        error!("Failed to acknowledge message: {}", e);
                    }
                }
                debug!("Consumer delivery pump stopped");
            }
        });

        Ok(Box::new(DanubeConsumer {
            _client: client,
            cancel,
            pump: Some(pump),
        }))
    }
}

/// Producer transport multiplexing per-topic Danube producers over one client.
pub struct DanubeProducer {
    client: DanubeClient,
    group: String,
    producers: HashMap<String, Producer>,
}

impl DanubeProducer {
    async fn producer_for(&mut self, topic: &str) -> BridgeResult<&mut Producer> {
        if !self.producers.contains_key(topic) {
            let producer_name = format!("{}-{}", self.group, topic.replace('/', "-"));
            info!("Creating producer for topic: {}", topic);

            let mut producer = self
                .client
                .new_producer()
                .with_topic(topic)
                .with_name(&producer_name)
                .build();
            producer.create().await.map_err(|e| {
                BridgeError::transport_with_source(
                    format!("Failed to create producer for topic {}", topic),
                    e,
                )
            })?;

            self.producers.insert(topic.to_string(), producer);
        }

        self.producers
            .get_mut(topic)
            .ok_or_else(|| BridgeError::transport("producer table out of sync"))
    }
}

#[async_trait]
impl ProducerTransport for DanubeProducer {
    async fn send(&mut self, topic: &str, tag: &str, body: &[u8]) -> BridgeResult<SendReceipt> {
        let payload = body.to_vec();
        let attributes = if tag.is_empty() {
            None
        } else {
            let mut attributes = HashMap::new();
            attributes.insert(TAG_ATTRIBUTE.to_string(), tag.to_string());
            Some(attributes)
        };

        let producer = self.producer_for(topic).await?;
        let message_id = producer
            .send(payload, attributes)
            .await
            .map_err(|e| BridgeError::transport_with_source("Failed to send message", e))?;
        debug!("Message sent: topic={}, id={}", topic, message_id);

        // danube-client reports acceptance through Ok; there is no separate
        // logical status to map to SendStatus::Other here.
        Ok(SendReceipt {
            message_id: message_id.to_string(),
            status: SendStatus::Ok,
        })
    }

    async fn shutdown(&mut self) -> BridgeResult<()> {
        debug!("Dropping {} topic producer(s)", self.producers.len());
        self.producers.clear();
        Ok(())
    }
}

/// Consumer transport owning the delivery pump.
pub struct DanubeConsumer {
    /// Keeps the broker connection alive for as long as the pump runs.
    _client: DanubeClient,
    cancel: CancellationToken,
    pump: Option<JoinHandle<()>>,
}

#[async_trait]
impl ConsumerTransport for DanubeConsumer {
    async fn shutdown(&mut self) -> BridgeResult<()> {
        self.cancel.cancel();
        if let Some(pump) = self.pump.take() {
            if let Err(e) = pump.await {
                return Err(BridgeError::shutdown_with_source(
                    "Delivery pump did not stop cleanly",
                    e,
                ));
            }
        }
        Ok(())
    }
}
