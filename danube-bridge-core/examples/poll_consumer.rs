//! Minimal consumer poll loop against a live Danube broker.
//!
//! Usage:
//!   DANUBE_SERVICE_URL=http://localhost:6650 \
//!   BRIDGE_TOPIC=/default/tasks \
//!   BRIDGE_GROUP=task_group \
//!   cargo run --example poll_consumer

use danube_bridge_core::{BridgeSettings, ConsumerState, DanubeLink, InitCode, PollOutcome};
use std::env;
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let broker_url =
        env::var("DANUBE_SERVICE_URL").unwrap_or_else(|_| "http://localhost:6650".to_string());
    let topic = env::var("BRIDGE_TOPIC").unwrap_or_else(|_| "/default/tasks".to_string());
    let group = env::var("BRIDGE_GROUP").unwrap_or_else(|_| "task_group".to_string());
    let tag = env::var("BRIDGE_TAG").unwrap_or_default();

    let consumer = ConsumerState::new(&BridgeSettings::load()?);
    let code = consumer
        .initialize(&DanubeLink, &broker_url, &topic, &group, &tag)
        .await;
    if code != InitCode::Ok {
        anyhow::bail!(
            "consumer initialization failed: {:?} ({})",
            code,
            consumer.last_error().await.unwrap_or_default()
        );
    }

    for _ in 0..30 {
        match consumer.next_message(Some(Duration::from_secs(5))).await {
            PollOutcome::Payload(bytes) => {
                println!("received: {}", String::from_utf8_lossy(&bytes))
            }
            PollOutcome::Empty => println!("received an empty message body"),
            PollOutcome::TimedOut => println!("no message within 5s"),
            PollOutcome::NotRunning => break,
        }
    }

    println!(
        "dropped by relay backpressure: {}",
        consumer.relay().dropped()
    );
    consumer.shutdown().await;
    Ok(())
}
