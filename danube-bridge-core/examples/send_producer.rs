//! Minimal producer run against a live Danube broker.
//!
//! Usage:
//!   DANUBE_SERVICE_URL=http://localhost:6650 \
//!   BRIDGE_TOPIC=/default/tasks \
//!   BRIDGE_GROUP=task_group \
//!   cargo run --example send_producer

use danube_bridge_core::{DanubeLink, InitCode, ProducerState, SendOutcome};
use std::env;

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

    let producer = ProducerState::new();
    let code = producer.initialize(&DanubeLink, &broker_url, &group).await;
    if code != InitCode::Ok {
        anyhow::bail!(
            "producer initialization failed: {:?} ({})",
            code,
            producer.last_error().await.unwrap_or_default()
        );
    }

    for i in 0..10 {
        let body = format!("Test message #{}", i);
        match producer.send(&topic, "", body.as_bytes()).await {
            SendOutcome::Sent { message_id } => println!("sent #{}: MsgID={}", i, message_id),
            other => println!("send #{} did not complete: {:?}", i, other),
        }
    }

    producer.shutdown().await;
    Ok(())
}
