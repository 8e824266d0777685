//! # Danube Bridge Core
//!
//! Lifecycle core for embedding a Danube producer and consumer behind a flat,
//! foreign-callable boundary.
//!
//! A host process written in another language (Python, C#, C++) drives the
//! broker through a handful of synchronous entry points; this crate provides
//! everything behind that edge:
//!
//! - **Role states** ([`ProducerState`], [`ConsumerState`]): singleton
//!   lifecycle holders guarding the broker client handle, the running flag
//!   and the last failure description behind a single lock each.
//! - **Relay queue** ([`RelayQueue`]): a bounded FIFO decoupling the broker's
//!   asynchronous delivery from the host's blocking poll calls, with a
//!   drop-on-full backpressure policy.
//! - **Broker link** ([`BrokerLink`]): the seam to the `danube-client` crate,
//!   kept behind traits so tests run against a fake broker.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use danube_bridge_core::{ConsumerState, BridgeSettings, DanubeLink, PollOutcome};
//!
//! # async fn run() {
//! let consumer = ConsumerState::new(&BridgeSettings::default());
//! consumer
//!     .initialize(&DanubeLink, "http://localhost:6650", "/default/tasks", "task_group", "")
//!     .await;
//! match consumer.next_message(None).await {
//!     PollOutcome::Payload(bytes) => println!("got {} bytes", bytes.len()),
//!     PollOutcome::Empty => println!("empty message body"),
//!     PollOutcome::TimedOut => println!("nothing within the timeout"),
//!     PollOutcome::NotRunning => println!("consumer not initialized"),
//! }
//! # }
//! ```
//!
//! The C ABI itself (pointer marshalling, string ownership, the exported
//! symbols) lives in the companion `danube-bridge-ffi` crate; nothing in this
//! crate touches raw pointers.

mod config;
mod consumer;
mod error;
mod link;
mod metrics;
mod producer;
mod relay;

// Re-export public API
pub use config::{BridgeSettings, LinkConfig};
pub use consumer::{ConsumerState, PollOutcome};
pub use error::{BridgeError, BridgeResult, InitCode, LinkError, ShutdownCode};
pub use link::danube::DanubeLink;
pub use link::{BrokerLink, ConsumerTransport, ProducerTransport, SendReceipt, SendStatus};
pub use metrics::BridgeMetrics;
pub use producer::{ProducerState, SendOutcome};
pub use relay::{RelayQueue, RelaySender};

// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
