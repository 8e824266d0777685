//! # Danube Bridge FFI
//!
//! The exported C ABI over `danube-bridge-core`. A foreign host (Python via
//! ctypes, C# via P/Invoke, C/C++ directly) loads this library and drives one
//! producer and one consumer without linking any broker client itself.
//!
//! ## Boundary contract
//!
//! - Every entry point may be called from any thread, concurrently. Role
//!   state is guarded internally; producer and consumer lifecycles are fully
//!   independent.
//! - Initialization is idempotent: while a role is running, further
//!   initialization calls return `1` and change nothing.
//! - String results are freshly allocated on every call and owned by the
//!   caller. Each non-null returned pointer must be passed to [`FreeString`]
//!   exactly once, including the `"TIMEOUT"` / `"EMPTY_MESSAGE"` / error
//!   sentinels.
//! - `GetNextMessage` is the only blocking call; it waits on the in-process
//!   relay queue, never on the broker, and always returns once its timeout
//!   elapses. A non-positive timeout selects the configured default (10 s).
//!
//! ## Runtime
//!
//! A process-wide tokio runtime backs the async broker client. Two worker
//! threads are enough for the client's I/O without over-subscribing the host
//! process. The runtime, the role states and the relay queue are created
//! lazily on the first call into the library and live until process exit.

mod marshal;

use danube_bridge_core::{
    BridgeSettings, ConsumerState, DanubeLink, InitCode, PollOutcome, ProducerState, SendOutcome,
};
use marshal::{owned_str, payload_string, ret_string};
use once_cell::sync::Lazy;
use std::os::raw::{c_char, c_int};
use std::time::Duration;
use tokio::runtime::Runtime;
use tracing::{error, info, warn};

struct Bridge {
    runtime: Runtime,
    producer: ProducerState,
    consumer: ConsumerState,
}

static BRIDGE: Lazy<Bridge> = Lazy::new(|| {
    let (settings, load_error) = match BridgeSettings::load() {
        Ok(settings) => (settings, None),
        Err(e) => (BridgeSettings::default(), Some(e)),
    };

    init_telemetry(&settings);
    if let Some(e) = load_error {
        warn!("Falling back to default settings: {}", e);
    }
    info!(
        "Danube bridge ready: relay capacity {}, default poll timeout {} ms",
        settings.relay_capacity, settings.default_poll_timeout_ms
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .worker_threads(2)
        .thread_name("danube-bridge")
        .build()
        .expect("Failed to create tokio runtime");

    Bridge {
        runtime,
        producer: ProducerState::new(),
        consumer: ConsumerState::new(&settings),
    }
});

fn bridge() -> &'static Bridge {
    &BRIDGE
}

/// Install the tracing subscriber once for the whole process. `try_init`
/// keeps this safe when the host embeds other tracing-enabled libraries.
fn init_telemetry(settings: &BridgeSettings) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&settings.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .ok();
}

const PRODUCER_NOT_INITIALIZED: &str = "Error: Producer not initialized";
const CONSUMER_NOT_INITIALIZED: &str = "Error: Consumer not initialized";

/// Marshal a send outcome into one of the documented string shapes. The
/// shapes are prefix-disjoint so the caller can branch on `Success: ` /
/// `Error: ` without parsing.
fn send_result(outcome: SendOutcome) -> *mut c_char {
    match outcome {
        SendOutcome::Sent { message_id } => ret_string(format!("Success: MsgID={}", message_id)),
        SendOutcome::Rejected { status } => {
            ret_string(format!("Error: Send failed with status {}", status))
        }
        SendOutcome::Failed { reason } => ret_string(format!("Error: {}", reason)),
        SendOutcome::InvalidParams => ret_string("Error: Topic or message body cannot be empty"),
        SendOutcome::NotRunning => ret_string(PRODUCER_NOT_INITIALIZED),
    }
}

/// Marshal a poll outcome. The payload case never collides with the
/// sentinels: an empty body is reported as `EMPTY_MESSAGE`, absence of a
/// message as `TIMEOUT`.
fn poll_result(outcome: PollOutcome) -> *mut c_char {
    match outcome {
        PollOutcome::Payload(payload) => payload_string(payload),
        PollOutcome::Empty => ret_string("EMPTY_MESSAGE"),
        PollOutcome::TimedOut => ret_string("TIMEOUT"),
        PollOutcome::NotRunning => ret_string(CONSUMER_NOT_INITIALIZED),
    }
}

/// Build and start the producer.
///
/// Returns `0` on success, `1` if already running, `-1` if the broker client
/// could not be constructed, `-2` if it could not be started, `-4` for null
/// or empty parameters.
///
/// # Safety
///
/// `broker_url` and `group` must be NULL or valid NUL-terminated strings for
/// the duration of the call.
#[allow(non_snake_case)]
#[no_mangle]
pub unsafe extern "C" fn InitializeProducer(
    broker_url: *const c_char,
    group: *const c_char,
) -> c_int {
    let bridge = bridge();

    let (Some(broker_url), Some(group)) =
        (unsafe { owned_str(broker_url) }, unsafe { owned_str(group) })
    else {
        error!("InitializeProducer called with NULL parameters");
        return InitCode::InvalidParams.into();
    };

    bridge
        .runtime
        .block_on(bridge.producer.initialize(&DanubeLink, &broker_url, &group))
        .into()
}

/// Build, subscribe and start the consumer.
///
/// `tag` may be an empty string, meaning no tag filtering. Returns the same
/// codes as [`InitializeProducer`] plus `-3` when subscribing failed.
///
/// # Safety
///
/// All four pointers must be NULL or valid NUL-terminated strings for the
/// duration of the call.
#[allow(non_snake_case)]
#[no_mangle]
pub unsafe extern "C" fn InitializeConsumer(
    broker_url: *const c_char,
    topic: *const c_char,
    group: *const c_char,
    tag: *const c_char,
) -> c_int {
    let bridge = bridge();

    let (Some(broker_url), Some(topic), Some(group), Some(tag)) = (
        unsafe { owned_str(broker_url) },
        unsafe { owned_str(topic) },
        unsafe { owned_str(group) },
        unsafe { owned_str(tag) },
    ) else {
        error!("InitializeConsumer called with NULL parameters");
        return InitCode::InvalidParams.into();
    };

    bridge
        .runtime
        .block_on(
            bridge
                .consumer
                .initialize(&DanubeLink, &broker_url, &topic, &group, &tag),
        )
        .into()
}

/// Send one message and wait for the broker's answer.
///
/// The result string is `"Success: MsgID=<id>"`, or `"Error: <reason>"` on
/// any failure. `tag` may be NULL or empty, meaning untagged. The returned
/// pointer must be released with [`FreeString`].
///
/// # Safety
///
/// `topic`, `tag` and `body` must be NULL or valid NUL-terminated strings for
/// the duration of the call.
#[allow(non_snake_case)]
#[no_mangle]
pub unsafe extern "C" fn SendMessage(
    topic: *const c_char,
    tag: *const c_char,
    body: *const c_char,
) -> *mut c_char {
    let bridge = bridge();

    if !bridge.runtime.block_on(bridge.producer.is_running()) {
        return ret_string(PRODUCER_NOT_INITIALIZED);
    }

    let (Some(topic), Some(body)) = (unsafe { owned_str(topic) }, unsafe { owned_str(body) })
    else {
        error!("SendMessage called with NULL topic or body");
        return ret_string("Error: Topic or message body cannot be NULL");
    };
    let tag = unsafe { owned_str(tag) }.unwrap_or_default();

    send_result(
        bridge
            .runtime
            .block_on(bridge.producer.send(&topic, &tag, body.as_bytes())),
    )
}

/// Wait up to `timeout_ms` for the next relayed message.
///
/// Returns the payload, `"EMPTY_MESSAGE"` for a zero-length body, `"TIMEOUT"`
/// when nothing arrived, or `"Error: Consumer not initialized"`. A timeout
/// of zero or less selects the configured default. The returned pointer must
/// be released with [`FreeString`].
#[allow(non_snake_case)]
#[no_mangle]
pub extern "C" fn GetNextMessage(timeout_ms: c_int) -> *mut c_char {
    let bridge = bridge();

    let timeout = (timeout_ms > 0).then(|| Duration::from_millis(timeout_ms as u64));

    poll_result(
        bridge
            .runtime
            .block_on(bridge.consumer.next_message(timeout)),
    )
}

/// Stop the producer. Returns `0` on success, `1` if it was not running,
/// `-1` when the broker client failed to stop.
#[allow(non_snake_case)]
#[no_mangle]
pub extern "C" fn ShutdownProducer() -> c_int {
    let bridge = bridge();
    bridge.runtime.block_on(bridge.producer.shutdown()).into()
}

/// Stop the consumer and drain the relay queue. Returns `0` on success, `1`
/// if it was not running, `-1` when the broker client failed to stop.
#[allow(non_snake_case)]
#[no_mangle]
pub extern "C" fn ShutdownConsumer() -> c_int {
    let bridge = bridge();
    bridge.runtime.block_on(bridge.consumer.shutdown()).into()
}

/// Release a string previously returned by this library.
///
/// Every non-null pointer returned by [`SendMessage`] or [`GetNextMessage`]
/// must be passed here exactly once. NULL is accepted and ignored.
///
/// # Safety
///
/// `ptr` must be NULL or a pointer returned by this library that has not been
/// freed before.
#[allow(non_snake_case)]
#[no_mangle]
pub unsafe extern "C" fn FreeString(ptr: *mut c_char) {
    unsafe { marshal::release(ptr) }
}
