//! Error taxonomy and boundary result codes.
//!
//! Nothing here crosses the foreign boundary as a panic or an unwind: every
//! failure is reported either as a [`BridgeError`] inside the crate or as one
//! of the flat numeric codes ([`InitCode`], [`ShutdownCode`]) at the edge.

use thiserror::Error;

/// Result type used throughout the bridge core.
pub type BridgeResult<T> = Result<T, BridgeError>;

type Source = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors reported by broker transports and configuration loading.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Configuration problem (missing file, bad value, empty required field).
    #[error("Configuration error: {0}")]
    Config(String),

    /// The broker client reported a transport or protocol failure.
    #[error("{message}")]
    Transport {
        message: String,
        #[source]
        source: Option<Source>,
    },

    /// The broker client failed to stop cleanly.
    #[error("{message}")]
    Shutdown {
        message: String,
        #[source]
        source: Option<Source>,
    },
}

impl BridgeError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a transport error without an underlying source
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            source: None,
        }
    }

    /// Create a transport error wrapping the broker client's own error
    pub fn transport_with_source(message: impl Into<String>, source: impl Into<Source>) -> Self {
        Self::Transport {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Create a shutdown error
    pub fn shutdown(message: impl Into<String>) -> Self {
        Self::Shutdown {
            message: message.into(),
            source: None,
        }
    }

    /// Create a shutdown error wrapping the broker client's own error
    pub fn shutdown_with_source(message: impl Into<String>, source: impl Into<Source>) -> Self {
        Self::Shutdown {
            message: message.into(),
            source: Some(source.into()),
        }
    }
}

/// Setup failure reported while opening a broker transport.
///
/// The phase matters to the caller: a construction failure points at
/// configuration, a start failure at connectivity, a subscribe failure at the
/// topic/subscription pair. Each maps to its own [`InitCode`].
#[derive(Debug, Error)]
pub enum LinkError {
    /// Building the broker client failed.
    #[error("Create client failed: {message}")]
    Construct {
        message: String,
        #[source]
        source: Option<Source>,
    },

    /// The client was built but could not be started.
    #[error("Start failed: {message}")]
    Start {
        message: String,
        #[source]
        source: Option<Source>,
    },

    /// Subscribing to the topic failed (consumer only).
    #[error("Subscribe failed: {message}")]
    Subscribe {
        message: String,
        #[source]
        source: Option<Source>,
    },
}

impl LinkError {
    /// Create a construction-phase error
    pub fn construct(message: impl Into<String>) -> Self {
        Self::Construct {
            message: message.into(),
            source: None,
        }
    }

    /// Create a construction-phase error with the client's own error attached
    pub fn construct_with_source(message: impl Into<String>, source: impl Into<Source>) -> Self {
        Self::Construct {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Create a start-phase error
    pub fn start(message: impl Into<String>) -> Self {
        Self::Start {
            message: message.into(),
            source: None,
        }
    }

    /// Create a start-phase error with the client's own error attached
    pub fn start_with_source(message: impl Into<String>, source: impl Into<Source>) -> Self {
        Self::Start {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Create a subscribe-phase error
    pub fn subscribe(message: impl Into<String>) -> Self {
        Self::Subscribe {
            message: message.into(),
            source: None,
        }
    }

    /// Create a subscribe-phase error with the client's own error attached
    pub fn subscribe_with_source(message: impl Into<String>, source: impl Into<Source>) -> Self {
        Self::Subscribe {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// The boundary code this failure surfaces as.
    pub fn init_code(&self) -> InitCode {
        match self {
            Self::Construct { .. } => InitCode::ConstructFailed,
            Self::Start { .. } => InitCode::StartFailed,
            Self::Subscribe { .. } => InitCode::SubscribeFailed,
        }
    }

    /// Short phase label for logs and metrics.
    pub fn phase(&self) -> &'static str {
        match self {
            Self::Construct { .. } => "construct",
            Self::Start { .. } => "start",
            Self::Subscribe { .. } => "subscribe",
        }
    }
}

/// Flat result code returned by the initialization entry points.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitCode {
    /// The role reached Running.
    Ok = 0,
    /// The role was already Running; nothing was changed.
    AlreadyRunning = 1,
    /// Building the broker client failed.
    ConstructFailed = -1,
    /// The client was built but could not be started.
    StartFailed = -2,
    /// Subscribing to the topic failed (consumer only).
    SubscribeFailed = -3,
    /// A required parameter was null or empty.
    InvalidParams = -4,
}

impl From<InitCode> for i32 {
    fn from(code: InitCode) -> Self {
        code as i32
    }
}

/// Flat result code returned by the shutdown entry points.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownCode {
    /// The role returned to Idle.
    Ok = 0,
    /// The role was not running; nothing was changed.
    NotRunning = 1,
    /// The broker client failed to stop, or the state was corrupted.
    Failed = -1,
}

impl From<ShutdownCode> for i32 {
    fn from(code: ShutdownCode) -> Self {
        code as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_code_values() {
        assert_eq!(i32::from(InitCode::Ok), 0);
        assert_eq!(i32::from(InitCode::AlreadyRunning), 1);
        assert_eq!(i32::from(InitCode::ConstructFailed), -1);
        assert_eq!(i32::from(InitCode::StartFailed), -2);
        assert_eq!(i32::from(InitCode::SubscribeFailed), -3);
        assert_eq!(i32::from(InitCode::InvalidParams), -4);
    }

    #[test]
    fn test_shutdown_code_values() {
        assert_eq!(i32::from(ShutdownCode::Ok), 0);
        assert_eq!(i32::from(ShutdownCode::NotRunning), 1);
        assert_eq!(i32::from(ShutdownCode::Failed), -1);
    }

    #[test]
    fn test_link_error_phases_map_to_distinct_codes() {
        let construct = LinkError::construct("no route to broker");
        let start = LinkError::start("stream refused");
        let subscribe = LinkError::subscribe("unknown topic");

        assert_eq!(construct.init_code(), InitCode::ConstructFailed);
        assert_eq!(start.init_code(), InitCode::StartFailed);
        assert_eq!(subscribe.init_code(), InitCode::SubscribeFailed);
        assert_ne!(construct.phase(), start.phase());
        assert_ne!(start.phase(), subscribe.phase());
    }

    #[test]
    fn test_error_display_carries_phase() {
        let err = LinkError::construct("dns lookup failed");
        assert_eq!(err.to_string(), "Create client failed: dns lookup failed");

        let err = LinkError::subscribe("topic missing");
        assert_eq!(err.to_string(), "Subscribe failed: topic missing");
    }
}
