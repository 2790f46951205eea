//! Error types used by the replyvisor runtime, registry and transports.
//!
//! - [`RegistryError`] configuration errors raised synchronously at registration time.
//! - [`ConfigError`] invalid static configuration, raised by [`ReplierBuilder::build`](crate::ReplierBuilder::build).
//! - [`TransportError`] failures reported by a [`Transport`](crate::Transport) or [`Connection`](crate::Connection).
//! - [`DispatchError`] failures while serving one request (never returned to callers; they drive restarts).
//! - [`RuntimeError`] failures of the blocking [`Replier::run`](crate::Replier::run) helper.
//!
//! Every enum exposes `as_label()` with a short stable snake_case label for logs/metrics.

use thiserror::Error;

/// # Errors raised while registering a reply handler.
///
/// These are configuration errors: they are returned synchronously to the
/// caller and the registry is left unchanged.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// A handler is already registered for this exact subject.
    #[error("subject '{subject}' already has a registered reply handler")]
    DuplicateSubject {
        /// The subject that was registered twice.
        subject: String,
    },

    /// The composed subject is empty.
    #[error("reply subject must not be empty")]
    InvalidSubject,

    /// The registration carried no handler.
    #[error("no handler given for subject '{subject}'")]
    InvalidHandler {
        /// The subject the handler was meant for.
        subject: String,
    },
}

impl RegistryError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use replyvisor::RegistryError;
    ///
    /// let err = RegistryError::DuplicateSubject { subject: "math.add".into() };
    /// assert_eq!(err.as_label(), "registry_duplicate_subject");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RegistryError::DuplicateSubject { .. } => "registry_duplicate_subject",
            RegistryError::InvalidSubject => "registry_invalid_subject",
            RegistryError::InvalidHandler { .. } => "registry_invalid_handler",
        }
    }
}

/// # Errors in the static runtime configuration.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// No bus server address configured.
    #[error("at least one bus server address is required")]
    NoServers,

    /// A configured server address is blank.
    #[error("server address at index {index} is empty")]
    EmptyServer {
        /// Position of the blank entry in `Config::servers`.
        index: usize,
    },
}

impl ConfigError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ConfigError::NoServers => "config_no_servers",
            ConfigError::EmptyServer { .. } => "config_empty_server",
        }
    }
}

/// # Errors reported by the message bus boundary.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The bus refused or could not be reached.
    #[error("bus unreachable at {servers:?}")]
    Unreachable {
        /// Server list used for the attempt.
        servers: Vec<String>,
    },

    /// Connecting failed for another reason.
    #[error("connect failed: {reason}")]
    Connect {
        /// Underlying error message.
        reason: String,
    },

    /// Opening a subscription failed.
    #[error("subscribe to '{subject}' failed: {reason}")]
    Subscribe {
        /// Subject of the subscription.
        subject: String,
        /// Underlying error message.
        reason: String,
    },

    /// Publishing failed.
    #[error("publish to '{subject}' failed: {reason}")]
    Publish {
        /// Destination subject.
        subject: String,
        /// Underlying error message.
        reason: String,
    },

    /// A request could not be sent or its reply could not be read.
    #[error("request on '{subject}' failed: {reason}")]
    Request {
        /// Request subject.
        subject: String,
        /// Underlying error message.
        reason: String,
    },

    /// Nobody is subscribed to the requested subject.
    #[error("no responders on '{subject}'")]
    NoResponders {
        /// Request subject.
        subject: String,
    },

    /// No reply arrived in time.
    #[error("request on '{subject}' timed out")]
    Timeout {
        /// Request subject.
        subject: String,
    },

    /// The connection was already closed.
    #[error("connection closed")]
    Closed,
}

impl TransportError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            TransportError::Unreachable { .. } => "transport_unreachable",
            TransportError::Connect { .. } => "transport_connect",
            TransportError::Subscribe { .. } => "transport_subscribe",
            TransportError::Publish { .. } => "transport_publish",
            TransportError::Request { .. } => "transport_request",
            TransportError::NoResponders { .. } => "transport_no_responders",
            TransportError::Timeout { .. } => "transport_timeout",
            TransportError::Closed => "transport_closed",
        }
    }
}

/// # Errors raised while serving a single request.
///
/// Any of these ends the current listener session and schedules a restart.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum DispatchError {
    /// The handler returned an error.
    #[error("handler for '{subject}' failed: {source:#}")]
    Handler {
        /// Resolved subject of the message.
        subject: String,
        /// Error returned by the handler.
        source: anyhow::Error,
    },

    /// The handler panicked.
    #[error("handler panicked: {message}")]
    Panicked {
        /// Panic payload, when it was a string.
        message: String,
    },

    /// The handler result could not be serialized.
    #[error("cannot encode reply for '{subject}': {source}")]
    Encode {
        /// Resolved subject of the message.
        subject: String,
        /// Serialization error.
        source: serde_json::Error,
    },

    /// The reply could not be published.
    #[error(transparent)]
    Publish(#[from] TransportError),
}

impl DispatchError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            DispatchError::Handler { .. } => "dispatch_handler_failed",
            DispatchError::Panicked { .. } => "dispatch_handler_panicked",
            DispatchError::Encode { .. } => "dispatch_encode_failed",
            DispatchError::Publish(_) => "dispatch_publish_failed",
        }
    }
}

/// # Errors produced by [`Replier::run`](crate::Replier::run).
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// OS signal handlers could not be installed.
    #[error("cannot listen for shutdown signals: {0}")]
    Signal(#[from] std::io::Error),
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::Signal(_) => "runtime_signal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_stable() {
        assert_eq!(RegistryError::InvalidSubject.as_label(), "registry_invalid_subject");
        assert_eq!(ConfigError::NoServers.as_label(), "config_no_servers");
        assert_eq!(TransportError::Closed.as_label(), "transport_closed");
        let err = DispatchError::Panicked { message: "boom".into() };
        assert_eq!(err.as_label(), "dispatch_handler_panicked");
    }

    #[test]
    fn handler_error_shows_source_chain() {
        let source = anyhow::anyhow!("division by zero").context("math.div");
        let err = DispatchError::Handler {
            subject: "math.div".into(),
            source,
        };
        let text = err.to_string();
        assert!(text.contains("math.div"));
        assert!(text.contains("division by zero"));
    }
}
