//! Engine errors and the message termination signal

use std::fmt;
use std::io;
use std::net::SocketAddr;

use sigflow_sip_core::DecodeError;
use thiserror::Error;

/// Errors produced by the engine, either returned or pushed on the error channel
#[derive(Error, Debug)]
pub enum EngineError {
    /// A datagram could not be decoded; it is dropped and no pipeline runs
    #[error("Failed to decode datagram from {}: {error}", peer_display(.peer))]
    Decode {
        peer: Option<SocketAddr>,
        #[source]
        error: DecodeError,
    },

    /// A step failed without terminating the pipeline
    #[error("Step {index} ({name}) failed: {source:#}")]
    Step {
        index: usize,
        name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Transport error: {0}")]
    Transport(#[source] io::Error),

    #[error("Failed to bind {address}: {error}")]
    Bind {
        address: String,
        #[source]
        error: io::Error,
    },

    #[error("Engine is already serving")]
    AlreadyServing,

    /// Returned by `listen_and_serve` when the root token is cancelled
    #[error("Engine shutdown signalled")]
    ShutdownSignalled,

    #[error("{0} channel closed")]
    ChannelClosed(&'static str),
}

impl EngineError {
    pub fn is_shutdown(&self) -> bool {
        matches!(self, EngineError::ShutdownSignalled)
    }
}

fn peer_display(peer: &Option<SocketAddr>) -> String {
    match peer {
        Some(peer) => peer.to_string(),
        None => "unknown peer".to_string(),
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

/// Returned by a step to stop processing of the current message.
///
/// This is not a failure: nothing is reported on the error channel. Steps may
/// wrap it with `anyhow` context; it is found anywhere in the error chain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageTermination {
    reason: Option<String>,
}

impl MessageTermination {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn because(reason: impl Into<String>) -> Self {
        Self {
            reason: Some(reason.into()),
        }
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }
}

impl fmt::Display for MessageTermination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            Some(reason) => write!(f, "message processing terminated: {}", reason),
            None => f.write_str("message processing terminated"),
        }
    }
}

impl std::error::Error for MessageTermination {}

/// Whether a step error is a termination signal rather than a failure
pub fn is_message_termination(error: &anyhow::Error) -> bool {
    error
        .chain()
        .any(|cause| cause.is::<MessageTermination>())
}
