//! Error types for sip-core
//!
//! Every failure produced while turning a raw datagram into a [`Message`](crate::Message)
//! is a [`DecodeError`]. A decode error always means the datagram is dropped; no
//! partially populated message is ever handed out.

use thiserror::Error;

/// A specialized `Result` type for decoding operations.
pub type Result<T> = std::result::Result<T, DecodeError>;

/// Errors raised while decoding the header/body or session-description segment
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The header/body segment contained no lines at all
    #[error("Empty message: no start line found")]
    EmptyMessage,

    /// The segment was not valid UTF-8
    #[error("Invalid UTF-8 in {segment} segment: {reason}")]
    InvalidUtf8 {
        segment: &'static str,
        reason: String,
    },

    /// The first line was neither a request line nor a status line
    #[error("Malformed start line: {0}")]
    MalformedStartLine(String),

    /// The protocol version was not `SIP/<major>.<minor>`
    #[error("Invalid SIP version: {0}")]
    InvalidVersion(String),

    /// The status code was not a three digit number in 100..=699
    #[error("Invalid status code: {0}")]
    InvalidStatusCode(String),

    /// A header line had no colon, an empty name, or a continuation with nothing to continue
    #[error("Malformed header: {0}")]
    MalformedHeader(String),

    /// The session-description segment could not be parsed
    #[error("Malformed session description at line {line}: {reason}")]
    MalformedSdp { line: usize, reason: String },
}

impl DecodeError {
    pub(crate) fn sdp(line: usize, reason: impl Into<String>) -> Self {
        DecodeError::MalformedSdp {
            line,
            reason: reason.into(),
        }
    }

    /// Returns true if the failure came from the session-description segment
    pub fn is_sdp_error(&self) -> bool {
        matches!(self, DecodeError::MalformedSdp { .. })
            || matches!(self, DecodeError::InvalidUtf8 { segment, .. } if *segment == "session")
    }
}
