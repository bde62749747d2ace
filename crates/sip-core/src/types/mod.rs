//! Structured SIP message fields
//!
//! The start line and the header mapping produced by the decoder.

pub mod headers;
pub mod method;
pub mod status;
pub mod version;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use headers::{canonical_header_name, Headers};
pub use method::Method;
pub use status::StatusCode;
pub use version::Version;

/// The first line of a SIP message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StartLine {
    /// `METHOD target SIP/2.0`
    Request {
        method: Method,
        target: String,
        version: Version,
    },
    /// `SIP/2.0 200 OK`
    Response {
        version: Version,
        status: StatusCode,
        reason: String,
    },
}

impl StartLine {
    /// Protocol version carried by either kind of start line
    pub fn version(&self) -> Version {
        match self {
            StartLine::Request { version, .. } | StartLine::Response { version, .. } => *version,
        }
    }

    pub fn is_request(&self) -> bool {
        matches!(self, StartLine::Request { .. })
    }

    pub fn method(&self) -> Option<&Method> {
        match self {
            StartLine::Request { method, .. } => Some(method),
            StartLine::Response { .. } => None,
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            StartLine::Response { status, .. } => Some(*status),
            StartLine::Request { .. } => None,
        }
    }
}

impl fmt::Display for StartLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartLine::Request {
                method,
                target,
                version,
            } => write!(f, "{} {} {}", method, target, version),
            StartLine::Response {
                version,
                status,
                reason,
            } if reason.is_empty() => write!(f, "{} {}", version, status),
            StartLine::Response {
                version,
                status,
                reason,
            } => write!(f, "{} {} {}", version, status, reason),
        }
    }
}
