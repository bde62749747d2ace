//! # sigflow sip-core
//!
//! Decoding of SIP datagrams that carry an embedded SDP body.
//!
//! A raw datagram has no length prefix separating its two documents. Decoding
//! happens in two steps:
//!
//! 1. [`framing::split_frame`] separates the header segment from the
//!    session-description segment, using the `Content-Length` line as the
//!    boundary.
//! 2. [`parser::parse_header_segment`] and [`sdp::parse_session_description`]
//!    decode each segment. [`Message::decode`] runs both and only yields a
//!    message when both succeed.
//!
//! Each message also carries a call-detail handle ([`cdr`]) that pipeline
//! steps fill in and submit for billing.

pub mod cdr;
pub mod error;
pub mod framing;
pub mod message;
pub mod parser;
pub mod sdp;
pub mod types;

pub use cdr::{
    BillingEndpoint, CallDetailRecord, CallDetailReporter, CallDetailSender, CdrError,
    HttpCallDetail,
};
pub use error::{DecodeError, Result};
pub use framing::{split_frame, FrameSegments};
pub use message::Message;
pub use sdp::SessionDescription;
pub use types::{Headers, Method, StartLine, StatusCode, Version};

/// Re-export of common types for easier use
pub mod prelude {
    pub use crate::{
        CallDetailReporter, CallDetailSender, DecodeError, Headers, Message, Method,
        SessionDescription, StartLine, StatusCode,
    };
}
