//! The decoded unit flowing through the pipeline
//!
//! A [`Message`] is created atomically from one datagram: the raw bytes are
//! split by [`split_frame`], the header segment is decoded into a start line
//! and header map, the session segment into an optional
//! [`SessionDescription`], and a default call-detail handle is attached. If
//! either decode fails no message is produced.
//!
//! ```rust
//! use sigflow_sip_core::Message;
//!
//! let raw = "INVITE sip:bob@example.com SIP/2.0\r\n\
//! From: alice\r\n\
//! To: bob\r\n\
//! Call-ID: 1234@example.com\r\n\
//! Content-Length: 54\r\n\
//! \r\n\
//! v=0\r\n\
//! c=IN IP4 192.0.2.1\r\n\
//! m=audio 49170 RTP/AVP 0\r\n";
//!
//! let message = Message::decode(raw.as_bytes().to_vec()).unwrap();
//! assert_eq!(message.headers.get("From").unwrap(), &["alice".to_string()]);
//! assert_eq!(message.session_description.unwrap().media.len(), 1);
//! ```

use std::net::SocketAddr;

use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::cdr::{CallDetailSender, HttpCallDetail};
use crate::error::Result;
use crate::framing::split_frame;
use crate::parser::parse_header_segment;
use crate::sdp::{parse_session_description, SessionDescription};
use crate::types::{Headers, Method, StartLine, StatusCode};

/// A decoded SIP message with its session description
#[derive(Debug, Clone)]
pub struct Message {
    /// Retained for audit; never modified after decode
    raw: Bytes,
    pub start_line: StartLine,
    pub headers: Headers,
    /// The bytes of the session segment
    pub body: Bytes,
    pub session_description: Option<SessionDescription>,
    /// Where the datagram came from, when received from the network
    pub source: Option<SocketAddr>,
    pub received_at: DateTime<Utc>,
    /// Call-detail handle, filled in by pipeline steps
    pub detail: Box<dyn CallDetailSender>,
}

impl Message {
    /// Decode a raw datagram into a message
    pub fn decode(raw: impl Into<Bytes>) -> Result<Self> {
        let raw = raw.into();
        let segments = split_frame(&raw);

        let (start_line, headers) = parse_header_segment(&segments.header)?;
        let session_description = parse_session_description(&segments.session)?;

        Ok(Message {
            raw,
            start_line,
            headers,
            body: Bytes::from(segments.session),
            session_description,
            source: None,
            received_at: Utc::now(),
            detail: Box::new(HttpCallDetail::unconfigured()),
        })
    }

    /// Decode a datagram received from `source`
    pub fn decode_from(raw: impl Into<Bytes>, source: SocketAddr) -> Result<Self> {
        let mut message = Self::decode(raw)?;
        message.source = Some(source);
        Ok(message)
    }

    /// Replace the call-detail handle
    pub fn with_detail(mut self, detail: Box<dyn CallDetailSender>) -> Self {
        self.detail = detail;
        self
    }

    pub fn set_detail(&mut self, detail: Box<dyn CallDetailSender>) {
        self.detail = detail;
    }

    /// The datagram exactly as it was received
    pub fn original_bytes(&self) -> &Bytes {
        &self.raw
    }

    pub fn is_request(&self) -> bool {
        self.start_line.is_request()
    }

    pub fn method(&self) -> Option<&Method> {
        self.start_line.method()
    }

    pub fn status(&self) -> Option<StatusCode> {
        self.start_line.status()
    }

    pub fn call_id(&self) -> Option<&str> {
        self.headers.first("Call-ID")
    }

    pub fn from(&self) -> Option<&str> {
        self.headers.first("From")
    }

    pub fn to(&self) -> Option<&str> {
        self.headers.first("To")
    }

    /// CSeq sequence number and method
    pub fn cseq(&self) -> Option<(u32, Method)> {
        let value = self.headers.first("CSeq")?;
        let mut parts = value.split_whitespace();
        let seq = parts.next()?.parse().ok()?;
        let method = parts.next()?.parse().ok()?;
        Some((seq, method))
    }

    /// The method a message belongs to: the request method, or the CSeq
    /// method for responses.
    pub fn transaction_method(&self) -> Option<Method> {
        match self.method() {
            Some(method) => Some(method.clone()),
            None => self.cseq().map(|(_, method)| method),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DecodeError;

    const INVITE: &str = "INVITE sip:bob@biloxi.example.com SIP/2.0\r\n\
Via: SIP/2.0/UDP pc33.atlanta.example.com;branch=z9hG4bK776asdhds\r\n\
From: alice\r\n\
To: bob\r\n\
Call-ID: a84b4c76e66710@pc33.atlanta.example.com\r\n\
CSeq: 314159 INVITE\r\n\
Content-Type: application/sdp\r\n\
Content-Length: 142\r\n\
\r\n\
v=0\r\n\
o=alice 2890844526 2890844526 IN IP4 pc33.atlanta.example.com\r\n\
s=-\r\n\
c=IN IP4 192.0.2.101\r\n\
t=0 0\r\n\
m=audio 49172 RTP/AVP 0\r\n\
a=rtpmap:0 PCMU/8000\r\n";

    #[test]
    fn test_decode_invite_with_sdp() {
        let message = Message::decode(INVITE.as_bytes().to_vec()).unwrap();
        assert!(message.is_request());
        assert_eq!(message.method(), Some(&Method::Invite));
        assert_eq!(message.from(), Some("alice"));
        assert_eq!(message.to(), Some("bob"));
        assert_eq!(
            message.call_id(),
            Some("a84b4c76e66710@pc33.atlanta.example.com")
        );
        assert_eq!(message.cseq(), Some((314159, Method::Invite)));

        let sdp = message.session_description.as_ref().unwrap();
        assert_eq!(sdp.media.len(), 1);
        assert_eq!(sdp.media[0].port, 49172);
        assert!(message.body.starts_with(b"v=0\no=alice"));
        assert_eq!(message.original_bytes().as_ref(), INVITE.as_bytes());
    }

    #[test]
    fn test_decode_without_sdp() {
        let raw = "OPTIONS sip:bob@example.com SIP/2.0\r\nCall-ID: x\r\nContent-Length: 0\r\n\r\n";
        let message = Message::decode(raw.as_bytes().to_vec()).unwrap();
        assert!(message.session_description.is_none());
        assert!(message.body.is_empty());
    }

    #[test]
    fn test_response_transaction_method() {
        let raw = "SIP/2.0 200 OK\r\nCSeq: 2 BYE\r\nContent-Length: 0\r\n";
        let message = Message::decode(raw.as_bytes().to_vec()).unwrap();
        assert!(!message.is_request());
        assert_eq!(message.status(), Some(StatusCode::OK));
        assert_eq!(message.transaction_method(), Some(Method::Bye));
    }

    #[test]
    fn test_malformed_start_line_yields_no_message() {
        let raw = "NOT A SIP MESSAGE\r\nFrom: alice\r\nContent-Length: 0\r\n";
        assert!(matches!(
            Message::decode(raw.as_bytes().to_vec()),
            Err(DecodeError::MalformedStartLine(_))
        ));
    }

    #[test]
    fn test_malformed_sdp_yields_no_message() {
        // Content-Type after Content-Length lands in the session segment
        let raw = "INVITE sip:bob@example.com SIP/2.0\r\nContent-Length: 10\r\nContent-Type: application/sdp\r\n\r\nv=0\r\n";
        let err = Message::decode(raw.as_bytes().to_vec()).unwrap_err();
        assert!(err.is_sdp_error());
    }

    #[test]
    fn test_padded_buffer_decodes_like_trimmed() {
        let mut padded = INVITE.as_bytes().to_vec();
        padded.resize(2048, 0);
        let from_padded = Message::decode(padded).unwrap();
        let from_trimmed = Message::decode(INVITE.as_bytes().to_vec()).unwrap();
        assert_eq!(from_padded.headers, from_trimmed.headers);
        assert_eq!(from_padded.session_description, from_trimmed.session_description);
        assert_eq!(from_padded.body, from_trimmed.body);
    }

    #[test]
    fn test_detail_is_attached() {
        let message = Message::decode(INVITE.as_bytes().to_vec()).unwrap();
        assert!(message.detail.record().is_some());
        assert!(message.detail.report().is_ok());
    }
}
