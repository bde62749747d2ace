//! Datagram framing
//!
//! A SIP datagram carrying an SDP offer or answer has no explicit length
//! prefix separating the two documents. The splitter scans the datagram line
//! by line and uses the body-length header (`Content-Length`, or its compact
//! form `l`) as the boundary:
//!
//! - blank lines are skipped everywhere
//! - every line up to and including the marker line belongs to the header segment
//! - every line after the marker line belongs to the session segment
//!
//! The declared length is never checked against the size of the session
//! segment. Callers that care can compare [`FrameSegments::declared_length`]
//! with [`FrameSegments::session`] themselves.
//!
//! ```rust
//! use sigflow_sip_core::framing::split_frame;
//!
//! let raw = b"OPTIONS sip:bob@example.com SIP/2.0\r\nContent-Length: 9\r\n\r\nv=0\r\ns=-\r\n";
//! let segments = split_frame(raw);
//! assert_eq!(segments.header, b"OPTIONS sip:bob@example.com SIP/2.0\nContent-Length: 9".to_vec());
//! assert_eq!(segments.session, b"v=0\ns=-".to_vec());
//! ```

use tracing::trace;

/// Substring (matched case-insensitively) identifying the boundary line
pub const BODY_LENGTH_MARKER: &str = "content-length";

/// The two segments of a datagram
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameSegments {
    /// Start line and headers, joined with `\n`
    pub header: Vec<u8>,
    /// Session-description lines, joined with `\n`; empty if no marker was seen
    pub session: Vec<u8>,
    marker: Option<Vec<u8>>,
}

impl FrameSegments {
    /// Whether a marker line was found
    pub fn has_marker(&self) -> bool {
        self.marker.is_some()
    }

    /// The numeric value of the marker line, if it has one.
    ///
    /// Not validated against the session segment.
    pub fn declared_length(&self) -> Option<usize> {
        let line = self.marker.as_deref()?;
        let colon = line.iter().position(|b| *b == b':')?;
        std::str::from_utf8(&line[colon + 1..])
            .ok()?
            .trim()
            .parse()
            .ok()
    }
}

/// Split a raw datagram into its header and session-description segments.
///
/// This never fails; a datagram without a marker line yields an empty
/// session segment and is left for the decoder to judge.
pub fn split_frame(raw: &[u8]) -> FrameSegments {
    let mut header_lines: Vec<&[u8]> = Vec::new();
    let mut session_lines: Vec<&[u8]> = Vec::new();
    let mut marker: Option<&[u8]> = None;

    for line in raw.split(|b| *b == b'\n') {
        let line = trim_line_end(line);
        if is_blank(line) {
            continue;
        }

        if marker.is_some() {
            session_lines.push(line);
            continue;
        }

        header_lines.push(line);
        if is_marker_line(line) {
            trace!("Frame boundary found after {} header lines", header_lines.len());
            marker = Some(line);
        }
    }

    FrameSegments {
        header: header_lines.join(&b'\n'),
        session: session_lines.join(&b'\n'),
        marker: marker.map(<[u8]>::to_vec),
    }
}

/// Strip the trailing `\r` and any NUL padding left by a fixed-size read buffer
fn trim_line_end(line: &[u8]) -> &[u8] {
    let end = line
        .iter()
        .rposition(|b| *b != b'\r' && *b != 0)
        .map_or(0, |idx| idx + 1);
    &line[..end]
}

fn is_blank(line: &[u8]) -> bool {
    line.iter().all(|b| b.is_ascii_whitespace() || *b == 0)
}

fn is_marker_line(line: &[u8]) -> bool {
    let lower = line.to_ascii_lowercase();
    if lower
        .windows(BODY_LENGTH_MARKER.len())
        .any(|window| window == BODY_LENGTH_MARKER.as_bytes())
    {
        return true;
    }

    // Compact form: `l: 123`
    match line.iter().position(|b| *b == b':') {
        Some(colon) => {
            let name = &line[..colon];
            name.trim_ascii() == b"l" || name.trim_ascii() == b"L"
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_at_marker() {
        let raw = b"INVITE sip:bob@example.com SIP/2.0\r\n\
From: alice\r\n\
To: bob\r\n\
Content-Length: 42\r\n\
\r\n\
v=0\r\n\
m=audio 49170 RTP/AVP 0\r\n";
        let segments = split_frame(raw);
        assert_eq!(
            String::from_utf8(segments.header).unwrap(),
            "INVITE sip:bob@example.com SIP/2.0\nFrom: alice\nTo: bob\nContent-Length: 42"
        );
        assert_eq!(
            String::from_utf8(segments.session).unwrap(),
            "v=0\nm=audio 49170 RTP/AVP 0"
        );
    }

    #[test]
    fn test_marker_is_case_insensitive() {
        let segments = split_frame(b"BYE sip:a SIP/2.0\nCONTENT-LENGTH: 3\nv=0");
        assert!(segments.has_marker());
        assert_eq!(segments.session, b"v=0".to_vec());
        assert_eq!(segments.declared_length(), Some(3));
    }

    #[test]
    fn test_compact_marker() {
        let segments = split_frame(b"BYE sip:a SIP/2.0\nl: 0\nv=0");
        assert!(segments.has_marker());
        assert_eq!(segments.session, b"v=0".to_vec());
    }

    #[test]
    fn test_no_marker_means_empty_session() {
        let segments = split_frame(b"OPTIONS sip:a SIP/2.0\nFrom: alice\n\nv=0\n");
        assert!(!segments.has_marker());
        assert!(segments.session.is_empty());
        assert_eq!(segments.header, b"OPTIONS sip:a SIP/2.0\nFrom: alice\nv=0".to_vec());
        assert_eq!(segments.declared_length(), None);
    }

    #[test]
    fn test_zero_padding_is_blank() {
        let mut buf = b"OPTIONS sip:a SIP/2.0\r\nContent-Length: 0\r\n\r\n".to_vec();
        buf.resize(2048, 0);
        let padded = split_frame(&buf);
        let trimmed = split_frame(b"OPTIONS sip:a SIP/2.0\r\nContent-Length: 0\r\n\r\n");
        assert_eq!(padded, trimmed);
        assert!(padded.session.is_empty());
    }

    #[test]
    fn test_declared_length_is_not_validated() {
        let segments = split_frame(b"INVITE sip:a SIP/2.0\nContent-Length: 9999\nv=0");
        assert_eq!(segments.declared_length(), Some(9999));
        assert_eq!(segments.session, b"v=0".to_vec());
    }

    #[test]
    fn test_empty_input() {
        let segments = split_frame(b"");
        assert!(segments.header.is_empty());
        assert!(segments.session.is_empty());
    }
}
