//! Session-description segment parser
//!
//! Builds a [`SessionDescription`] from the session segment of a datagram.
//! An empty segment is not an error: it means the datagram carried no session
//! description.

pub mod line_parser;

use tracing::trace;

pub use line_parser::{
    parse_bandwidth_line, parse_connection_line, parse_media_line, parse_origin_line,
    parse_sdp_line, parse_timing_line,
};

use crate::error::{DecodeError, Result};
use crate::sdp::{Attribute, SessionDescription};

/// Parse the session segment.
///
/// Returns `Ok(None)` for an empty (or whitespace-only) segment. Every
/// non-blank line must be `<letter>=<value>`, the first one must be `v=`, and
/// the structured line types (`o`, `c`, `b`, `t`, `m`) must be well formed.
///
/// ```rust
/// use sigflow_sip_core::sdp::parse_session_description;
///
/// let sdp = parse_session_description(b"v=0\nc=IN IP4 192.0.2.1\nm=audio 4000 RTP/AVP 0")
///     .unwrap()
///     .unwrap();
/// assert_eq!(sdp.media.len(), 1);
/// assert!(parse_session_description(b"").unwrap().is_none());
/// ```
pub fn parse_session_description(segment: &[u8]) -> Result<Option<SessionDescription>> {
    let text = std::str::from_utf8(segment).map_err(|e| DecodeError::InvalidUtf8 {
        segment: "session",
        reason: e.to_string(),
    })?;

    let mut lines = text
        .lines()
        .enumerate()
        .map(|(idx, line)| (idx + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty())
        .peekable();

    if lines.peek().is_none() {
        return Ok(None);
    }

    let mut sdp = SessionDescription::default();
    let mut seen_version = false;

    for (line_no, line) in lines {
        let (_, (kind, value)) = parse_sdp_line(line)
            .map_err(|_| DecodeError::sdp(line_no, format!("expected <type>=<value>, got {:?}", line)))?;

        if !seen_version {
            if kind != 'v' {
                return Err(DecodeError::sdp(line_no, "session description must start with v="));
            }
            sdp.version = value
                .parse()
                .map_err(|_| DecodeError::sdp(line_no, format!("invalid version {:?}", value)))?;
            seen_version = true;
            continue;
        }

        match kind {
            'v' => return Err(DecodeError::sdp(line_no, "duplicate v= line")),
            'm' => {
                let (_, media) = parse_media_line(value)
                    .map_err(|_| DecodeError::sdp(line_no, format!("invalid media line {:?}", value)))?;
                sdp.media.push(media);
                continue;
            }
            _ => {}
        }

        match (kind, sdp.media.last_mut()) {
            ('c', media) => {
                let (_, connection) = parse_connection_line(value).map_err(|_| {
                    DecodeError::sdp(line_no, format!("invalid connection line {:?}", value))
                })?;
                match media {
                    Some(media) => media.connection = Some(connection),
                    None => sdp.connection = Some(connection),
                }
            }
            ('b', media) => {
                let (_, bandwidth) = parse_bandwidth_line(value).map_err(|_| {
                    DecodeError::sdp(line_no, format!("invalid bandwidth line {:?}", value))
                })?;
                match media {
                    Some(media) => media.bandwidths.push(bandwidth),
                    None => sdp.bandwidths.push(bandwidth),
                }
            }
            ('a', media) => {
                let attribute = Attribute::parse(value);
                match media {
                    Some(media) => media.attributes.push(attribute),
                    None => sdp.attributes.push(attribute),
                }
            }
            ('i', Some(media)) => media.information = Some(value.to_string()),
            ('k', Some(media)) => media.encryption_key = Some(value.to_string()),
            (_, Some(_)) => {
                return Err(DecodeError::sdp(
                    line_no,
                    format!("{}= line is not allowed inside a media section", kind),
                ));
            }
            ('o', None) => {
                let (_, origin) = parse_origin_line(value)
                    .map_err(|_| DecodeError::sdp(line_no, format!("invalid origin line {:?}", value)))?;
                sdp.origin = Some(origin);
            }
            ('t', None) => {
                let (_, timing) = parse_timing_line(value)
                    .map_err(|_| DecodeError::sdp(line_no, format!("invalid timing line {:?}", value)))?;
                sdp.timing.push(timing);
            }
            ('s', None) => sdp.session_name = Some(value.to_string()),
            ('i', None) => sdp.information = Some(value.to_string()),
            ('u', None) => sdp.uri = Some(value.to_string()),
            ('e', None) => sdp.emails.push(value.to_string()),
            ('p', None) => sdp.phones.push(value.to_string()),
            ('r', None) => sdp.repeat_times.push(value.to_string()),
            ('z', None) => sdp.time_zones = Some(value.to_string()),
            ('k', None) => sdp.encryption_key = Some(value.to_string()),
            (other, None) => {
                trace!("Ignoring unknown SDP line type {}= at line {}", other, line_no);
            }
        }
    }

    Ok(Some(sdp))
}
