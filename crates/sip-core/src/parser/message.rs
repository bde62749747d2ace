//! Header segment parser
//!
//! The header segment is the start line followed by `Name: value` lines. Lines
//! beginning with whitespace continue the previous header value (RFC 3261
//! Section 7.3.1 header folding).

use nom::{
    bytes::complete::take_while1,
    character::complete::{char, space0},
    combinator::rest,
    sequence::{terminated, tuple},
    IResult,
};

use super::is_token_char;
use super::start_line::parse_start_line;
use crate::error::{DecodeError, Result};
use crate::types::{Headers, StartLine};

/// Parse a single `Name: value` line into `(name, value)`
pub fn parse_header_line(input: &str) -> IResult<&str, (&str, &str)> {
    let (input, (name, _)) = tuple((
        terminated(take_while1(is_token_char), space0),
        char(':'),
    ))(input)?;
    let (input, value) = rest(input)?;
    Ok((input, (name, value.trim())))
}

/// Decode the header segment into its start line and header mapping.
///
/// Fails on an empty segment, a malformed start line, or any header line
/// that is not `Name: value`.
pub fn parse_header_segment(segment: &[u8]) -> Result<(StartLine, Headers)> {
    let text = std::str::from_utf8(segment).map_err(|e| DecodeError::InvalidUtf8 {
        segment: "header",
        reason: e.to_string(),
    })?;

    let mut lines = text
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.trim().is_empty());

    let start_line = parse_start_line(lines.next().ok_or(DecodeError::EmptyMessage)?)?;

    let mut headers = Headers::new();
    // entry the previous header line was appended to
    let mut current: Option<usize> = None;
    for line in lines {
        if line.starts_with(' ') || line.starts_with('\t') {
            let previous = match current {
                Some(idx) => headers.last_value_mut(idx),
                None => None,
            }
            .ok_or_else(|| {
                DecodeError::MalformedHeader(format!("continuation without a header: {}", line))
            })?;
            if !previous.is_empty() {
                previous.push(' ');
            }
            previous.push_str(line.trim());
            continue;
        }

        let (_, (name, value)) = parse_header_line(line)
            .map_err(|_| DecodeError::MalformedHeader(line.to_string()))?;
        current = Some(headers.append_entry(name, value.to_string()));
    }

    Ok((start_line, headers))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Method;

    #[test]
    fn test_parse_header_line() {
        assert_eq!(parse_header_line("From: alice"), Ok(("", ("From", "alice"))));
        assert_eq!(parse_header_line("Max-Forwards :70"), Ok(("", ("Max-Forwards", "70"))));
        assert_eq!(parse_header_line("Subject:"), Ok(("", ("Subject", ""))));
        assert!(parse_header_line("From alice").is_err());
        assert!(parse_header_line(": alice").is_err());
    }

    #[test]
    fn test_parse_header_segment() {
        let segment = b"INVITE sip:bob@example.com SIP/2.0\n\
Via: SIP/2.0/UDP pc33.example.com\n\
Via: SIP/2.0/UDP proxy.example.com\n\
f: alice\n\
To: bob\n\
Call-ID: a84b4c76e66710\n\
Content-Length: 0";
        let (start, headers) = parse_header_segment(segment).unwrap();
        assert_eq!(start.method(), Some(&Method::Invite));
        assert_eq!(headers.get("via").unwrap().len(), 2);
        assert_eq!(headers.first("From"), Some("alice"));
        assert_eq!(headers.first("call-id"), Some("a84b4c76e66710"));
        assert_eq!(headers.first("Content-Length"), Some("0"));
    }

    #[test]
    fn test_folded_header() {
        let segment = b"OPTIONS sip:a SIP/2.0\nSubject: I know you're there,\n   pick up the phone";
        let (_, headers) = parse_header_segment(segment).unwrap();
        assert_eq!(
            headers.first("Subject"),
            Some("I know you're there, pick up the phone")
        );
    }

    #[test]
    fn test_folding_continues_the_line_above() {
        let segment = b"OPTIONS sip:a SIP/2.0\nVia: a\nFrom: alice\nVia: b\n ;branch=z9hG4bK1";
        let (_, headers) = parse_header_segment(segment).unwrap();
        assert_eq!(headers.first("From"), Some("alice"));
        assert_eq!(
            headers.get("Via").unwrap(),
            &["a".to_string(), "b ;branch=z9hG4bK1".to_string()]
        );
    }

    #[test]
    fn test_truncated_header_is_rejected() {
        let segment = b"OPTIONS sip:a SIP/2.0\nFrom: alice\nTo";
        assert!(matches!(
            parse_header_segment(segment),
            Err(DecodeError::MalformedHeader(_))
        ));
    }

    #[test]
    fn test_leading_continuation_is_rejected() {
        let segment = b"OPTIONS sip:a SIP/2.0\n  dangling";
        assert!(matches!(
            parse_header_segment(segment),
            Err(DecodeError::MalformedHeader(_))
        ));
    }

    #[test]
    fn test_empty_segment() {
        assert_eq!(parse_header_segment(b""), Err(DecodeError::EmptyMessage));
        assert_eq!(parse_header_segment(b"\n\n"), Err(DecodeError::EmptyMessage));
    }

    #[test]
    fn test_invalid_utf8() {
        assert!(matches!(
            parse_header_segment(&[0xff, 0xfe, b'\n']),
            Err(DecodeError::InvalidUtf8 { segment: "header", .. })
        ));
    }
}
