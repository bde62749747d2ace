//! Start line parsers (RFC 3261 Section 7.1 and 7.2)
//!
//! ```text
//! Request-Line  =  Method SP Request-URI SP SIP-Version
//! Status-Line   =  SIP-Version SP Status-Code SP Reason-Phrase
//! ```

use nom::{
    bytes::complete::{tag_no_case, take_till1, take_while1, take_while_m_n},
    character::complete::{char, digit1, space1},
    combinator::{all_consuming, map_res, opt, rest},
    sequence::{preceded, separated_pair, tuple},
    IResult,
};

use super::is_token_char;
use crate::error::{DecodeError, Result};
use crate::types::{Method, StartLine, StatusCode, Version};

/// SIP-Version = "SIP" "/" 1*DIGIT "." 1*DIGIT
pub fn sip_version(input: &str) -> IResult<&str, Version> {
    map_res(
        preceded(
            tag_no_case("SIP/"),
            separated_pair(digit1, char('.'), digit1),
        ),
        |(major, minor): (&str, &str)| -> std::result::Result<Version, std::num::ParseIntError> {
            Ok(Version::new(major.parse()?, minor.parse()?))
        },
    )(input)
}

/// Parse a request line into `(method, target, version)`
pub fn parse_request_line(input: &str) -> IResult<&str, (Method, &str, Version)> {
    let (input, (method, _, target, _, version)) = all_consuming(tuple((
        take_while1(is_token_char),
        space1,
        take_till1(|c: char| c == ' ' || c == '\t'),
        space1,
        sip_version,
    )))(input)?;

    // Method parsing is infallible; unknown tokens become extensions
    let method = method.parse::<Method>().unwrap_or_else(|e| match e {});
    Ok((input, (method, target, version)))
}

/// Parse a status line into `(version, code digits, reason)`
///
/// The reason phrase may be empty. The code is returned as its digits; range
/// checking happens in [`parse_start_line`].
pub fn parse_status_line(input: &str) -> IResult<&str, (Version, &str, &str)> {
    let (input, (version, _, code, reason)) = all_consuming(tuple((
        sip_version,
        space1,
        take_while_m_n(3, 3, |c: char| c.is_ascii_digit()),
        opt(preceded(space1, rest)),
    )))(input)?;

    Ok((input, (version, code, reason.unwrap_or("").trim())))
}

/// Decode the first line of a SIP message.
///
/// Lines starting with `SIP/` are treated as status lines, everything else as
/// request lines.
pub fn parse_start_line(line: &str) -> Result<StartLine> {
    let line = line.trim();
    if line.is_empty() {
        return Err(DecodeError::EmptyMessage);
    }

    let looks_like_status = line
        .get(..4)
        .map_or(false, |prefix| prefix.eq_ignore_ascii_case("SIP/"));

    if looks_like_status {
        let (_, (version, code, reason)) = parse_status_line(line).map_err(|_| {
            if sip_version(line).is_err() {
                DecodeError::InvalidVersion(line.to_string())
            } else {
                DecodeError::MalformedStartLine(line.to_string())
            }
        })?;
        let code: u16 = code
            .parse()
            .map_err(|_| DecodeError::InvalidStatusCode(code.to_string()))?;
        let status = StatusCode::from_u16(code)?;
        return Ok(StartLine::Response {
            version,
            status,
            reason: reason.to_string(),
        });
    }

    let (_, (method, target, version)) =
        parse_request_line(line).map_err(|_| DecodeError::MalformedStartLine(line.to_string()))?;
    Ok(StartLine::Request {
        method,
        target: target.to_string(),
        version,
    })
}
