//! SDP line parsing utilities
//!
//! Each SDP line has the format `<type>=<value>` where type is a single
//! character. The value parsers below cover the line types whose values have
//! a fixed structure:
//! - c= (Connection Information)
//! - b= (Bandwidth Information)
//! - o= (Origin)
//! - t= (Timing)
//! - m= (Media Descriptions)

use nom::{
    bytes::complete::{tag, take_till1, take_until},
    character::complete::{char, digit1, not_line_ending, space1},
    combinator::{all_consuming, map_res, opt},
    multi::many1,
    sequence::{preceded, tuple},
    IResult,
};

use crate::sdp::{Bandwidth, ConnectionInfo, MediaDescription, Origin, Timing};

fn field(input: &str) -> IResult<&str, &str> {
    take_till1(|c: char| c == ' ' || c == '\t')(input)
}

fn number<T: std::str::FromStr>(input: &str) -> IResult<&str, T> {
    map_res(digit1, |s: &str| s.parse::<T>())(input)
}

/// Parse an SDP line into a `(type, value)` pair
///
/// The value is trimmed; trailing line endings are consumed.
pub fn parse_sdp_line(input: &str) -> IResult<&str, (char, &str)> {
    let (input, key) = nom::character::complete::satisfy(|c| c.is_ascii_alphabetic())(input)?;
    let (input, _) = char('=')(input)?;
    let (input, value) = not_line_ending(input)?;

    let input = input.trim_start_matches(['\r', '\n']);

    Ok((input, (key, value.trim())))
}

/// Parse a bandwidth value: `<bwtype>:<bandwidth>`
pub fn parse_bandwidth_line(input: &str) -> IResult<&str, Bandwidth> {
    let (input, (bw_type, _, kbps)) =
        all_consuming(tuple((take_until(":"), tag(":"), number::<u64>)))(input)?;
    Ok((
        input,
        Bandwidth {
            bw_type: bw_type.to_string(),
            kbps,
        },
    ))
}

/// Parse a connection value: `<nettype> <addrtype> <connection-address>`
pub fn parse_connection_line(input: &str) -> IResult<&str, ConnectionInfo> {
    let (input, (net_type, _, addr_type, _, address)) =
        all_consuming(tuple((field, space1, field, space1, field)))(input)?;
    Ok((
        input,
        ConnectionInfo {
            net_type: net_type.to_string(),
            addr_type: addr_type.to_string(),
            address: address.to_string(),
        },
    ))
}

/// Parse an origin value:
/// `<username> <sess-id> <sess-version> <nettype> <addrtype> <unicast-address>`
pub fn parse_origin_line(input: &str) -> IResult<&str, Origin> {
    let (input, (username, _, session_id, _, session_version, _, net_type, _, addr_type, _, address)) =
        all_consuming(tuple((
            field, space1, digit1, space1, digit1, space1, field, space1, field, space1, field,
        )))(input)?;
    Ok((
        input,
        Origin {
            username: username.to_string(),
            session_id: session_id.to_string(),
            session_version: session_version.to_string(),
            net_type: net_type.to_string(),
            addr_type: addr_type.to_string(),
            unicast_address: address.to_string(),
        },
    ))
}

/// Parse a timing value: `<start-time> <stop-time>`
pub fn parse_timing_line(input: &str) -> IResult<&str, Timing> {
    let (input, (start, _, stop)) =
        all_consuming(tuple((number::<u64>, space1, number::<u64>)))(input)?;
    Ok((input, Timing { start, stop }))
}

/// Parse a media value: `<media> <port>[/<port-count>] <proto> <fmt> [<fmt>]*`
pub fn parse_media_line(input: &str) -> IResult<&str, MediaDescription> {
    let (input, (media, _, port, port_count, _, protocol, formats)) = all_consuming(tuple((
        field,
        space1,
        number::<u16>,
        opt(preceded(char('/'), number::<u16>)),
        space1,
        field,
        many1(preceded(space1, field)),
    )))(input)?;

    Ok((
        input,
        MediaDescription {
            media: media.to_string(),
            port,
            port_count,
            protocol: protocol.to_string(),
            formats: formats.into_iter().map(str::to_string).collect(),
            information: None,
            connection: None,
            bandwidths: Vec::new(),
            encryption_key: None,
            attributes: Vec::new(),
        },
    ))
}
