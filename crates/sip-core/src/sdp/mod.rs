//! Session Description Protocol (RFC 8866) model
//!
//! The structured form of the session segment of a datagram: connection
//! information, timing, attributes and media lines. Parsing lives in
//! [`parser`].

pub mod parser;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use parser::parse_session_description;

/// Origin (`o=`) of the session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Origin {
    pub username: String,
    pub session_id: String,
    pub session_version: String,
    pub net_type: String,
    pub addr_type: String,
    pub unicast_address: String,
}

/// Connection data (`c=<nettype> <addrtype> <connection-address>`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionInfo {
    pub net_type: String,
    pub addr_type: String,
    pub address: String,
}

impl fmt::Display for ConnectionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.net_type, self.addr_type, self.address)
    }
}

/// Bandwidth (`b=<bwtype>:<bandwidth>`), in kilobits per second
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bandwidth {
    pub bw_type: String,
    pub kbps: u64,
}

/// Timing (`t=<start-time> <stop-time>`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timing {
    pub start: u64,
    pub stop: u64,
}

/// Attribute (`a=<name>` or `a=<name>:<value>`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub value: Option<String>,
}

impl Attribute {
    pub fn parse(raw: &str) -> Self {
        match raw.split_once(':') {
            Some((name, value)) => Attribute {
                name: name.trim().to_string(),
                value: Some(value.trim().to_string()),
            },
            None => Attribute {
                name: raw.trim().to_string(),
                value: None,
            },
        }
    }
}

/// Media direction attributes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaDirection {
    SendRecv,
    SendOnly,
    RecvOnly,
    Inactive,
}

fn direction_of(attributes: &[Attribute]) -> Option<MediaDirection> {
    attributes.iter().rev().find_map(|a| match a.name.as_str() {
        "sendrecv" => Some(MediaDirection::SendRecv),
        "sendonly" => Some(MediaDirection::SendOnly),
        "recvonly" => Some(MediaDirection::RecvOnly),
        "inactive" => Some(MediaDirection::Inactive),
        _ => None,
    })
}

/// A media section, started by an `m=` line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaDescription {
    pub media: String,
    pub port: u16,
    pub port_count: Option<u16>,
    pub protocol: String,
    pub formats: Vec<String>,
    pub information: Option<String>,
    pub connection: Option<ConnectionInfo>,
    pub bandwidths: Vec<Bandwidth>,
    pub encryption_key: Option<String>,
    pub attributes: Vec<Attribute>,
}

impl MediaDescription {
    /// First attribute with the given name
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// The `a=rtpmap` encoding for a payload format, e.g. `PCMU/8000` for `0`
    pub fn rtpmap(&self, format: &str) -> Option<&str> {
        self.attributes
            .iter()
            .filter(|a| a.name == "rtpmap")
            .filter_map(|a| a.value.as_deref())
            .find_map(|value| {
                let (fmt, encoding) = value.split_once(' ')?;
                (fmt == format).then(|| encoding.trim())
            })
    }

    pub fn direction(&self) -> Option<MediaDirection> {
        direction_of(&self.attributes)
    }
}

/// A parsed session description
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    pub version: u32,
    pub origin: Option<Origin>,
    pub session_name: Option<String>,
    pub information: Option<String>,
    pub uri: Option<String>,
    pub emails: Vec<String>,
    pub phones: Vec<String>,
    pub connection: Option<ConnectionInfo>,
    pub bandwidths: Vec<Bandwidth>,
    pub timing: Vec<Timing>,
    pub repeat_times: Vec<String>,
    pub time_zones: Option<String>,
    pub encryption_key: Option<String>,
    pub attributes: Vec<Attribute>,
    pub media: Vec<MediaDescription>,
}

impl SessionDescription {
    /// Connection for a media section, falling back to the session level one
    pub fn connection_for<'a>(
        &'a self,
        media: &'a MediaDescription,
    ) -> Option<&'a ConnectionInfo> {
        media.connection.as_ref().or(self.connection.as_ref())
    }

    /// All media sections of the given kind (`audio`, `video`, ...)
    pub fn media_of_kind<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = &'a MediaDescription> {
        self.media.iter().filter(move |m| m.media.eq_ignore_ascii_case(kind))
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Session level direction, if declared
    pub fn direction(&self) -> Option<MediaDirection> {
        direction_of(&self.attributes)
    }
}
