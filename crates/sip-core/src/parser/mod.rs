//! Header/body segment decoding
//!
//! Turns the header segment produced by [`split_frame`](crate::framing::split_frame)
//! into a [`StartLine`](crate::StartLine) and a [`Headers`](crate::Headers) map.

pub mod message;
pub mod start_line;

pub use message::{parse_header_line, parse_header_segment};
pub use start_line::{parse_request_line, parse_start_line, parse_status_line, sip_version};

/// RFC 3261 `token` characters
pub(crate) fn is_token_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || "-.!%*_+`'~".contains(c)
}
