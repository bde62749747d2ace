//! # SIP Status Codes
//!
//! Three digit response codes grouped into six classes:
//!
//! - `1xx`: Provisional
//! - `2xx`: Success
//! - `3xx`: Redirection
//! - `4xx`: Client Error
//! - `5xx`: Server Error
//! - `6xx`: Global Failure
//!
//! ```rust
//! use sigflow_sip_core::StatusCode;
//!
//! let ok = StatusCode::from_u16(200).unwrap();
//! assert!(ok.is_success());
//! assert!(StatusCode::from_u16(700).is_err());
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{DecodeError, Result};

/// A validated SIP status code (100..=699)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StatusCode(u16);

impl StatusCode {
    pub const TRYING: StatusCode = StatusCode(100);
    pub const RINGING: StatusCode = StatusCode(180);
    pub const OK: StatusCode = StatusCode(200);

    /// Validates and wraps a numeric status code
    pub fn from_u16(code: u16) -> Result<Self> {
        if (100..=699).contains(&code) {
            Ok(StatusCode(code))
        } else {
            Err(DecodeError::InvalidStatusCode(code.to_string()))
        }
    }

    pub fn as_u16(&self) -> u16 {
        self.0
    }

    /// Leading digit of the code, 1 through 6
    pub fn class(&self) -> u8 {
        (self.0 / 100) as u8
    }

    pub fn is_provisional(&self) -> bool {
        self.class() == 1
    }

    pub fn is_success(&self) -> bool {
        self.class() == 2
    }

    /// Any 4xx, 5xx or 6xx
    pub fn is_error(&self) -> bool {
        self.class() >= 4
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
