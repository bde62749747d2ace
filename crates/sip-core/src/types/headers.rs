//! Case-insensitive SIP header mapping
//!
//! SIP header names are case-insensitive and a header may appear more than
//! once. [`Headers`] keeps every value in arrival order, grouped under the
//! spelling the name was first seen with.
//!
//! ```rust
//! use sigflow_sip_core::Headers;
//!
//! let mut headers = Headers::new();
//! headers.append("Via", "SIP/2.0/UDP a.example.com");
//! headers.append("via", "SIP/2.0/UDP b.example.com");
//! assert_eq!(headers.get("VIA").map(|v| v.len()), Some(2));
//! assert_eq!(headers.first("Via"), Some("SIP/2.0/UDP a.example.com"));
//! ```

use serde::{Deserialize, Serialize};

/// Expand a compact header form (RFC 3261 Section 7.3.3) to its full name.
///
/// Names that are not compact forms are returned unchanged.
pub fn canonical_header_name(name: &str) -> &str {
    if name.len() != 1 {
        return name;
    }
    match name.as_bytes()[0].to_ascii_lowercase() {
        b'i' => "Call-ID",
        b'm' => "Contact",
        b'e' => "Content-Encoding",
        b'l' => "Content-Length",
        b'c' => "Content-Type",
        b'f' => "From",
        b's' => "Subject",
        b'k' => "Supported",
        b't' => "To",
        b'v' => "Via",
        _ => name,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct HeaderEntry {
    name: String,
    values: Vec<String>,
}

/// Ordered, case-insensitive mapping from header name to its values
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Headers {
    entries: Vec<HeaderEntry>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    fn position(&self, name: &str) -> Option<usize> {
        let name = canonical_header_name(name);
        self.entries
            .iter()
            .position(|entry| entry.name.eq_ignore_ascii_case(name))
    }

    /// All values for `name`, in arrival order
    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.position(name)
            .map(|idx| self.entries[idx].values.as_slice())
    }

    /// First value for `name`
    pub fn first(&self, name: &str) -> Option<&str> {
        self.get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Add a value, keeping any existing values for the same name
    pub fn append(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
        self.append_entry(name.as_ref(), value.into());
    }

    /// Append and return the index of the entry the value landed in
    pub(crate) fn append_entry(&mut self, name: &str, value: String) -> usize {
        let name = canonical_header_name(name);
        match self.position(name) {
            Some(idx) => {
                self.entries[idx].values.push(value);
                idx
            }
            None => {
                self.entries.push(HeaderEntry {
                    name: name.to_string(),
                    values: vec![value],
                });
                self.entries.len() - 1
            }
        }
    }

    /// Replace every value of `name` with a single value
    pub fn insert(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
        let name = canonical_header_name(name.as_ref());
        match self.position(name) {
            Some(idx) => self.entries[idx].values = vec![value.into()],
            None => self.entries.push(HeaderEntry {
                name: name.to_string(),
                values: vec![value.into()],
            }),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<Vec<String>> {
        self.position(name)
            .map(|idx| self.entries.remove(idx).values)
    }

    /// Most recent value of the entry at `idx`, for folded continuation lines
    pub(crate) fn last_value_mut(&mut self, idx: usize) -> Option<&mut String> {
        self.entries
            .get_mut(idx)
            .and_then(|entry| entry.values.last_mut())
    }

    /// Iterate over `(name, values)` pairs in first-seen order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|entry| (entry.name.as_str(), entry.values.as_slice()))
    }

    /// Number of distinct header names
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
