use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One in-progress call, correlated by Call-ID
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dialog {
    pub call_id: String,
    pub from: String,
    pub to: String,
    pub start: DateTime<Utc>,
    /// Set when the dialog is cancelled
    pub end: Option<DateTime<Utc>>,
    pub active: bool,
    /// Grouping tags such as carrier or trunk group, in insertion order per name
    #[serde(default)]
    pub labels: HashMap<String, Vec<String>>,
}

impl Dialog {
    /// A new active dialog starting now
    pub fn new(call_id: impl Into<String>, from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            from: from.into(),
            to: to.into(),
            start: Utc::now(),
            end: None,
            active: true,
            labels: HashMap::new(),
        }
    }

    pub fn with_label(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.add_label(name, value);
        self
    }

    pub fn add_label(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.labels.entry(name.into()).or_default().push(value.into());
    }

    /// Add a label value unless it is already present
    pub fn merge_label(&mut self, name: &str, value: &str) -> bool {
        if self.has_label_value(name, value) {
            return false;
        }
        self.add_label(name, value);
        true
    }

    pub fn has_label(&self, name: &str) -> bool {
        self.labels.contains_key(name)
    }

    pub fn has_label_value(&self, name: &str, value: &str) -> bool {
        self.label_values(name).iter().any(|v| v == value)
    }

    /// Values of a label, empty when the label is absent
    pub fn label_values(&self, name: &str) -> &[String] {
        self.labels.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_terminated(&self) -> bool {
        !self.active
    }

    /// Mark the dialog inactive. The first end stamp wins.
    pub fn terminate(&mut self, at: DateTime<Utc>) {
        if self.active {
            self.active = false;
            self.end = Some(at);
        }
    }

    pub fn duration(&self) -> Option<chrono::Duration> {
        self.end.map(|end| end - self.start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels() {
        let dialog = Dialog::new("call-1", "alice", "bob")
            .with_label("trunk", "east")
            .with_label("trunk", "west")
            .with_label("carrier", "acme");

        assert!(dialog.has_label("trunk"));
        assert!(!dialog.has_label("lata"));
        assert_eq!(dialog.label_values("trunk"), ["east", "west"]);
        assert!(dialog.has_label_value("carrier", "acme"));
        assert!(!dialog.has_label_value("carrier", "other"));
        assert!(dialog.label_values("lata").is_empty());
    }

    #[test]
    fn test_terminate_keeps_first_end() {
        let mut dialog = Dialog::new("call-1", "alice", "bob");
        assert!(!dialog.is_terminated());
        assert_eq!(dialog.duration(), None);

        let first = dialog.start + chrono::Duration::seconds(30);
        dialog.terminate(first);
        dialog.terminate(first + chrono::Duration::seconds(30));

        assert!(dialog.is_terminated());
        assert_eq!(dialog.end, Some(first));
        assert_eq!(dialog.duration(), Some(chrono::Duration::seconds(30)));
    }
}
