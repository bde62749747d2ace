//! The dialog map owned by the store task

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::dialog::Dialog;
use crate::errors::{DialogResult, DialogStoreError};

/// Dialogs keyed by Call-ID. Only the owning task ever holds one.
#[derive(Debug, Default)]
pub(crate) struct DialogRegistry {
    dialogs: HashMap<String, Dialog>,
}

impl DialogRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Insert, or replace an active dialog with the same Call-ID
    pub(crate) fn write(&mut self, dialog: Dialog) -> DialogResult<()> {
        if dialog.call_id.trim().is_empty() {
            return Err(DialogStoreError::InvalidDialog("empty Call-ID".to_string()));
        }
        if self
            .dialogs
            .get(&dialog.call_id)
            .is_some_and(Dialog::is_terminated)
        {
            return Err(DialogStoreError::CallIdRetained {
                call_id: dialog.call_id,
            });
        }
        self.dialogs.insert(dialog.call_id.clone(), dialog);
        Ok(())
    }

    /// Insert `dialog` unless its Call-ID is known; otherwise merge its labels
    /// into the stored record and leave everything else alone. Returns whether
    /// a new dialog was created.
    pub(crate) fn open(&mut self, dialog: Dialog) -> DialogResult<bool> {
        if dialog.call_id.trim().is_empty() {
            return Err(DialogStoreError::InvalidDialog("empty Call-ID".to_string()));
        }
        match self.dialogs.get_mut(&dialog.call_id) {
            Some(existing) => {
                for (name, values) in &dialog.labels {
                    for value in values {
                        existing.merge_label(name, value);
                    }
                }
                Ok(false)
            }
            None => {
                self.dialogs.insert(dialog.call_id.clone(), dialog);
                Ok(true)
            }
        }
    }

    /// Merge label values into an existing dialog
    pub(crate) fn add_labels(&mut self, call_id: &str, labels: &[(String, String)]) -> DialogResult<()> {
        let dialog = self
            .dialogs
            .get_mut(call_id)
            .ok_or_else(|| DialogStoreError::not_found(call_id))?;
        for (name, value) in labels {
            dialog.merge_label(name, value);
        }
        Ok(())
    }

    /// Replace an existing dialog. A terminated dialog stays terminated.
    pub(crate) fn update(&mut self, mut dialog: Dialog) -> DialogResult<()> {
        let existing = self
            .dialogs
            .get_mut(&dialog.call_id)
            .ok_or_else(|| DialogStoreError::not_found(&dialog.call_id))?;
        if existing.is_terminated() {
            dialog.active = false;
            dialog.end = existing.end;
        }
        *existing = dialog;
        Ok(())
    }

    pub(crate) fn delete(&mut self, call_id: &str) -> DialogResult<Dialog> {
        self.dialogs
            .remove(call_id)
            .ok_or_else(|| DialogStoreError::not_found(call_id))
    }

    pub(crate) fn cancel(&mut self, call_id: &str, now: DateTime<Utc>) -> DialogResult<()> {
        let dialog = self
            .dialogs
            .get_mut(call_id)
            .ok_or_else(|| DialogStoreError::not_found(call_id))?;
        dialog.terminate(now);
        Ok(())
    }

    /// Cancel every active dialog carrying `label`, returning how many
    pub(crate) fn cancel_by_label(&mut self, label: &str, now: DateTime<Utc>) -> usize {
        let mut cancelled = 0;
        for dialog in self.dialogs.values_mut() {
            if dialog.active && dialog.has_label(label) {
                dialog.terminate(now);
                cancelled += 1;
            }
        }
        cancelled
    }

    /// Drop every terminated dialog
    pub(crate) fn remove_terminated(&mut self) -> usize {
        let before = self.dialogs.len();
        self.dialogs.retain(|_, dialog| dialog.active);
        before - self.dialogs.len()
    }

    /// Drop terminated dialogs whose end is at least `retention` old
    pub(crate) fn sweep(&mut self, now: DateTime<Utc>, retention: Duration) -> usize {
        let before = self.dialogs.len();
        self.dialogs.retain(|_, dialog| match dialog.end {
            Some(end) if !dialog.active => match (now - end).to_std() {
                Ok(age) => age < retention,
                // ended in the future by the wall clock
                Err(_) => true,
            },
            _ => true,
        });
        before - self.dialogs.len()
    }

    pub(crate) fn exists(&self, call_id: &str) -> bool {
        self.dialogs.contains_key(call_id)
    }

    pub(crate) fn exists_by_label(&self, label: &str) -> bool {
        self.dialogs.values().any(|d| d.has_label(label))
    }

    pub(crate) fn details(&self, call_id: &str) -> DialogResult<Dialog> {
        self.dialogs
            .get(call_id)
            .cloned()
            .ok_or_else(|| DialogStoreError::not_found(call_id))
    }

    /// Matching dialogs, oldest first
    pub(crate) fn select(&self, filter: impl Fn(&Dialog) -> bool) -> Vec<Dialog> {
        let mut dialogs: Vec<Dialog> = self.dialogs.values().filter(|d| filter(d)).cloned().collect();
        dialogs.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.call_id.cmp(&b.call_id)));
        dialogs
    }

    pub(crate) fn len(&self) -> usize {
        self.dialogs.len()
    }
}
