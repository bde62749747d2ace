//! Dialog store interface and its actor-backed implementation

mod command;
mod memory;
mod registry;

use async_trait::async_trait;

use crate::dialog::Dialog;
use crate::errors::DialogResult;

pub use memory::InMemoryDialogStore;

/// Operations on the dialog registry.
///
/// Implementations must serialize mutation; callers only ever see copies of
/// the stored dialogs.
#[async_trait]
pub trait DialogStore: Send + Sync {
    /// Start the store. Must succeed before any other operation.
    async fn boot(&self) -> DialogResult<()>;

    async fn exists(&self, call_id: &str) -> DialogResult<bool>;

    /// Insert a dialog, or replace an active one with the same Call-ID
    async fn write(&self, dialog: Dialog) -> DialogResult<()>;

    /// Create the dialog if its Call-ID is unknown, otherwise merge its labels
    /// into the stored one. Returns `true` when a dialog was created.
    async fn open(&self, dialog: Dialog) -> DialogResult<bool>;

    /// Add label values to a known dialog, skipping values it already has
    async fn add_labels(&self, call_id: &str, labels: Vec<(String, String)>) -> DialogResult<()>;

    async fn update(&self, dialog: Dialog) -> DialogResult<()>;

    /// Remove a dialog, returning it
    async fn delete(&self, call_id: &str) -> DialogResult<Dialog>;

    async fn exists_by_label(&self, label: &str) -> DialogResult<bool>;

    async fn details(&self, call_id: &str) -> DialogResult<Dialog>;

    async fn dialogs(&self) -> DialogResult<Vec<Dialog>>;

    async fn dialogs_by_label(&self, label: &str) -> DialogResult<Vec<Dialog>>;

    async fn dialogs_by_label_value(&self, label: &str, value: &str) -> DialogResult<Vec<Dialog>>;

    /// Mark a dialog inactive and stamp its end time
    async fn cancel(&self, call_id: &str) -> DialogResult<()>;

    /// Cancel every active dialog carrying `label`, returning how many
    async fn cancel_by_label(&self, label: &str) -> DialogResult<usize>;

    async fn len(&self) -> DialogResult<usize>;
}
