use tokio::sync::oneshot;

use crate::dialog::Dialog;
use crate::errors::DialogResult;

/// Requests understood by the owning task
#[derive(Debug)]
pub(crate) enum StoreCommand {
    Write {
        dialog: Dialog,
        respond_to: oneshot::Sender<DialogResult<()>>,
    },
    Open {
        dialog: Dialog,
        respond_to: oneshot::Sender<DialogResult<bool>>,
    },
    AddLabels {
        call_id: String,
        labels: Vec<(String, String)>,
        respond_to: oneshot::Sender<DialogResult<()>>,
    },
    Update {
        dialog: Dialog,
        respond_to: oneshot::Sender<DialogResult<()>>,
    },
    Delete {
        call_id: String,
        respond_to: oneshot::Sender<DialogResult<Dialog>>,
    },
    Cancel {
        call_id: String,
        respond_to: oneshot::Sender<DialogResult<()>>,
    },
    CancelByLabel {
        label: String,
        respond_to: oneshot::Sender<usize>,
    },
    Exists {
        call_id: String,
        respond_to: oneshot::Sender<bool>,
    },
    ExistsByLabel {
        label: String,
        respond_to: oneshot::Sender<bool>,
    },
    Details {
        call_id: String,
        respond_to: oneshot::Sender<DialogResult<Dialog>>,
    },
    Select {
        label: Option<String>,
        value: Option<String>,
        respond_to: oneshot::Sender<Vec<Dialog>>,
    },
    Len {
        respond_to: oneshot::Sender<usize>,
    },
}

impl StoreCommand {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            StoreCommand::Write { .. } => "write",
            StoreCommand::Open { .. } => "open",
            StoreCommand::AddLabels { .. } => "add_labels",
            StoreCommand::Update { .. } => "update",
            StoreCommand::Delete { .. } => "delete",
            StoreCommand::Cancel { .. } => "cancel",
            StoreCommand::CancelByLabel { .. } => "cancel_by_label",
            StoreCommand::Exists { .. } => "exists",
            StoreCommand::ExistsByLabel { .. } => "exists_by_label",
            StoreCommand::Details { .. } => "details",
            StoreCommand::Select { .. } => "select",
            StoreCommand::Len { .. } => "len",
        }
    }
}
