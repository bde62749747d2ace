//! Keeps the dialog store in step with the requests flowing through

use anyhow::Context;
use async_trait::async_trait;
use sigflow_dialog_core::{Dialog, DialogStore, DialogStoreError};
use sigflow_sip_core::{Message, Method};
use tracing::debug;

use crate::error::MessageTermination;
use crate::step::{Step, StepContext};

/// Creates, refreshes and cancels dialogs.
///
/// - an INVITE for an unknown Call-ID opens a new dialog
/// - any other request for a known Call-ID adds its label values
/// - BYE and CANCEL cancel it
///
/// Values of the configured headers are copied into the dialog's labels.
/// Messages without a Call-ID cannot belong to a dialog and are terminated.
#[derive(Debug, Clone)]
pub struct DialogTrackingStep<S> {
    store: S,
    label_headers: Vec<String>,
}

impl<S: DialogStore> DialogTrackingStep<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            label_headers: Vec::new(),
        }
    }

    pub fn with_label_headers<I, T>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.label_headers = headers.into_iter().map(Into::into).collect();
        self
    }

    /// `(header, value)` pairs for every configured label header present
    fn labels_of(&self, message: &Message) -> Vec<(String, String)> {
        self.label_headers
            .iter()
            .flat_map(|header| {
                message
                    .headers
                    .get(header)
                    .unwrap_or(&[])
                    .iter()
                    .map(move |value| (header.clone(), value.clone()))
            })
            .collect()
    }
}

#[async_trait]
impl<S: DialogStore> Step for DialogTrackingStep<S> {
    fn name(&self) -> &str {
        "dialog-tracking"
    }

    async fn process(&self, message: &mut Message, _ctx: &StepContext) -> anyhow::Result<()> {
        let Some(call_id) = message.call_id() else {
            return Err(MessageTermination::because("message has no Call-ID").into());
        };

        // responses do not change dialog state
        let Some(method) = message.method() else {
            return Ok(());
        };

        if method.is_teardown() {
            self.store
                .cancel(call_id)
                .await
                .with_context(|| format!("cancelling dialog {}", call_id))?;
            debug!(call_id, %method, "Dialog torn down");
            return Ok(());
        }

        let labels = self.labels_of(message);

        if *method == Method::Invite {
            let mut dialog = Dialog::new(
                call_id,
                message.from().unwrap_or_default(),
                message.to().unwrap_or_default(),
            );
            for (name, value) in labels {
                dialog.merge_label(&name, &value);
            }
            let created = self
                .store
                .open(dialog)
                .await
                .with_context(|| format!("opening dialog {}", call_id))?;
            if created {
                debug!(call_id, "Dialog created");
            }
            return Ok(());
        }

        if labels.is_empty() {
            return Ok(());
        }
        match self.store.add_labels(call_id, labels).await {
            // not part of a dialog we track
            Err(DialogStoreError::NotFound { .. }) => Ok(()),
            result => result.with_context(|| format!("updating dialog {}", call_id)),
        }
    }
}
