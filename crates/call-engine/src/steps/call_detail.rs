//! Fills in and submits the call-detail record when a call ends

use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use sigflow_dialog_core::DialogStore;
use sigflow_sip_core::{CdrError, Message, Method};
use tracing::{debug, info};

use crate::step::{Step, StepContext};

/// On BYE, completes the message's call-detail record and sends it.
///
/// The start time comes from the dialog when the store still knows it.
/// Without a billing address the report is logged instead.
#[derive(Debug, Clone)]
pub struct CallDetailStep<S> {
    store: S,
}

impl<S: DialogStore> CallDetailStep<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<S: DialogStore> Step for CallDetailStep<S> {
    fn name(&self) -> &str {
        "call-detail"
    }

    async fn process(&self, message: &mut Message, _ctx: &StepContext) -> anyhow::Result<()> {
        if message.method() != Some(&Method::Bye) {
            return Ok(());
        }
        let Some(call_id) = message.call_id().map(str::to_string) else {
            return Ok(());
        };

        let dialog = self.store.details(&call_id).await.ok();
        let from = message.from().unwrap_or_default().to_string();
        let to = message.to().unwrap_or_default().to_string();

        if let Some(record) = message.detail.record_mut() {
            record.call_id = call_id.clone();
            record.from = from;
            record.to = to;
            record.start = dialog.as_ref().map(|d| d.start);
            record.end = Some(dialog.and_then(|d| d.end).unwrap_or_else(Utc::now));
        }

        match message.detail.send().await {
            Ok(()) => {
                debug!(call_id = %call_id, "Call detail record sent");
                Ok(())
            }
            Err(CdrError::NotConfigured) => {
                let report = message.detail.report()?;
                info!(call_id = %call_id, "Call detail record:\n{}", report);
                Ok(())
            }
            Err(e) => Err(e).with_context(|| format!("sending call detail record for {}", call_id)),
        }
    }
}
