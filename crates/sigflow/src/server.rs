//! Server assembly
//!
//! [`Server::build`] boots the dialog store and builds the engine with the
//! standard pipeline:
//!
//! 1. [`RequireSessionDescription`]: INVITEs without SDP go no further
//! 2. [`CallDetailStep`]: BYE completes and submits the call-detail record
//! 3. [`DialogTrackingStep`]: creates, refreshes and cancels dialogs
//!
//! [`Server::run`] serves until the root token is cancelled or the dialog
//! store escalates a fault.

use std::sync::Arc;

use anyhow::Context;
use sigflow_call_engine::{
    CallDetailStep, ChannelMap, DialogTrackingStep, Engine, EngineError, RequireSessionDescription,
    ShutdownPolicy,
};
use sigflow_dialog_core::{DialogStore, DialogStoreConfig, InMemoryDialogStore, StoreFault};
use sigflow_infra_common::{DialogSection, EngineSection, ShutdownMode, SigflowConfig};
use sigflow_sip_core::{BillingEndpoint, CallDetailSender, HttpCallDetail, Message};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// A configured, not yet running, sigflow server
pub struct Server {
    cancel: CancellationToken,
    store: InMemoryDialogStore,
    engine: Arc<Engine>,
    faults: mpsc::Receiver<StoreFault>,
    egress: mpsc::Receiver<Message>,
    errors: mpsc::Receiver<EngineError>,
}

impl Server {
    pub async fn build(config: &SigflowConfig, cancel: CancellationToken) -> anyhow::Result<Self> {
        let (store, faults) =
            InMemoryDialogStore::new(dialog_store_config(&config.dialogs), cancel.child_token());
        store.boot().await.context("booting dialog store")?;

        let (channels, egress, errors) = ChannelMap::bounded(
            config.engine.inbound_capacity,
            config.engine.egress_capacity,
            config.engine.error_capacity,
        );

        let mut builder = Engine::builder(config.engine.address.clone(), cancel.clone(), channels)
            .buffer_size(config.engine.buffer_size)
            .shutdown_policy(shutdown_policy(&config.engine))
            .step(Arc::new(RequireSessionDescription))
            .step(Arc::new(CallDetailStep::new(store.clone())))
            .step(Arc::new(
                DialogTrackingStep::new(store.clone())
                    .with_label_headers(config.dialogs.label_headers.iter().cloned()),
            ));

        if let Some(address) = &config.billing.address {
            let endpoint = BillingEndpoint::new(address.clone(), config.billing.timeout())
                .context("configuring billing endpoint")?;
            info!("Submitting call detail records to {}", endpoint.address());
            builder = builder.detail_factory(move || {
                Box::new(HttpCallDetail::with_endpoint(endpoint.clone())) as Box<dyn CallDetailSender>
            });
        }

        Ok(Self {
            cancel,
            store,
            engine: Arc::new(builder.build()),
            faults,
            egress,
            errors,
        })
    }

    pub fn store(&self) -> &InMemoryDialogStore {
        &self.store
    }

    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Serve until shutdown. A clean shutdown returns `Ok(())`.
    pub async fn run(self) -> anyhow::Result<()> {
        let Server {
            cancel,
            store,
            engine,
            mut faults,
            mut egress,
            mut errors,
        } = self;

        tokio::spawn(async move {
            while let Some(error) = errors.recv().await {
                match error {
                    EngineError::Decode { .. } => warn!("{}", error),
                    _ => error!("{}", error),
                }
            }
        });

        tokio::spawn(async move {
            while let Some(message) = egress.recv().await {
                debug!(call_id = message.call_id().unwrap_or("-"), "Egress message");
            }
        });

        let supervisor = cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                fault = faults.recv() => {
                    if let Some(fault) = fault {
                        error!("Shutting down: {}", fault);
                        supervisor.cancel();
                    }
                }
                _ = supervisor.cancelled() => {}
            }
        });

        let result = engine.listen_and_serve().await;
        cancel.cancel();

        if let Ok(active) = store.len().await {
            debug!(dialogs = active, "Dialogs at shutdown");
        }

        match result {
            Err(EngineError::ShutdownSignalled) | Ok(()) => {
                info!("Shutdown complete");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

fn dialog_store_config(section: &DialogSection) -> DialogStoreConfig {
    DialogStoreConfig {
        request_capacity: section.request_capacity,
        retention: section.retention(),
        sweep_interval: section.sweep_interval(),
        failure_threshold: section.failure_threshold,
    }
}

fn shutdown_policy(section: &EngineSection) -> ShutdownPolicy {
    match section.shutdown {
        ShutdownMode::Immediate => ShutdownPolicy::Immediate,
        ShutdownMode::Drain => ShutdownPolicy::Drain {
            timeout: section.drain_timeout(),
        },
    }
}
