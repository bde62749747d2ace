//! Actor-backed in-memory dialog store
//!
//! [`InMemoryDialogStore`] is a handle. The registry itself lives inside a
//! task spawned by [`boot`](DialogStore::boot), which handles one
//! [`StoreCommand`] at a time and answers on the command's oneshot channel.
//! The task stops when the parent [`CancellationToken`] fires or when every
//! handle has been dropped.
//!
//! Consecutive failures inside the task (callers that stopped waiting for
//! their answer, rejected writes) are counted; once `failure_threshold` is
//! reached a [`StoreFault`] is pushed on the escalation channel returned by
//! [`InMemoryDialogStore::new`] so a supervisor can shut things down.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use super::command::StoreCommand;
use super::registry::DialogRegistry;
use super::DialogStore;
use crate::config::DialogStoreConfig;
use crate::dialog::Dialog;
use crate::errors::{DialogResult, DialogStoreError, StoreFault};

const FAULT_CAPACITY: usize = 16;

/// Cloneable handle to the dialog registry task
#[derive(Clone)]
pub struct InMemoryDialogStore {
    inner: Arc<StoreHandle>,
}

struct StoreHandle {
    config: DialogStoreConfig,
    cancel: CancellationToken,
    requests: mpsc::Sender<StoreCommand>,
    /// Taken by `boot`
    unbooted: Mutex<Option<(mpsc::Receiver<StoreCommand>, mpsc::Sender<StoreFault>)>>,
    booted: AtomicBool,
}

impl InMemoryDialogStore {
    /// Create a store and the receiving end of its escalation channel.
    ///
    /// The store does nothing until it is booted.
    pub fn new(
        config: DialogStoreConfig,
        cancel: CancellationToken,
    ) -> (Self, mpsc::Receiver<StoreFault>) {
        let (requests, intake) = mpsc::channel(config.request_capacity.max(1));
        let (faults_tx, faults_rx) = mpsc::channel(FAULT_CAPACITY);

        let store = Self {
            inner: Arc::new(StoreHandle {
                config,
                cancel,
                requests,
                unbooted: Mutex::new(Some((intake, faults_tx))),
                booted: AtomicBool::new(false),
            }),
        };
        (store, faults_rx)
    }

    pub fn config(&self) -> &DialogStoreConfig {
        &self.inner.config
    }

    pub fn is_booted(&self) -> bool {
        self.inner.booted.load(Ordering::Acquire)
    }

    /// Whether the owning task has stopped
    pub fn is_closed(&self) -> bool {
        self.inner.requests.is_closed()
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> StoreCommand,
    ) -> DialogResult<T> {
        if !self.is_booted() {
            return Err(DialogStoreError::NotBooted);
        }
        let (respond_to, response) = oneshot::channel();
        self.inner
            .requests
            .send(build(respond_to))
            .await
            .map_err(|_| DialogStoreError::Closed)?;
        response.await.map_err(|_| DialogStoreError::Closed)
    }

    async fn select(&self, label: Option<&str>, value: Option<&str>) -> DialogResult<Vec<Dialog>> {
        self.request(|respond_to| StoreCommand::Select {
            label: label.map(str::to_string),
            value: value.map(str::to_string),
            respond_to,
        })
        .await
    }
}

impl fmt::Debug for InMemoryDialogStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryDialogStore")
            .field("config", &self.inner.config)
            .field("booted", &self.is_booted())
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[async_trait]
impl DialogStore for InMemoryDialogStore {
    async fn boot(&self) -> DialogResult<()> {
        let (intake, faults) = self
            .inner
            .unbooted
            .lock()
            .take()
            .ok_or(DialogStoreError::AlreadyBooted)?;

        let task = StoreTask::new(self.inner.config.clone(), faults);
        tokio::spawn(task.run(intake, self.inner.cancel.clone()));
        self.inner.booted.store(true, Ordering::Release);
        Ok(())
    }

    async fn exists(&self, call_id: &str) -> DialogResult<bool> {
        self.request(|respond_to| StoreCommand::Exists {
            call_id: call_id.to_string(),
            respond_to,
        })
        .await
    }

    async fn write(&self, dialog: Dialog) -> DialogResult<()> {
        self.request(|respond_to| StoreCommand::Write { dialog, respond_to })
            .await?
    }

    async fn open(&self, dialog: Dialog) -> DialogResult<bool> {
        self.request(|respond_to| StoreCommand::Open { dialog, respond_to })
            .await?
    }

    async fn add_labels(&self, call_id: &str, labels: Vec<(String, String)>) -> DialogResult<()> {
        self.request(|respond_to| StoreCommand::AddLabels {
            call_id: call_id.to_string(),
            labels,
            respond_to,
        })
        .await?
    }

    async fn update(&self, dialog: Dialog) -> DialogResult<()> {
        self.request(|respond_to| StoreCommand::Update { dialog, respond_to })
            .await?
    }

    async fn delete(&self, call_id: &str) -> DialogResult<Dialog> {
        self.request(|respond_to| StoreCommand::Delete {
            call_id: call_id.to_string(),
            respond_to,
        })
        .await?
    }

    async fn exists_by_label(&self, label: &str) -> DialogResult<bool> {
        self.request(|respond_to| StoreCommand::ExistsByLabel {
            label: label.to_string(),
            respond_to,
        })
        .await
    }

    async fn details(&self, call_id: &str) -> DialogResult<Dialog> {
        self.request(|respond_to| StoreCommand::Details {
            call_id: call_id.to_string(),
            respond_to,
        })
        .await?
    }

    async fn dialogs(&self) -> DialogResult<Vec<Dialog>> {
        self.select(None, None).await
    }

    async fn dialogs_by_label(&self, label: &str) -> DialogResult<Vec<Dialog>> {
        self.select(Some(label), None).await
    }

    async fn dialogs_by_label_value(&self, label: &str, value: &str) -> DialogResult<Vec<Dialog>> {
        self.select(Some(label), Some(value)).await
    }

    async fn cancel(&self, call_id: &str) -> DialogResult<()> {
        self.request(|respond_to| StoreCommand::Cancel {
            call_id: call_id.to_string(),
            respond_to,
        })
        .await?
    }

    async fn cancel_by_label(&self, label: &str) -> DialogResult<usize> {
        self.request(|respond_to| StoreCommand::CancelByLabel {
            label: label.to_string(),
            respond_to,
        })
        .await
    }

    async fn len(&self) -> DialogResult<usize> {
        self.request(|respond_to| StoreCommand::Len { respond_to }).await
    }
}

/// The owning task
struct StoreTask {
    registry: DialogRegistry,
    config: DialogStoreConfig,
    faults: mpsc::Sender<StoreFault>,
    consecutive_failures: u32,
}

impl StoreTask {
    fn new(config: DialogStoreConfig, faults: mpsc::Sender<StoreFault>) -> Self {
        Self {
            registry: DialogRegistry::new(),
            config,
            faults,
            consecutive_failures: 0,
        }
    }

    async fn run(mut self, mut intake: mpsc::Receiver<StoreCommand>, cancel: CancellationToken) {
        let sweeping = self.config.retention.is_some_and(|r| !r.is_zero());
        let mut sweep = interval(self.config.sweep_interval.max(Duration::from_millis(1)));
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(retention = ?self.config.retention, "Dialog store started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Dialog store cancelled");
                    break;
                }
                command = intake.recv() => match command {
                    Some(command) => self.handle(command),
                    None => {
                        debug!("All dialog store handles dropped");
                        break;
                    }
                },
                _ = sweep.tick(), if sweeping => self.sweep(),
            }
        }

        info!(dialogs = self.registry.len(), "Dialog store stopped");
    }

    fn handle(&mut self, command: StoreCommand) {
        let name = command.name();
        trace!(command = name, "Handling dialog store command");

        let now = Utc::now();
        let removes_on_cancel = self.config.removes_on_cancel();

        let outcome = match command {
            StoreCommand::Write { dialog, respond_to } => {
                let call_id = dialog.call_id.clone();
                let result = self.registry.write(dialog);
                if result.is_ok() {
                    debug!(call_id = %call_id, "Dialog written");
                }
                respond_result(respond_to, result)
            }
            StoreCommand::Open { dialog, respond_to } => {
                let call_id = dialog.call_id.clone();
                let result = self.registry.open(dialog);
                if result == Ok(true) {
                    debug!(call_id = %call_id, "Dialog opened");
                }
                respond_result(respond_to, result)
            }
            StoreCommand::AddLabels {
                call_id,
                labels,
                respond_to,
            } => respond_result(respond_to, self.registry.add_labels(&call_id, &labels)),
            StoreCommand::Update { dialog, respond_to } => {
                respond_result(respond_to, self.registry.update(dialog))
            }
            StoreCommand::Delete { call_id, respond_to } => {
                respond_result(respond_to, self.registry.delete(&call_id))
            }
            StoreCommand::Cancel { call_id, respond_to } => {
                let result = self.registry.cancel(&call_id, now);
                if result.is_ok() {
                    debug!(call_id = %call_id, "Dialog cancelled");
                    if removes_on_cancel {
                        let _ = self.registry.delete(&call_id);
                    }
                }
                respond_result(respond_to, result)
            }
            StoreCommand::CancelByLabel { label, respond_to } => {
                let cancelled = self.registry.cancel_by_label(&label, now);
                if removes_on_cancel {
                    self.registry.remove_terminated();
                }
                debug!(label = %label, cancelled, "Dialogs cancelled by label");
                respond(respond_to, cancelled)
            }
            StoreCommand::Exists { call_id, respond_to } => {
                respond(respond_to, self.registry.exists(&call_id))
            }
            StoreCommand::ExistsByLabel { label, respond_to } => {
                respond(respond_to, self.registry.exists_by_label(&label))
            }
            StoreCommand::Details { call_id, respond_to } => {
                respond_result(respond_to, self.registry.details(&call_id))
            }
            StoreCommand::Select {
                label,
                value,
                respond_to,
            } => {
                let dialogs = self.registry.select(|dialog| match (&label, &value) {
                    (None, _) => true,
                    (Some(label), None) => dialog.has_label(label),
                    (Some(label), Some(value)) => dialog.has_label_value(label, value),
                });
                respond(respond_to, dialogs)
            }
            StoreCommand::Len { respond_to } => respond(respond_to, self.registry.len()),
        };

        match outcome {
            Ok(()) => self.consecutive_failures = 0,
            Err(reason) => self.record_failure(name, reason),
        }
    }

    fn sweep(&mut self) {
        let Some(retention) = self.config.retention else {
            return;
        };
        let removed = self.registry.sweep(Utc::now(), retention);
        if removed > 0 {
            debug!(removed, "Swept expired dialogs");
        }
    }

    fn record_failure(&mut self, command: &'static str, reason: String) {
        self.consecutive_failures += 1;
        warn!(
            command,
            failures = self.consecutive_failures,
            "Dialog store command failed: {}",
            reason
        );

        if self.consecutive_failures < self.config.failure_threshold.max(1) {
            return;
        }

        let fault = StoreFault {
            failures: self.consecutive_failures,
            last_error: reason,
        };
        self.consecutive_failures = 0;

        match self.faults.try_send(fault) {
            Ok(()) => error!("Dialog store escalated a fault"),
            Err(mpsc::error::TrySendError::Full(fault)) => {
                error!("Escalation channel full, dropping fault: {}", fault)
            }
            Err(mpsc::error::TrySendError::Closed(fault)) => {
                debug!("No supervisor listening for fault: {}", fault)
            }
        }
    }
}

fn respond<T>(respond_to: oneshot::Sender<T>, value: T) -> Result<(), String> {
    respond_to
        .send(value)
        .map_err(|_| "caller stopped waiting for the response".to_string())
}

/// Send the result back; rejected writes count as failures
fn respond_result<T>(
    respond_to: oneshot::Sender<DialogResult<T>>,
    result: DialogResult<T>,
) -> Result<(), String> {
    let rejection = match &result {
        Err(e) if e.is_rejection() => Some(e.to_string()),
        _ => None,
    };
    respond(respond_to, result)?;
    rejection.map_or(Ok(()), Err)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (InMemoryDialogStore, mpsc::Receiver<StoreFault>) {
        InMemoryDialogStore::new(DialogStoreConfig::default(), CancellationToken::new())
    }

    #[tokio::test]
    async fn test_operations_require_boot() {
        let (store, _faults) = store();
        assert_eq!(store.exists("call-1").await, Err(DialogStoreError::NotBooted));
        assert_eq!(
            store.write(Dialog::new("call-1", "alice", "bob")).await,
            Err(DialogStoreError::NotBooted)
        );

        store.boot().await.unwrap();
        assert_eq!(store.boot().await, Err(DialogStoreError::AlreadyBooted));
        assert!(!store.exists("call-1").await.unwrap());
    }

    #[tokio::test]
    async fn test_closed_after_cancellation() {
        let cancel = CancellationToken::new();
        let (store, _faults) = InMemoryDialogStore::new(DialogStoreConfig::default(), cancel.clone());
        store.boot().await.unwrap();
        store.write(Dialog::new("call-1", "alice", "bob")).await.unwrap();

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), async {
            while !store.is_closed() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        assert_eq!(store.len().await, Err(DialogStoreError::Closed));
    }

    #[tokio::test]
    async fn test_zero_retention_removes_on_cancel() {
        let config = DialogStoreConfig::default().with_retention(Duration::ZERO);
        let (store, _faults) = InMemoryDialogStore::new(config, CancellationToken::new());
        store.boot().await.unwrap();

        store.write(Dialog::new("call-1", "alice", "bob")).await.unwrap();
        store
            .write(Dialog::new("call-2", "alice", "carol").with_label("trunk", "east"))
            .await
            .unwrap();

        store.cancel("call-1").await.unwrap();
        assert!(!store.exists("call-1").await.unwrap());

        assert_eq!(store.cancel_by_label("trunk").await.unwrap(), 1);
        assert_eq!(store.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_rejections_escalate() {
        let config = DialogStoreConfig::default().with_failure_threshold(3);
        let (store, mut faults) = InMemoryDialogStore::new(config, CancellationToken::new());
        store.boot().await.unwrap();

        store.write(Dialog::new("call-1", "alice", "bob")).await.unwrap();
        store.cancel("call-1").await.unwrap();

        for _ in 0..2 {
            assert!(store.write(Dialog::new("call-1", "alice", "bob")).await.is_err());
        }
        // a success resets the count
        store.write(Dialog::new("call-2", "alice", "bob")).await.unwrap();
        for _ in 0..2 {
            assert!(store.write(Dialog::new("call-1", "alice", "bob")).await.is_err());
        }
        assert!(faults.try_recv().is_err());

        assert!(store.write(Dialog::new("call-1", "alice", "bob")).await.is_err());
        let fault = tokio::time::timeout(Duration::from_secs(1), faults.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fault.failures, 3);
        assert!(fault.last_error.contains("call-1"));
    }
}
