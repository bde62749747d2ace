//! Configuration for the in-memory dialog store

use std::time::Duration;

/// Tuning knobs for [`InMemoryDialogStore`](crate::InMemoryDialogStore)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogStoreConfig {
    /// Capacity of the request channel into the owning task
    pub request_capacity: usize,

    /// How long a cancelled dialog stays in the registry.
    ///
    /// `None` keeps it until it is deleted; `Some(Duration::ZERO)` removes it
    /// as soon as it is cancelled.
    pub retention: Option<Duration>,

    /// How often the owning task looks for expired dialogs
    pub sweep_interval: Duration,

    /// Consecutive failures before a [`StoreFault`](crate::StoreFault) is raised
    pub failure_threshold: u32,
}

impl Default for DialogStoreConfig {
    fn default() -> Self {
        Self {
            request_capacity: 1024,
            retention: None,
            sweep_interval: Duration::from_secs(1),
            failure_threshold: 16,
        }
    }
}

impl DialogStoreConfig {
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = Some(retention);
        self
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    pub fn with_request_capacity(mut self, capacity: usize) -> Self {
        self.request_capacity = capacity;
        self
    }

    /// Cancelled dialogs are dropped on cancel rather than retained
    pub(crate) fn removes_on_cancel(&self) -> bool {
        self.retention.is_some_and(|r| r.is_zero())
    }
}
