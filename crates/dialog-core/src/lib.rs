//! # sigflow-dialog-core
//!
//! Registry of in-progress SIP dialogs, keyed by Call-ID.
//!
//! The registry is owned by a single task. Callers hold a cheap, cloneable
//! [`InMemoryDialogStore`] handle and talk to the owning task over a request
//! channel; each request carries its own response channel. No caller ever
//! holds a reference into the registry itself, so mutation is serialized
//! without locks around the dialog map.
//!
//! ```rust
//! use sigflow_dialog_core::{Dialog, DialogStore, DialogStoreConfig, InMemoryDialogStore};
//! use tokio_util::sync::CancellationToken;
//!
//! # tokio_test::block_on(async {
//! let (store, _faults) = InMemoryDialogStore::new(DialogStoreConfig::default(), CancellationToken::new());
//! store.boot().await?;
//!
//! store.write(Dialog::new("a84b4c76e66710", "alice", "bob").with_label("trunk", "east")).await?;
//! assert!(store.exists("a84b4c76e66710").await?);
//!
//! store.cancel_by_label("trunk").await?;
//! assert!(store.details("a84b4c76e66710").await?.is_terminated());
//! # Ok::<(), sigflow_dialog_core::DialogStoreError>(())
//! # }).unwrap();
//! ```

pub mod config;
pub mod dialog;
pub mod errors;
pub mod store;

pub use config::DialogStoreConfig;
pub use dialog::Dialog;
pub use errors::{DialogResult, DialogStoreError, StoreFault};
pub use store::{DialogStore, InMemoryDialogStore};
