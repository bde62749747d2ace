//! Dialog entity
//!
//! A [`Dialog`] is the server-side record of one signaling session. Values
//! handed out by the store are snapshots; changing one has no effect until it
//! is written back through the store.

mod dialog_impl;

pub use dialog_impl::Dialog;
