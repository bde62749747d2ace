//! # sigflow
//!
//! A SIP/SDP signaling pipeline. Datagrams are split into their SIP and SDP
//! parts, decoded into messages and pushed through an ordered pipeline of
//! steps; the built-in steps keep a registry of active dialogs and submit
//! call-detail records when calls end.
//!
//! The component crates are re-exported here, and [`server::Server`] wires
//! them together from a [`SigflowConfig`](infra_common::SigflowConfig).

pub use sigflow_call_engine as call_engine;
pub use sigflow_dialog_core as dialog_core;
pub use sigflow_infra_common as infra_common;
pub use sigflow_sip_core as sip_core;

pub mod server;

pub use server::Server;

pub mod prelude {
    pub use crate::call_engine::{
        ChannelMap, Engine, EngineError, MessageTermination, ShutdownPolicy, Step, StepContext,
    };
    pub use crate::dialog_core::{Dialog, DialogStore, InMemoryDialogStore};
    pub use crate::infra_common::SigflowConfig;
    pub use crate::server::Server;
    pub use crate::sip_core::prelude::*;
}
