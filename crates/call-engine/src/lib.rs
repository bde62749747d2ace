//! # sigflow-call-engine
//!
//! Listens for SIP datagrams, decodes them and runs every message through an
//! ordered pipeline of [`Step`]s in its own task.
//!
//! ```text
//! UDP socket ─▶ receive loop ─▶ inbound channel ─▶ dispatch loop
//!                    │                                  │
//!               decode errors                  one task per message
//!                    ▼                                  ▼
//!              error channel ◀──── step errors ──── step[0] … step[n-1]
//!                                                       │
//!                                                  egress channel
//! ```
//!
//! A step stops the pipeline for its message by returning a
//! [`MessageTermination`]; any other error is reported on the error channel
//! and the next step runs.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use sigflow_call_engine::{ChannelMap, Engine, FnStep, MessageTermination, Step};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() {
//! let (channels, _egress, mut errors) = ChannelMap::bounded(64, 64, 64);
//! let steps: Vec<Arc<dyn Step>> = vec![Arc::new(FnStep::new("require-call-id", |message| {
//!     match message.call_id() {
//!         Some(_) => Ok(()),
//!         None => Err(MessageTermination::because("no Call-ID").into()),
//!     }
//! }))];
//!
//! let cancel = CancellationToken::new();
//! let engine = Engine::new("127.0.0.1:5060", cancel.clone(), channels, steps);
//!
//! tokio::spawn(async move {
//!     while let Some(error) = errors.recv().await {
//!         eprintln!("{}", error);
//!     }
//! });
//!
//! let result = engine.listen_and_serve().await;
//! assert!(result.unwrap_err().is_shutdown());
//! # }
//! ```

pub mod channels;
pub mod engine;
pub mod error;
pub mod pipeline;
pub mod step;
pub mod steps;

pub use channels::ChannelMap;
pub use engine::{DetailFactory, Engine, EngineBuilder, ShutdownPolicy, DEFAULT_BUFFER_SIZE};
pub use error::{is_message_termination, EngineError, MessageTermination, Result};
pub use pipeline::{Pipeline, PipelineOutcome};
pub use step::{FnStep, Step, StepContext};
pub use steps::{CallDetailStep, DialogTrackingStep, RequireSessionDescription};
