//! Pipeline steps
//!
//! A step is a named unit of work applied to a message. It returns `Ok(())`,
//! a [`MessageTermination`](crate::MessageTermination) to stop the pipeline
//! for that message, or any other error, which is reported and processing
//! moves on to the next step.

use std::fmt;

use async_trait::async_trait;
use sigflow_sip_core::Message;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::EngineError;

#[async_trait]
pub trait Step: Send + Sync {
    fn name(&self) -> &str;

    async fn process(&self, message: &mut Message, ctx: &StepContext) -> anyhow::Result<()>;
}

/// What a step can see of the pipeline running it
#[derive(Debug, Clone)]
pub struct StepContext {
    cancel: CancellationToken,
    index: usize,
    egress: mpsc::Sender<Message>,
}

impl StepContext {
    pub fn new(cancel: CancellationToken, egress: mpsc::Sender<Message>) -> Self {
        Self {
            cancel,
            index: 0,
            egress,
        }
    }

    /// The message's own cancellation token
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Position of the running step, starting at 0
    pub fn index(&self) -> usize {
        self.index
    }

    pub(crate) fn set_index(&mut self, index: usize) {
        self.index = index;
    }

    /// Push a message on the egress channel
    pub async fn emit(&self, message: Message) -> Result<(), EngineError> {
        self.egress
            .send(message)
            .await
            .map_err(|_| EngineError::ChannelClosed("egress"))
    }
}

/// A step backed by a synchronous closure
pub struct FnStep<F> {
    name: String,
    f: F,
}

impl<F> FnStep<F>
where
    F: Fn(&mut Message) -> anyhow::Result<()> + Send + Sync,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<F> fmt::Debug for FnStep<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnStep").field("name", &self.name).finish()
    }
}

#[async_trait]
impl<F> Step for FnStep<F>
where
    F: Fn(&mut Message) -> anyhow::Result<()> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn process(&self, message: &mut Message, _ctx: &StepContext) -> anyhow::Result<()> {
        (self.f)(message)
    }
}
