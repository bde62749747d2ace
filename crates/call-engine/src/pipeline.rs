//! Ordered execution of steps over one message

use std::sync::Arc;

use sigflow_sip_core::Message;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::error::{is_message_termination, EngineError};
use crate::step::{Step, StepContext};

/// How a pipeline run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// Every step ran
    Completed,
    /// The step at `at` returned a termination signal
    Terminated { at: usize },
    /// Cancellation was observed before the step at `before` ran
    Cancelled { before: usize },
}

/// The steps applied to every message, in order
#[derive(Clone)]
pub struct Pipeline {
    steps: Arc<[Arc<dyn Step>]>,
}

impl Pipeline {
    pub fn new(steps: Vec<Arc<dyn Step>>) -> Self {
        Self {
            steps: steps.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn step_names(&self) -> impl Iterator<Item = &str> {
        self.steps.iter().map(|step| step.name())
    }

    /// Run every step over `message`.
    ///
    /// The token is checked before each step. Non-termination errors are
    /// pushed on `errors`, waiting for room if the channel is full.
    pub async fn run(
        &self,
        message: &mut Message,
        ctx: &mut StepContext,
        errors: &mpsc::Sender<EngineError>,
    ) -> PipelineOutcome {
        for (index, step) in self.steps.iter().enumerate() {
            if ctx.is_cancelled() {
                debug!(step = index, "Pipeline cancelled");
                return PipelineOutcome::Cancelled { before: index };
            }

            ctx.set_index(index);
            trace!(step = index, name = step.name(), "Running step");

            let Err(error) = step.process(message, ctx).await else {
                continue;
            };

            if is_message_termination(&error) {
                debug!(step = index, name = step.name(), "{:#}", error);
                return PipelineOutcome::Terminated { at: index };
            }

            let report = EngineError::Step {
                index,
                name: step.name().to_string(),
                source: error,
            };
            warn!("{}", report);

            tokio::select! {
                sent = errors.send(report) => {
                    if sent.is_err() {
                        debug!("Error channel closed, step error dropped");
                    }
                }
                _ = ctx.cancellation().cancelled() => {
                    return PipelineOutcome::Cancelled { before: index + 1 };
                }
            }
        }

        PipelineOutcome::Completed
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.step_names()).finish()
    }
}
