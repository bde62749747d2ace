//! Pipeline ordering, termination and error reporting

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use sigflow_call_engine::{
    EngineError, FnStep, MessageTermination, Pipeline, PipelineOutcome, Step, StepContext,
};
use sigflow_sip_core::Message;

const OPTIONS: &str = "OPTIONS sip:bob@biloxi.example.com SIP/2.0\r\n\
Call-ID: pipeline-test@example.com\r\n\
CSeq: 1 OPTIONS\r\n\
Content-Length: 0\r\n\r\n";

#[derive(Clone, Copy, PartialEq)]
enum Behaviour {
    Succeed,
    Fail,
    Terminate,
}

/// Records its position in a shared log, then behaves as told
struct Recorder {
    name: String,
    position: usize,
    behaviour: Behaviour,
    log: Arc<Mutex<Vec<usize>>>,
}

#[async_trait]
impl Step for Recorder {
    fn name(&self) -> &str {
        &self.name
    }

    async fn process(&self, _message: &mut Message, ctx: &StepContext) -> anyhow::Result<()> {
        assert_eq!(ctx.index(), self.position);
        self.log.lock().unwrap().push(self.position);
        match self.behaviour {
            Behaviour::Succeed => Ok(()),
            Behaviour::Fail => Err(anyhow::anyhow!("step {} failed", self.position)),
            Behaviour::Terminate => Err(anyhow::Error::new(MessageTermination::new())
                .context(format!("step {} is done with this message", self.position))),
        }
    }
}

fn pipeline(behaviours: &[Behaviour], log: &Arc<Mutex<Vec<usize>>>) -> Pipeline {
    let steps = behaviours
        .iter()
        .enumerate()
        .map(|(position, &behaviour)| {
            Arc::new(Recorder {
                name: format!("step-{}", position),
                position,
                behaviour,
                log: Arc::clone(log),
            }) as Arc<dyn Step>
        })
        .collect();
    Pipeline::new(steps)
}

async fn run(pipeline: &Pipeline) -> (PipelineOutcome, Vec<EngineError>) {
    let mut message = Message::decode(OPTIONS.as_bytes().to_vec()).unwrap();
    let (egress, _egress_rx) = mpsc::channel(8);
    let (errors, mut errors_rx) = mpsc::channel(64);
    let mut ctx = StepContext::new(CancellationToken::new(), egress);

    let outcome = pipeline.run(&mut message, &mut ctx, &errors).await;
    drop(errors);

    let mut reported = Vec::new();
    while let Some(error) = errors_rx.recv().await {
        reported.push(error);
    }
    (outcome, reported)
}

/// Termination at step k runs exactly steps 0..=k and reports nothing
#[tokio::test]
async fn test_termination_stops_pipeline() {
    for len in 1..=6 {
        for k in 0..len {
            let mut behaviours = vec![Behaviour::Succeed; len];
            behaviours[k] = Behaviour::Terminate;
            let log = Arc::new(Mutex::new(Vec::new()));

            let (outcome, errors) = run(&pipeline(&behaviours, &log)).await;

            assert_eq!(outcome, PipelineOutcome::Terminated { at: k });
            assert_eq!(*log.lock().unwrap(), (0..=k).collect::<Vec<_>>());
            assert!(errors.is_empty(), "len {} k {}", len, k);
        }
    }
}

/// Ordinary failures are reported once each and never stop the pipeline
#[tokio::test]
async fn test_failures_are_reported_and_pipeline_continues() {
    let behaviours = [
        Behaviour::Fail,
        Behaviour::Succeed,
        Behaviour::Fail,
        Behaviour::Fail,
        Behaviour::Succeed,
    ];
    let log = Arc::new(Mutex::new(Vec::new()));

    let (outcome, errors) = run(&pipeline(&behaviours, &log)).await;

    assert_eq!(outcome, PipelineOutcome::Completed);
    assert_eq!(*log.lock().unwrap(), vec![0, 1, 2, 3, 4]);

    let failed: Vec<usize> = errors
        .iter()
        .map(|error| match error {
            EngineError::Step { index, name, .. } => {
                assert_eq!(name, &format!("step-{}", index));
                *index
            }
            other => panic!("unexpected error {:?}", other),
        })
        .collect();
    assert_eq!(failed, vec![0, 2, 3]);
}

#[tokio::test]
async fn test_failure_before_termination() {
    let behaviours = [Behaviour::Fail, Behaviour::Terminate, Behaviour::Fail];
    let log = Arc::new(Mutex::new(Vec::new()));

    let (outcome, errors) = run(&pipeline(&behaviours, &log)).await;

    assert_eq!(outcome, PipelineOutcome::Terminated { at: 1 });
    assert_eq!(errors.len(), 1);
}

#[tokio::test]
async fn test_cancelled_before_first_step() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let pipeline = pipeline(&[Behaviour::Succeed; 3], &log);

    let mut message = Message::decode(OPTIONS.as_bytes().to_vec()).unwrap();
    let (egress, _egress_rx) = mpsc::channel(1);
    let (errors, _errors_rx) = mpsc::channel(1);
    let cancel = CancellationToken::new();
    cancel.cancel();
    let mut ctx = StepContext::new(cancel, egress);

    let outcome = pipeline.run(&mut message, &mut ctx, &errors).await;
    assert_eq!(outcome, PipelineOutcome::Cancelled { before: 0 });
    assert!(log.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_steps_see_earlier_mutations_and_can_emit() {
    let pipeline = Pipeline::new(vec![
        Arc::new(FnStep::new("tag", |message: &mut Message| {
            message.headers.append("X-Seen-By", "sigflow");
            Ok(())
        })) as Arc<dyn Step>,
        Arc::new(EmitStep),
    ]);

    let mut message = Message::decode(OPTIONS.as_bytes().to_vec()).unwrap();
    let (egress, mut egress_rx) = mpsc::channel(1);
    let (errors, _errors_rx) = mpsc::channel(1);
    let mut ctx = StepContext::new(CancellationToken::new(), egress);

    assert_eq!(
        pipeline.run(&mut message, &mut ctx, &errors).await,
        PipelineOutcome::Completed
    );
    let emitted = egress_rx.recv().await.unwrap();
    assert_eq!(emitted.headers.first("X-Seen-By"), Some("sigflow"));
    assert_eq!(pipeline.step_names().collect::<Vec<_>>(), ["tag", "emit"]);
}

struct EmitStep;

#[async_trait]
impl Step for EmitStep {
    fn name(&self) -> &str {
        "emit"
    }

    async fn process(&self, message: &mut Message, ctx: &StepContext) -> anyhow::Result<()> {
        ctx.emit(message.clone()).await?;
        Ok(())
    }
}
