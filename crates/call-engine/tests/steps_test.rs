//! Built-in steps against a real dialog store

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use sigflow_call_engine::{
    is_message_termination, CallDetailStep, DialogTrackingStep, RequireSessionDescription, Step,
    StepContext,
};
use sigflow_dialog_core::{DialogStore, DialogStoreConfig, InMemoryDialogStore};
use sigflow_sip_core::{
    CallDetailRecord, CallDetailReporter, CallDetailSender, CdrError, Message,
};

const CALL_ID: &str = "a84b4c76e66710@pc33.atlanta.example.com";

fn request(method: &str, extra_headers: &str, sdp: bool) -> Message {
    let body = if sdp {
        "v=0\r\nc=IN IP4 192.0.2.101\r\nm=audio 49172 RTP/AVP 0\r\n"
    } else {
        ""
    };
    let raw = format!(
        "{method} sip:bob@biloxi.example.com SIP/2.0\r\n\
From: alice\r\n\
To: bob\r\n\
Call-ID: {CALL_ID}\r\n\
CSeq: 1 {method}\r\n\
{extra_headers}\
Content-Length: {}\r\n\r\n{body}",
        body.len()
    );
    Message::decode(raw.into_bytes()).unwrap()
}

fn ctx() -> StepContext {
    let (egress, _rx) = mpsc::channel(1);
    StepContext::new(CancellationToken::new(), egress)
}

async fn store() -> InMemoryDialogStore {
    let (store, _faults) =
        InMemoryDialogStore::new(DialogStoreConfig::default(), CancellationToken::new());
    store.boot().await.unwrap();
    store
}

#[tokio::test]
async fn test_dialog_lifecycle() {
    let store = store().await;
    let step = DialogTrackingStep::new(store.clone()).with_label_headers(["X-Trunk"]);

    let mut invite = request("INVITE", "X-Trunk: east\r\n", true);
    step.process(&mut invite, &ctx()).await.unwrap();

    let dialog = store.details(CALL_ID).await.unwrap();
    assert!(dialog.active);
    assert_eq!(dialog.from, "alice");
    assert_eq!(dialog.to, "bob");
    assert_eq!(dialog.label_values("X-Trunk"), ["east"]);

    let mut info = request("INFO", "X-Trunk: west\r\n", false);
    step.process(&mut info, &ctx()).await.unwrap();
    assert_eq!(
        store.details(CALL_ID).await.unwrap().label_values("X-Trunk"),
        ["east", "west"]
    );

    let mut bye = request("BYE", "", false);
    step.process(&mut bye, &ctx()).await.unwrap();
    let dialog = store.details(CALL_ID).await.unwrap();
    assert!(dialog.is_terminated());
    assert!(dialog.end.is_some());
}

#[tokio::test]
async fn test_out_of_dialog_requests_are_ignored() {
    let store = store().await;
    let step = DialogTrackingStep::new(store.clone());

    let mut options = request("OPTIONS", "", false);
    step.process(&mut options, &ctx()).await.unwrap();
    assert_eq!(store.len().await.unwrap(), 0);

    // BYE for an unknown dialog is a reportable failure
    let mut bye = request("BYE", "", false);
    let error = step.process(&mut bye, &ctx()).await.unwrap_err();
    assert!(!is_message_termination(&error));
}

#[tokio::test]
async fn test_missing_call_id_terminates() {
    let step = DialogTrackingStep::new(store().await);
    let mut message = Message::decode(
        b"OPTIONS sip:bob@biloxi.example.com SIP/2.0\r\nContent-Length: 0\r\n".to_vec(),
    )
    .unwrap();

    let error = step.process(&mut message, &ctx()).await.unwrap_err();
    assert!(is_message_termination(&error));
}

#[tokio::test]
async fn test_require_session_description() {
    let guard = RequireSessionDescription;

    let mut with_sdp = request("INVITE", "", true);
    assert!(guard.process(&mut with_sdp, &ctx()).await.is_ok());

    let mut without_sdp = request("INVITE", "", false);
    let error = guard.process(&mut without_sdp, &ctx()).await.unwrap_err();
    assert!(is_message_termination(&error));

    let mut bye = request("BYE", "", false);
    assert!(guard.process(&mut bye, &ctx()).await.is_ok());
}

/// Captures the record it was asked to send
#[derive(Debug, Clone, Default)]
struct CapturingDetail {
    record: CallDetailRecord,
    sent: Arc<Mutex<Vec<CallDetailRecord>>>,
}

impl CallDetailReporter for CapturingDetail {
    fn report(&self) -> Result<String, CdrError> {
        Ok(format!("{:?}", self.record))
    }

    fn record(&self) -> Option<&CallDetailRecord> {
        Some(&self.record)
    }

    fn record_mut(&mut self) -> Option<&mut CallDetailRecord> {
        Some(&mut self.record)
    }
}

#[async_trait]
impl CallDetailSender for CapturingDetail {
    async fn send(&self) -> Result<(), CdrError> {
        self.sent.lock().unwrap().push(self.record.clone());
        Ok(())
    }

    fn box_clone(&self) -> Box<dyn CallDetailSender> {
        Box::new(self.clone())
    }
}

#[tokio::test]
async fn test_call_detail_on_bye() {
    let store = store().await;
    let tracking = DialogTrackingStep::new(store.clone());
    let billing = CallDetailStep::new(store.clone());

    let mut invite = request("INVITE", "", true);
    tracking.process(&mut invite, &ctx()).await.unwrap();
    let started = store.details(CALL_ID).await.unwrap().start;

    let sent = Arc::new(Mutex::new(Vec::new()));
    let detail = CapturingDetail {
        sent: Arc::clone(&sent),
        ..Default::default()
    };

    // INVITEs are not billed
    let mut invite = request("INVITE", "", true).with_detail(Box::new(detail.clone()));
    billing.process(&mut invite, &ctx()).await.unwrap();
    assert!(sent.lock().unwrap().is_empty());

    let mut bye = request("BYE", "", false).with_detail(Box::new(detail));
    billing.process(&mut bye, &ctx()).await.unwrap();

    let sent = sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    let record = &sent[0];
    assert_eq!(record.call_id, CALL_ID);
    assert_eq!(record.from, "alice");
    assert_eq!(record.to, "bob");
    assert_eq!(record.start, Some(started));
    assert!(record.end.is_some());
}

#[tokio::test]
async fn test_call_detail_without_billing_address_is_logged() {
    let billing = CallDetailStep::new(store().await);
    let mut bye = request("BYE", "", false);
    assert!(billing.process(&mut bye, &ctx()).await.is_ok());
    assert_eq!(bye.detail.record().unwrap().call_id, CALL_ID);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_requests_keep_every_label() {
    for _ in 0..50 {
        let store = store().await;
        let step = Arc::new(DialogTrackingStep::new(store.clone()).with_label_headers(["X-Trunk"]));

        let mut invite = request("INVITE", "X-Trunk: t0\r\n", true);
        step.process(&mut invite, &ctx()).await.unwrap();
        let started = store.details(CALL_ID).await.unwrap().start;

        let mut tasks = Vec::new();
        for i in 1..=6 {
            let info_step = Arc::clone(&step);
            tasks.push(tokio::spawn(async move {
                let mut info = request("INFO", &format!("X-Trunk: t{i}\r\n"), false);
                info_step.process(&mut info, &ctx()).await
            }));
            // a retransmitted INVITE must not reset the dialog
            let step = Arc::clone(&step);
            tasks.push(tokio::spawn(async move {
                let mut invite = request("INVITE", "X-Trunk: t0\r\n", true);
                step.process(&mut invite, &ctx()).await
            }));
        }
        for result in futures::future::join_all(tasks).await {
            result.unwrap().unwrap();
        }

        let dialog = store.details(CALL_ID).await.unwrap();
        let mut values = dialog.label_values("X-Trunk").to_vec();
        values.sort();
        assert_eq!(values, ["t0", "t1", "t2", "t3", "t4", "t5", "t6"]);
        assert_eq!(dialog.start, started);
    }
}
