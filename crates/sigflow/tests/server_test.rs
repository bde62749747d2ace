//! Full server over loopback: INVITE creates a dialog, BYE ends it

use serial_test::serial;
use tokio::net::UdpSocket;
use tokio::time::{sleep, timeout, Duration};
use tokio_util::sync::CancellationToken;

use sigflow::dialog_core::DialogStore;
use sigflow::infra_common::SigflowConfig;
use sigflow::Server;

const CALL_ID: &str = "a84b4c76e66710@pc33.atlanta.example.com";

fn request(method: &str, body: &str) -> Vec<u8> {
    format!(
        "{method} sip:bob@biloxi.example.com SIP/2.0\r\n\
From: alice\r\n\
To: bob\r\n\
Call-ID: {CALL_ID}\r\n\
CSeq: 1 {method}\r\n\
X-Trunk: east\r\n\
Content-Length: {}\r\n\r\n{body}",
        body.len()
    )
    .into_bytes()
}

async fn wait_until<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    timeout(Duration::from_secs(3), async {
        while !check().await {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[tokio::test]
#[serial]
async fn test_call_lifecycle_over_udp() {
    let mut config = SigflowConfig::default();
    config.engine.address = "127.0.0.1:0".to_string();
    config.dialogs.label_headers = vec!["X-Trunk".to_string()];

    let cancel = CancellationToken::new();
    let server = Server::build(&config, cancel.clone()).await.unwrap();
    let store = server.store().clone();
    let engine = server.engine().clone();
    let running = tokio::spawn(server.run());

    let addr = engine.bound_addr().await.unwrap();
    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();

    // no SDP: terminated before the dialog is created
    client.send_to(&request("INVITE", ""), addr).await.unwrap();
    sleep(Duration::from_millis(100)).await;
    assert!(!store.exists(CALL_ID).await.unwrap());

    let sdp = "v=0\r\nc=IN IP4 192.0.2.101\r\nm=audio 49172 RTP/AVP 0\r\n";
    client.send_to(&request("INVITE", sdp), addr).await.unwrap();
    wait_until(|| {
        let store = store.clone();
        async move { store.exists(CALL_ID).await.unwrap_or(false) }
    })
    .await;
    assert_eq!(store.details(CALL_ID).await.unwrap().label_values("X-Trunk"), ["east"]);

    client.send_to(&request("BYE", ""), addr).await.unwrap();
    wait_until(|| {
        let store = store.clone();
        async move {
            matches!(store.details(CALL_ID).await, Ok(dialog) if dialog.is_terminated())
        }
    })
    .await;

    cancel.cancel();
    let result = timeout(Duration::from_secs(3), running).await.unwrap().unwrap();
    assert!(result.is_ok(), "{:?}", result);
}

#[tokio::test]
#[serial]
async fn test_bind_failure_is_an_error() {
    let holder = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let mut config = SigflowConfig::default();
    config.engine.address = holder.local_addr().unwrap().to_string();

    let server = Server::build(&config, CancellationToken::new()).await.unwrap();
    assert!(server.run().await.is_err());
}
