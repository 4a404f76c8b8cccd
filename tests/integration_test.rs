use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use rsa::pkcs8::DecodePublicKey;
use rsa::{Pkcs1v15Encrypt, RsaPublicKey};
use sealed_relay::api::create_api_server;
use sealed_relay::config::RelayConfig;
use sealed_relay::crypto::{write_keypair, AtRestCipher, SubmissionDecryptor};
use sealed_relay::delivery::{
    DeliveryChannel, DeliveryError, DeliveryResult, DeliveryTransport, RecipientId,
    TelegramConfig,
};
use sealed_relay::queue::{MemoryQueue, QueueStore};
use sealed_relay::relay::{DispatchOutcome, RelayWorker, SubmissionIntake};
use std::collections::HashSet;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tower::ServiceExt;

/// Captures every delivery attempt instead of calling a real messenger
#[derive(Default)]
struct CapturingTransport {
    sent: Mutex<Vec<(String, String)>>,
    failing: HashSet<String>,
    stalling: HashSet<String>,
}

impl CapturingTransport {
    fn sent_to(&self, id: &str) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .filter(|(r, _)| r == id)
            .map(|(_, text)| text.clone())
            .collect()
    }
}

impl DeliveryTransport for CapturingTransport {
    fn send<'a>(&'a self, recipient: &'a RecipientId, text: &'a str) -> BoxFuture<'a, DeliveryResult<()>> {
        async move {
            self.sent
                .lock()
                .push((recipient.to_string(), text.to_string()));
            if self.stalling.contains(recipient.as_str()) {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            if self.failing.contains(recipient.as_str()) {
                return Err(DeliveryError::Rejected {
                    status: 403,
                    description: "bot was blocked by the user".to_string(),
                });
            }
            Ok(())
        }
        .boxed()
    }

    fn name(&self) -> &'static str {
        "capturing"
    }
}

/// Key pair written the same way `sealed-relay keygen` does it
struct Keys {
    _dir: TempDir,
    decryptor_path: std::path::PathBuf,
    public: RsaPublicKey,
}

fn keys() -> &'static Keys {
    static KEYS: OnceLock<Keys> = OnceLock::new();
    KEYS.get_or_init(|| {
        let dir = TempDir::new().unwrap();
        let (private_path, public_path) = write_keypair(dir.path(), 2048).unwrap();
        let public_pem = std::fs::read_to_string(public_path).unwrap();
        Keys {
            decryptor_path: private_path,
            public: RsaPublicKey::from_public_key_pem(&public_pem).unwrap(),
            _dir: dir,
        }
    })
}

fn browser_encrypt(plaintext: &str) -> String {
    let ct = keys()
        .public
        .encrypt(&mut rand::thread_rng(), Pkcs1v15Encrypt, plaintext.as_bytes())
        .unwrap();
    STANDARD.encode(ct)
}

struct Relay {
    rt: tokio::runtime::Runtime,
    queue: Arc<MemoryQueue>,
    intake: Arc<SubmissionIntake>,
    worker: RelayWorker,
}

fn relay(recipients: &[&str], transport: Arc<CapturingTransport>, timeout: Duration) -> Relay {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .unwrap();

    let config = Arc::new(RelayConfig {
        recipients: recipients.iter().map(|r| r.to_string()).collect(),
        telegram: TelegramConfig {
            bot_token: "unused".to_string(),
            ..Default::default()
        },
        poll_timeout_ms: 50,
        delivery_timeout_ms: timeout.as_millis() as u64,
        ..Default::default()
    });
    assert!(config.validate().is_ok());

    let queue = Arc::new(MemoryQueue::new());
    let cipher = Arc::new(AtRestCipher::generate());
    let decryptor = SubmissionDecryptor::from_pem_file(&keys().decryptor_path).unwrap();

    let intake = Arc::new(SubmissionIntake::new(decryptor, cipher.clone(), queue.clone()));
    let channel = DeliveryChannel::new(rt.handle().clone(), transport)
        .with_timeout(config.delivery_timeout());
    let worker = RelayWorker::new(queue.clone(), cipher, channel, config);

    Relay {
        rt,
        queue,
        intake,
        worker,
    }
}

#[test]
fn test_submission_reaches_every_recipient() {
    let transport = Arc::new(CapturingTransport::default());
    let relay = relay(&["100", "200", "300"], transport.clone(), Duration::from_secs(2));

    relay
        .intake
        .accept(browser_encrypt("hello").as_bytes())
        .unwrap();
    assert_eq!(relay.queue.len().unwrap(), 1);

    let DispatchOutcome::Delivered(report) = relay.worker.run_once().unwrap() else {
        panic!("expected a delivery");
    };
    assert_eq!(report.delivered.len(), 3);

    for id in ["100", "200", "300"] {
        assert_eq!(
            transport.sent_to(id),
            vec!["📧 New form submission:\n\nhello".to_string()]
        );
    }
    assert!(relay.queue.is_empty().unwrap());
}

#[test]
fn test_failing_and_stalled_recipients_are_isolated() {
    let transport = Arc::new(CapturingTransport {
        failing: ["blocked".to_string()].into_iter().collect(),
        stalling: ["slow".to_string()].into_iter().collect(),
        ..Default::default()
    });
    let timeout = Duration::from_millis(300);
    let relay = relay(&["blocked", "slow", "ok"], transport.clone(), timeout);

    relay
        .intake
        .accept(browser_encrypt("report").as_bytes())
        .unwrap();

    let start = Instant::now();
    let DispatchOutcome::Delivered(report) = relay.worker.run_once().unwrap() else {
        panic!("expected a delivery");
    };
    assert!(start.elapsed() < Duration::from_secs(2));

    assert_eq!(report.delivered.len(), 1);
    assert_eq!(report.delivered[0].as_str(), "ok");
    assert_eq!(report.failed.len(), 2);
    assert!(report
        .failed
        .iter()
        .any(|(id, e)| id.as_str() == "slow" && *e == DeliveryError::Timeout(timeout)));
    assert_eq!(transport.sent_to("ok").len(), 1);
}

#[test]
fn test_http_submission_flows_through_worker() {
    let transport = Arc::new(CapturingTransport::default());
    let relay = relay(&["42"], transport.clone(), Duration::from_secs(2));
    let app = create_api_server(relay.intake.clone());

    let body = format!(
        "encrypted_message={}",
        browser_encrypt("sent from a browser")
            .replace('+', "%2B")
            .replace('/', "%2F")
            .replace('=', "%3D")
    );
    let response = relay.rt.block_on(async {
        app.oneshot(
            Request::post("/submit")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap()
    });
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let handle = relay.worker.spawn().unwrap();
    let deadline = Instant::now() + Duration::from_secs(5);
    while transport.sent_to("42").is_empty() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(10));
    }
    let stats = handle.shutdown().unwrap();

    assert_eq!(stats.entries_dispatched, 1);
    assert!(transport.sent_to("42")[0].ends_with("sent from a browser"));
    assert!(relay.queue.is_empty().unwrap());
}
