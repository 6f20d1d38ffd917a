#![allow(dead_code)]

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use reqwest::Client;
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::sync::{watch, Semaphore};

use formqueue::clock::{Clock, ManualClock, SystemClock};
use formqueue::corrections::HttpCorrectionProvider;
use formqueue::db::{LocalBackend, SqliteBackend, StorageBackend, StorageKind, SubmissionStore};
use formqueue::delivery::{DeliveryEndpoint, DeliveryError, HttpDelivery};
use formqueue::engine::{SyncEngine, TriggerReceiver};
use formqueue::error::StorageError;
use formqueue::models::{FormData, SubmissionRecord};
use formqueue::network::NetworkMonitor;
use formqueue::notify::{Notification, NotificationCenter};
use formqueue::queue::RetryPolicy;
use formqueue::state::{AppState, Corrections, SharedState};

pub const START: i64 = 1_700_000_000_000;

pub fn form(location: &str) -> FormData {
    let mut form_data = FormData::new();
    form_data.insert("location".to_string(), json!(location));
    form_data.insert("issueType".to_string(), json!("plumbing"));
    form_data.insert("description".to_string(), json!("Water pooling under the sink"));
    form_data
}

// ── Scripted delivery ───────────────────────────────────────────

/// In-process delivery endpoint with scripted outcomes and an optional gate
/// that holds every attempt until a permit is released.
pub struct ScriptedDelivery {
    outcomes: Mutex<VecDeque<bool>>,
    default_ok: AtomicBool,
    gate: Option<Semaphore>,
    started: AtomicUsize,
    delivered: Mutex<Vec<FormData>>,
}

impl ScriptedDelivery {
    pub fn new(default_ok: bool) -> Self {
        Self {
            outcomes: Mutex::new(VecDeque::new()),
            default_ok: AtomicBool::new(default_ok),
            gate: None,
            started: AtomicUsize::new(0),
            delivered: Mutex::new(Vec::new()),
        }
    }

    pub fn gated(default_ok: bool) -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..Self::new(default_ok)
        }
    }

    pub fn set_default(&self, ok: bool) {
        self.default_ok.store(ok, Ordering::SeqCst);
    }

    pub fn push(&self, ok: bool) {
        self.outcomes.lock().unwrap().push_back(ok);
    }

    pub fn release(&self, n: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(n);
        }
    }

    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub fn delivered(&self) -> Vec<FormData> {
        self.delivered.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeliveryEndpoint for ScriptedDelivery {
    async fn deliver(&self, form_data: &FormData) -> Result<(), DeliveryError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.acquire().await.expect("gate closed").forget();
        }

        let ok = self
            .outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.default_ok.load(Ordering::SeqCst));
        if ok {
            self.delivered.lock().unwrap().push(form_data.clone());
            Ok(())
        } else {
            Err(DeliveryError::Status(503))
        }
    }
}

// ── Storage that can be told to fail writes ─────────────────────

pub struct FlakyBackend {
    inner: Arc<dyn StorageBackend>,
    pub fail_writes: AtomicBool,
}

impl FlakyBackend {
    pub fn new(inner: Arc<dyn StorageBackend>) -> Self {
        Self {
            inner,
            fail_writes: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl StorageBackend for FlakyBackend {
    fn kind(&self) -> StorageKind {
        self.inner.kind()
    }

    async fn initialize(&self) -> Result<(), StorageError> {
        self.inner.initialize().await
    }

    async fn list_all(&self) -> Result<Vec<SubmissionRecord>, StorageError> {
        self.inner.list_all().await
    }

    async fn upsert(&self, record: &SubmissionRecord) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Io(std::io::Error::other("disk full")));
        }
        self.inner.upsert(record).await
    }

    async fn delete_by_id(&self, id: &str) -> Result<(), StorageError> {
        self.inner.delete_by_id(id).await
    }
}

pub fn backend(kind: StorageKind, dir: &TempDir) -> Arc<dyn StorageBackend> {
    match kind {
        StorageKind::Local => Arc::new(LocalBackend::new(dir.path().join("queue.json"))),
        StorageKind::Sqlite => Arc::new(SqliteBackend::new(format!(
            "sqlite://{}",
            dir.path().join("queue.db").display()
        ))),
    }
}

// ── Engine harness ──────────────────────────────────────────────

pub struct Harness {
    pub engine: Arc<SyncEngine>,
    pub triggers: TriggerReceiver,
    pub delivery: Arc<ScriptedDelivery>,
    pub clock: Arc<ManualClock>,
    pub notifications: Arc<NotificationCenter>,
    pub network: NetworkMonitor,
    pub store: SubmissionStore,
    pub dir: TempDir,
}

impl Harness {
    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications
            .recent()
            .into_iter()
            .map(|e| e.notification)
            .collect()
    }

    pub fn drain_triggers(&mut self) -> Vec<formqueue::engine::Trigger> {
        let mut seen = Vec::new();
        while let Ok(trigger) = self.triggers.try_recv() {
            seen.push(trigger);
        }
        seen
    }
}

pub async fn harness(kind: StorageKind, online: bool, delivery: ScriptedDelivery) -> Harness {
    let dir = tempfile::tempdir().expect("tempdir");
    let backend = backend(kind, &dir);
    harness_with(backend, dir, online, delivery).await
}

pub async fn harness_with(
    backend: Arc<dyn StorageBackend>,
    dir: TempDir,
    online: bool,
    delivery: ScriptedDelivery,
) -> Harness {
    let store = SubmissionStore::new(backend);
    let delivery = Arc::new(delivery);
    let clock = Arc::new(ManualClock::new(START));
    let notifications = Arc::new(NotificationCenter::new(100));
    let network = NetworkMonitor::new(online);

    let (engine, triggers) = SyncEngine::new(
        store.clone(),
        delivery.clone(),
        notifications.clone(),
        clock.clone(),
        RetryPolicy::default(),
        network.clone(),
    );
    engine.load().await;

    Harness {
        engine,
        triggers,
        delivery,
        clock,
        notifications,
        network,
        store,
        dir,
    }
}

/// Poll `check` until it holds or five seconds pass.
pub async fn wait_for<F: FnMut() -> bool>(mut check: F) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

// ── Fake remote endpoint ────────────────────────────────────────

#[derive(Default)]
pub struct FakeRemote {
    statuses: Mutex<VecDeque<u16>>,
    received: Mutex<Vec<Value>>,
    proposals: Mutex<Value>,
    correction_requests: Mutex<Vec<Value>>,
}

impl FakeRemote {
    pub fn fail_next(&self, status: u16) {
        self.statuses.lock().unwrap().push_back(status);
    }

    pub fn received(&self) -> Vec<Value> {
        self.received.lock().unwrap().clone()
    }

    pub fn propose(&self, proposals: Value) {
        *self.proposals.lock().unwrap() = proposals;
    }

    pub fn correction_requests(&self) -> Vec<Value> {
        self.correction_requests.lock().unwrap().clone()
    }
}

async fn fake_submit(
    State(remote): State<Arc<FakeRemote>>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let status = remote.statuses.lock().unwrap().pop_front().unwrap_or(200);
    if status == 200 {
        remote.received.lock().unwrap().push(body);
        (StatusCode::OK, Json(json!({ "message": "Submission successful" })))
    } else {
        let code = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (code, Json(json!({ "message": "Internal Server Error" })))
    }
}

async fn fake_corrections(
    State(remote): State<Arc<FakeRemote>>,
    Json(body): Json<Value>,
) -> Json<Value> {
    remote.correction_requests.lock().unwrap().push(body);
    let proposals = remote.proposals.lock().unwrap().clone();
    Json(json!({ "correctedDataProposals": proposals }))
}

pub async fn spawn_fake_remote() -> (SocketAddr, Arc<FakeRemote>) {
    let remote = Arc::new(FakeRemote {
        proposals: Mutex::new(json!([])),
        ..Default::default()
    });
    let app = Router::new()
        .route("/api/submit", post(fake_submit))
        .route("/api/corrections", post(fake_corrections))
        .with_state(remote.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind fake remote");
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Fake remote failed");
    });
    (addr, remote)
}

// ── Full app ────────────────────────────────────────────────────

/// A running service instance with its own scratch storage and fake remote.
pub struct TestApp {
    pub addr: SocketAddr,
    pub client: Client,
    pub engine: Arc<SyncEngine>,
    pub remote: Arc<FakeRemote>,
    pub shutdown: watch::Sender<bool>,
    pub dir: TempDir,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn get(&self, path: &str) -> (Value, StatusCode) {
        let resp = self
            .client
            .get(self.url(path))
            .send()
            .await
            .expect("get request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    pub async fn post(&self, path: &str, body: &Value) -> (Value, StatusCode) {
        let resp = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .expect("post request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    pub async fn put(&self, path: &str, body: &Value) -> (Value, StatusCode) {
        let resp = self
            .client
            .put(self.url(path))
            .json(body)
            .send()
            .await
            .expect("put request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    /// Queue a submission, return its JSON.
    pub async fn submit(&self, form_data: &Value) -> Value {
        let (body, status) = self.post("/api/v1/submissions", form_data).await;
        assert_eq!(status, StatusCode::CREATED, "submit failed: {body}");
        body
    }

    pub async fn set_online(&self, online: bool) {
        let (_, status) = self
            .put("/api/v1/network", &json!({ "online": online }))
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    /// Poll a submission until it reaches `status`.
    pub async fn wait_for_status(&self, id: &str, status: &str) -> Value {
        let path = format!("/api/v1/submissions/{id}");
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let (body, _) = self.get(&path).await;
                if body["status"] == status {
                    return body;
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("submission {id} never became {status}"))
    }
}

/// Spawn the service offline, with local storage and corrections enabled.
pub async fn spawn_app() -> TestApp {
    spawn_app_with(true).await
}

pub async fn spawn_app_with(corrections_enabled: bool) -> TestApp {
    let (remote_addr, remote) = spawn_fake_remote().await;
    let dir = tempfile::tempdir().expect("tempdir");

    let store = SubmissionStore::new(backend(StorageKind::Local, &dir));
    let delivery = Arc::new(
        HttpDelivery::new(
            format!("http://{remote_addr}/api/submit"),
            Duration::from_secs(5),
        )
        .unwrap(),
    );
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let notifications = Arc::new(NotificationCenter::new(50));
    let network = NetworkMonitor::new(false);
    let (shutdown, shutdown_rx) = watch::channel(false);

    let (engine, triggers) = SyncEngine::new(
        store,
        delivery,
        notifications.clone(),
        clock,
        RetryPolicy::default(),
        network,
    );
    formqueue::worker::spawn(engine.clone(), triggers, shutdown_rx);
    engine.load().await;

    let corrections = corrections_enabled.then(|| Corrections {
        provider: Arc::new(
            HttpCorrectionProvider::new(
                format!("http://{remote_addr}/api/corrections"),
                Duration::from_secs(5),
            )
            .unwrap(),
        ),
        form_name: "Maintenance Request".to_string(),
    });

    let state: SharedState = Arc::new(AppState {
        engine: engine.clone(),
        notifications,
        corrections,
    });
    let app = formqueue::build_app(state);

    // Bind to random port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind to random port");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Server failed");
    });

    TestApp {
        addr,
        client: Client::new(),
        engine,
        remote,
        shutdown,
        dir,
    }
}
