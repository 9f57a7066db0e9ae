//! In-process stand-in for the group-chat backend.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, Method, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{any, get, post},
};
use serde_json::{Value, json};
use url::Url;

use groupchat_client::services::auth::{
    AuthCoordinator, HttpTokenRefresher, LoginRedirect,
};
use groupchat_client::services::token_store::{
    CredentialStoreExt, MemoryTokenStore, StoreResult, TokenStore,
};
use groupchat_client::{ApiRequest, Credential};

pub const USER_ID: i64 = 42;

/// One request as the backend saw it.
#[derive(Clone, Debug)]
pub struct Seen {
    pub path: String,
    pub method: String,
    pub authorization: Option<String>,
    pub request_id: Option<String>,
    pub body: Vec<u8>,
}

pub struct BackendState {
    valid_access: Mutex<String>,
    valid_refresh: Mutex<String>,
    issued: AtomicUsize,
    pub refresh_calls: AtomicUsize,
    pub unauthorized_served: AtomicUsize,
    pub requests: AtomicUsize,
    // refresh answers only after this many 401s went out
    hold_refresh_until: AtomicUsize,
    refresh_status: Mutex<StatusCode>,
    reject_everything: AtomicBool,
    // the real backend leaves user_id out of login/register answers
    login_includes_user_id: AtomicBool,
    pub seen: Mutex<Vec<Seen>>,
}

impl BackendState {
    fn record(&self, path: &str, method: &Method, headers: &HeaderMap, body: &[u8]) {
        self.requests.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(Seen {
            path: path.to_string(),
            method: method.to_string(),
            authorization: header_str(headers, header::AUTHORIZATION.as_str()),
            request_id: header_str(headers, "x-request-id"),
            body: body.to_vec(),
        });
    }

    fn access_ok(&self, headers: &HeaderMap) -> bool {
        if self.reject_everything.load(Ordering::SeqCst) {
            return false;
        }
        let expected = format!("Bearer {}", self.valid_access.lock().unwrap());
        header_str(headers, header::AUTHORIZATION.as_str()).as_deref() == Some(expected.as_str())
    }

    fn unauthorized(&self) -> Response {
        self.unauthorized_served.fetch_add(1, Ordering::SeqCst);
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "detail": "Could not validate credentials" })),
        )
            .into_response()
    }

    fn issue(&self) -> Value {
        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        let access = format!("access-{n}");
        let refresh = format!("refresh-{n}");
        *self.valid_access.lock().unwrap() = access.clone();
        *self.valid_refresh.lock().unwrap() = refresh.clone();
        json!({
            "access_token": access,
            "refresh_token": refresh,
            "user_id": USER_ID,
            "token_type": "bearer",
        })
    }

    // Body of a successful login/register: `{message, access_token, refresh_token, token_type}`.
    fn issue_for_login(&self, message: &str) -> Value {
        let mut tokens = self.issue();
        tokens["message"] = json!(message);
        if !self.login_includes_user_id.load(Ordering::SeqCst) {
            if let Some(fields) = tokens.as_object_mut() {
                fields.remove("user_id");
            }
        }
        tokens
    }
}

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

pub struct Backend {
    pub base: Url,
    pub state: Arc<BackendState>,
}

impl Backend {
    /// Start a backend that accepts `access` / `refresh` as the current tokens.
    pub async fn start(access: &str, refresh_token: &str) -> Self {
        let state = Arc::new(BackendState {
            valid_access: Mutex::new(access.to_string()),
            valid_refresh: Mutex::new(refresh_token.to_string()),
            issued: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
            unauthorized_served: AtomicUsize::new(0),
            requests: AtomicUsize::new(0),
            hold_refresh_until: AtomicUsize::new(0),
            refresh_status: Mutex::new(StatusCode::OK),
            reject_everything: AtomicBool::new(false),
            login_includes_user_id: AtomicBool::new(false),
            seen: Mutex::new(Vec::new()),
        });

        let app = Router::new()
            .route("/api/v1/echo", any(echo))
            .route("/api/v1/groups/missing", get(missing_group))
            .route("/api/v1/auth/refresh", post(refresh))
            .route("/api/v1/auth/login", post(login))
            .route("/api/v1/auth/register", post(register))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base: Url::parse(&format!("http://{addr}")).unwrap(),
            state,
        }
    }

    pub fn url(&self, path: &str) -> Url {
        self.base.join(path).unwrap()
    }

    pub fn echo(&self) -> ApiRequest {
        ApiRequest::get(self.url("/api/v1/echo"))
    }

    /// Server-side expiry: the current access token stops working.
    pub fn expire_access_token(&self) {
        *self.state.valid_access.lock().unwrap() = "expired-on-server".to_string();
    }

    pub fn hold_refresh_until(&self, unauthorized: usize) {
        self.state
            .hold_refresh_until
            .store(unauthorized, Ordering::SeqCst);
    }

    pub fn fail_refresh_with(&self, status: StatusCode) {
        *self.state.refresh_status.lock().unwrap() = status;
    }

    pub fn include_user_id_on_login(&self) {
        self.state
            .login_includes_user_id
            .store(true, Ordering::SeqCst);
    }

    pub fn reject_everything(&self) {
        self.state.reject_everything.store(true, Ordering::SeqCst);
    }

    pub fn refresh_calls(&self) -> usize {
        self.state.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> usize {
        self.state.requests.load(Ordering::SeqCst)
    }

    pub fn seen(&self, path: &str) -> Vec<Seen> {
        self.state
            .seen
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.path == path)
            .cloned()
            .collect()
    }
}

async fn echo(
    State(state): State<Arc<BackendState>>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    state.record("/api/v1/echo", &method, &headers, &body);
    if !state.access_ok(&headers) {
        return state.unauthorized();
    }

    let body_json: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    Json(json!({
        "method": method.as_str(),
        "authorization": header_str(&headers, "authorization"),
        "x_custom": header_str(&headers, "x-custom"),
        "body": body_json,
    }))
    .into_response()
}

async fn missing_group(
    State(state): State<Arc<BackendState>>,
    method: Method,
    headers: HeaderMap,
) -> Response {
    state.record("/api/v1/groups/missing", &method, &headers, &[]);
    if !state.access_ok(&headers) {
        return state.unauthorized();
    }
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "detail": "Group not found" })),
    )
        .into_response()
}

async fn refresh(
    State(state): State<Arc<BackendState>>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    state.record("/api/v1/auth/refresh", &method, &headers, &body);
    state.refresh_calls.fetch_add(1, Ordering::SeqCst);

    // Let every concurrent caller see its 401 before answering.
    let hold = state.hold_refresh_until.load(Ordering::SeqCst);
    for _ in 0..500 {
        if state.unauthorized_served.load(Ordering::SeqCst) >= hold {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    tokio::time::sleep(Duration::from_millis(100)).await;

    let status = *state.refresh_status.lock().unwrap();
    if status != StatusCode::OK {
        return (status, Json(json!({ "detail": "Refresh token expired" }))).into_response();
    }

    let expected = format!("Bearer {}", state.valid_refresh.lock().unwrap());
    if header_str(&headers, "authorization").as_deref() != Some(expected.as_str()) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "detail": "Expected a refresh token" })),
        )
            .into_response();
    }

    Json(state.issue()).into_response()
}

async fn login(
    State(state): State<Arc<BackendState>>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    state.record("/api/v1/auth/login", &method, &headers, &body);
    let req: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    if req["email"] == "student@urfu.me" && req["password"] == "correct horse" {
        return Json(state.issue_for_login("Login successful")).into_response();
    }
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "detail": "Invalid email or password" })),
    )
        .into_response()
}

async fn register(
    State(state): State<Arc<BackendState>>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    state.record("/api/v1/auth/register", &method, &headers, &body);
    let req: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    let email = req["email"].as_str().unwrap_or_default();
    if !email.ends_with("@urfu.me") {
        return (
            StatusCode::FORBIDDEN,
            Json(json!({ "detail": "Only university accounts may register" })),
        )
            .into_response();
    }
    Json(state.issue_for_login("User registered successfully")).into_response()
}

/// Redirect sink that only counts.
#[derive(Default)]
pub struct CountingRedirect {
    pub count: AtomicUsize,
}

impl CountingRedirect {
    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

impl LoginRedirect for CountingRedirect {
    fn redirect_to_login(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }
}

/// Memory store that counts mutations.
#[derive(Clone, Default)]
pub struct RecordingStore {
    pub inner: MemoryTokenStore,
    pub writes: Arc<AtomicUsize>,
}

impl RecordingStore {
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl TokenStore for RecordingStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.remove(key)
    }
}

pub fn credential(access: &str, refresh: &str) -> Credential {
    Credential {
        access_token: access.to_string(),
        refresh_token: refresh.to_string(),
        user_id: USER_ID,
    }
}

pub struct Harness {
    pub backend: Backend,
    pub store: RecordingStore,
    pub redirect: Arc<CountingRedirect>,
    pub coordinator: AuthCoordinator,
}

/// Backend plus a coordinator whose store holds `stored` (if any).
///
/// The backend accepts `access-0` / `refresh-0` at start.
pub async fn harness(stored: Option<Credential>) -> Harness {
    let backend = Backend::start("access-0", "refresh-0").await;
    let store = RecordingStore::default();
    if let Some(credential) = stored {
        store.inner.save_credential(&credential).unwrap();
    }
    let redirect = Arc::new(CountingRedirect::default());

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap();
    let refresher = Arc::new(HttpTokenRefresher::new(client.clone(), &backend.base).unwrap());
    let coordinator = AuthCoordinator::new(
        client,
        Arc::new(store.clone()),
        refresher,
        redirect.clone(),
    );

    Harness {
        backend,
        store,
        redirect,
        coordinator,
    }
}
