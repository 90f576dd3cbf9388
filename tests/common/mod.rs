//! Shared fixtures: an in-process fake backend and app state pointed at it.
#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use axum::{
    body::{Body, Bytes},
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::{header, HeaderMap, Method, Request, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json, Router,
};
use http_body_util::BodyExt;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use stockwatch::{
    config::{Environment, Settings},
    AppState,
};
use tokio::sync::broadcast;

pub const KICK: &str = "__kick__";

#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub authorization: Option<String>,
    pub body: Value,
}

/// Fake backend: records REST calls, answers from a canned table, and
/// serves a Socket.IO push endpoint at `/socket.io/`.
#[derive(Clone)]
pub struct MockBackend {
    requests: Arc<Mutex<Vec<Recorded>>>,
    responses: Arc<Mutex<HashMap<(Method, String), (StatusCode, Value)>>>,
    pub ws_frames: Arc<Mutex<Vec<String>>>,
    pub ws_auth: Arc<Mutex<Vec<Option<String>>>>,
    pub ws_connections: Arc<AtomicUsize>,
    pub ws_closed: Arc<AtomicUsize>,
    pub reject_ws: Arc<AtomicBool>,
    pub reject_namespace: Arc<AtomicBool>,
    // pingInterval and pingTimeout announced in the open packet
    pub heartbeat_ms: Arc<AtomicU64>,
    pub pongs: Arc<AtomicUsize>,
    push_tx: broadcast::Sender<String>,
    pub api_base: String,
    pub push_url: String,
}

impl MockBackend {
    pub async fn spawn() -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock backend");
        let addr = listener.local_addr().expect("mock addr");
        let (push_tx, _) = broadcast::channel(64);

        let mock = MockBackend {
            requests: Arc::default(),
            responses: Arc::default(),
            ws_frames: Arc::default(),
            ws_auth: Arc::default(),
            ws_connections: Arc::default(),
            ws_closed: Arc::default(),
            reject_ws: Arc::default(),
            reject_namespace: Arc::default(),
            heartbeat_ms: Arc::new(AtomicU64::new(25_000)),
            pongs: Arc::default(),
            push_tx,
            api_base: format!("http://{addr}/api"),
            push_url: format!("ws://{addr}"),
        };

        mock.respond(Method::GET, "/watchlist", StatusCode::OK, json!([]));
        mock.respond(Method::GET, "/alerts", StatusCode::OK, json!([]));
        mock.respond(Method::GET, "/alert-history", StatusCode::OK, json!([]));

        let app = Router::new()
            .route("/socket.io/", axum::routing::get(push_ws))
            .fallback(record)
            .with_state(mock.clone());

        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        mock
    }

    pub fn respond(&self, method: Method, path: &str, status: StatusCode, body: Value) {
        self.responses
            .lock()
            .unwrap()
            .insert((method, path.to_string()), (status, body));
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    pub fn calls_to(&self, method: Method, path: &str) -> Vec<Recorded> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method && r.path == path)
            .collect()
    }

    /// Emits `{"event", "data"}` as a Socket.IO event.
    pub fn push(&self, frame: Value) {
        let packet = json!([frame["event"], frame["data"]]);
        let _ = self.push_tx.send(format!("42{packet}"));
    }

    /// Sends a raw Engine.IO packet, e.g. `2` for a ping.
    pub fn push_raw(&self, packet: &str) {
        let _ = self.push_tx.send(packet.to_string());
    }

    /// Closes every open push socket from the server side.
    pub fn kick(&self) {
        let _ = self.push_tx.send(KICK.to_string());
    }

    pub fn frames(&self) -> Vec<Value> {
        self.ws_frames
            .lock()
            .unwrap()
            .iter()
            .filter_map(|f| serde_json::from_str(f).ok())
            .collect()
    }
}

async fn record(
    State(mock): State<MockBackend>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path = uri.path().strip_prefix("/api").unwrap_or(uri.path()).to_string();
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(String::from);

    mock.requests.lock().unwrap().push(Recorded {
        method: method.clone(),
        path: path.clone(),
        query: uri.query().map(String::from),
        authorization,
        body: serde_json::from_slice(&body).unwrap_or(Value::Null),
    });

    let canned = mock.responses.lock().unwrap().get(&(method, path)).cloned();
    match canned {
        Some((status, body)) => (status, Json(body)).into_response(),
        None => (StatusCode::OK, Json(json!({}))).into_response(),
    }
}

async fn push_ws(State(mock): State<MockBackend>, headers: HeaderMap, ws: WebSocketUpgrade) -> Response {
    if mock.reject_ws.load(Ordering::SeqCst) {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }

    let auth = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    mock.ws_auth.lock().unwrap().push(auth);
    mock.ws_connections.fetch_add(1, Ordering::SeqCst);

    // subscribe before the handshake completes so no push is missed
    let rx = mock.push_tx.subscribe();
    ws.on_upgrade(move |socket| serve_push(socket, mock, rx))
}

async fn serve_push(mut socket: WebSocket, mock: MockBackend, mut rx: broadcast::Receiver<String>) {
    let heartbeat = mock.heartbeat_ms.load(Ordering::SeqCst);
    let open = json!({
        "sid": "mock-engine",
        "upgrades": [],
        "pingInterval": heartbeat,
        "pingTimeout": heartbeat,
        "maxPayload": 1_000_000,
    });
    if socket.send(Message::Text(format!("0{open}"))).await.is_err() {
        mock.ws_closed.fetch_add(1, Ordering::SeqCst);
        return;
    }

    loop {
        tokio::select! {
            msg = socket.recv() => match msg {
                Some(Ok(Message::Text(t))) => {
                    if t.starts_with("40") {
                        let reply = if mock.reject_namespace.load(Ordering::SeqCst) {
                            r#"44{"message":"Not authorized"}"#.to_string()
                        } else {
                            r#"40{"sid":"mock-socket"}"#.to_string()
                        };
                        if socket.send(Message::Text(reply)).await.is_err() {
                            break;
                        }
                    } else if let Some(event) = t.strip_prefix("42") {
                        if let Ok(Value::Array(parts)) = serde_json::from_str::<Value>(event) {
                            let frame = json!({
                                "event": parts.first().cloned().unwrap_or(Value::Null),
                                "data": parts.get(1).cloned().unwrap_or(Value::Null),
                            });
                            mock.ws_frames.lock().unwrap().push(frame.to_string());
                        }
                    } else if t == "3" {
                        mock.pongs.fetch_add(1, Ordering::SeqCst);
                    }
                }
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => {}
            },
            out = rx.recv() => match out {
                Ok(t) if t == KICK => {
                    let _ = socket.close().await;
                    break;
                }
                Ok(t) => {
                    if socket.send(Message::Text(t)).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(_) => break,
            },
        }
    }
    mock.ws_closed.fetch_add(1, Ordering::SeqCst);
}

/// An address nothing listens on.
pub async fn dead_base() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}/api")
}

pub fn settings_for(api_base: &str, push_url: &str) -> Settings {
    Settings {
        host: "127.0.0.1".into(),
        port: 0,
        environment: Environment::Development,
        public_origin: "http://127.0.0.1".into(),
        api_base_url: api_base.into(),
        push_url: push_url.into(),
        session_cookie_name: "token".into(),
        cookie_secure: false,
        request_timeout: Duration::from_secs(5),
        channel_max_attempts: 3,
        channel_reconnect_delay: Duration::from_millis(20),
    }
}

pub fn test_state(mock: &MockBackend) -> AppState {
    AppState::new(settings_for(&mock.api_base, &mock.push_url)).expect("app state")
}

/// A signed token expiring `ttl_secs` from now (negative for the past).
pub fn mint_token(ttl_secs: i64) -> String {
    let exp = chrono::Utc::now().timestamp() + ttl_secs;
    encode(
        &Header::default(),
        &json!({ "sub": "a@b.com", "exp": exp }),
        &EncodingKey::from_secret(b"backend-only-secret"),
    )
    .unwrap()
}

pub fn get(uri: &str, token: Option<&str>, htmx: bool) -> Request<Body> {
    let mut b = Request::builder().method("GET").uri(uri);
    if let Some(t) = token {
        b = b.header(header::COOKIE, format!("token={t}"));
    }
    if htmx {
        b = b.header("HX-Request", "true");
    }
    b.body(Body::empty()).unwrap()
}

pub fn post_form(uri: &str, token: Option<&str>, form: &str) -> Request<Body> {
    let mut b = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .header("HX-Request", "true");
    if let Some(t) = token {
        b = b.header(header::COOKIE, format!("token={t}"));
    }
    b.body(Body::from(form.to_string())).unwrap()
}

pub async fn body_string(res: Response) -> String {
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8_lossy(&bytes).to_string()
}

pub fn header_str(res: &Response, name: &str) -> Option<String> {
    res.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
}

pub fn set_cookies(res: &Response) -> Vec<String> {
    res.headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(String::from)
        .collect()
}

/// Parsed `HX-Trigger` header, `Null` when absent.
pub fn hx_trigger(res: &Response) -> Value {
    header_str(res, "HX-Trigger")
        .and_then(|s| serde_json::from_str(&s).ok())
        .unwrap_or(Value::Null)
}

pub fn toast_message(res: &Response) -> Option<String> {
    hx_trigger(res)["toast"]["message"].as_str().map(String::from)
}

pub async fn wait_until<F: Fn() -> bool>(cond: F) -> bool {
    for _ in 0..200 {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cond()
}
