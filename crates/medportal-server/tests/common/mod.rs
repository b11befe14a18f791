#![allow(dead_code)]

use std::net::SocketAddr;

use jsonwebtoken::{EncodingKey, Header, encode};
use medportal_auth::AuthConfig;
use medportal_server::{AppConfig, AppState, build_router};
use serde_json::{Value, json};
use tokio::task::JoinHandle;

pub const SECRET: &str = "integration-test-secret";

/// A server on an ephemeral port backed by the in-memory store.
pub struct TestServer {
    pub base: String,
    pub client: reqwest::Client,
    pub state: AppState,
    shutdown: Option<tokio::sync::oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
    _uploads: tempfile::TempDir,
}

pub fn test_config(uploads: &std::path::Path) -> AppConfig {
    let mut cfg = AppConfig {
        auth: AuthConfig::hs256(SECRET),
        ..Default::default()
    };
    cfg.uploads.dir = uploads.to_path_buf();
    cfg.uploads.serve_static = true;
    cfg.notifications.enabled = false;
    cfg
}

pub async fn start_server() -> TestServer {
    start_server_with(|_| {}).await
}

pub async fn start_server_with(tweak: impl FnOnce(&mut AppConfig)) -> TestServer {
    let uploads = tempfile::tempdir().expect("uploads dir");
    let mut cfg = test_config(uploads.path());
    tweak(&mut cfg);

    let state = AppState::with_store(cfg, medportal_db_memory::create_store())
        .await
        .expect("build state");
    let app = build_router(state.clone());

    let listener = tokio::net::TcpListener::bind((std::net::Ipv4Addr::LOCALHOST, 0))
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();

    let handle = tokio::spawn(async move {
        let _ = axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            let _ = rx.await;
        })
        .await;
    });

    TestServer {
        base: format!("http://{addr}"),
        client: reqwest::Client::new(),
        state,
        shutdown: Some(tx),
        handle: Some(handle),
        _uploads: uploads,
    }
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }

    /// Saves a User document for the caller and returns its `_id`.
    pub async fn save_user(&self, token: &str, body: Value) -> String {
        let resp = self
            .client
            .post(self.url("/user/save-user"))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 201);
        let body: Value = resp.json().await.unwrap();
        body["user"]["_id"].as_str().unwrap().to_string()
    }
}

/// Signs a token the way the identity provider would.
pub fn token(sub: &str, role: &str) -> String {
    token_with_name(sub, role, "Test", "User")
}

pub fn token_with_name(sub: &str, role: &str, first: &str, last: &str) -> String {
    let exp = time::OffsetDateTime::now_utc().unix_timestamp() + 3600;
    encode(
        &Header::default(),
        &json!({
            "sub": sub,
            "role": role,
            "firstName": first,
            "lastName": last,
            "email": format!("{sub}@example.com"),
            "exp": exp,
        }),
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}
