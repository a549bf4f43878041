use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};

use gatehouse::config::Config;
use gatehouse::email::Mailer;
use gatehouse::store::MemoryStore;

/// Mailer double that records every reset delivery instead of sending it.
#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send_password_reset(&self, to_email: &str, reset_url: &str) -> Result<(), String> {
        self.sent
            .lock()
            .unwrap()
            .push((to_email.to_string(), reset_url.to_string()));
        Ok(())
    }
}

impl RecordingMailer {
    /// Last reset URL delivered to the given address.
    pub fn last_reset_url(&self, email: &str) -> Option<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(to, _)| to == email)
            .map(|(_, url)| url.clone())
    }
}

/// Mailer double that fails the first `failures` deliveries, then succeeds.
/// Every attempt is counted and its URL recorded, so tests can assert the
/// retry behavior and still finish a reset after delivery fell over.
pub struct FlakyMailer {
    failures: u32,
    attempts: AtomicU32,
    urls: Mutex<Vec<String>>,
}

impl FlakyMailer {
    pub fn failing_first(failures: u32) -> Arc<Self> {
        Arc::new(Self {
            failures,
            attempts: AtomicU32::new(0),
            urls: Mutex::new(Vec::new()),
        })
    }

    pub fn always_failing() -> Arc<Self> {
        Self::failing_first(u32::MAX)
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn last_url(&self) -> Option<String> {
        self.urls.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl Mailer for FlakyMailer {
    async fn send_password_reset(&self, _to_email: &str, reset_url: &str) -> Result<(), String> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        self.urls.lock().unwrap().push(reset_url.to_string());
        if attempt < self.failures {
            Err("connection refused".to_string())
        } else {
            Ok(())
        }
    }
}

/// A running test server instance on an in-memory store.
pub struct TestApp {
    pub addr: SocketAddr,
    pub client: Client,
    pub mailer: Arc<RecordingMailer>,
}

fn test_config(rate_limit_max: u32) -> Config {
    Config {
        database_url: "postgres://unused".to_string(),
        jwt_secret: "test-jwt-secret-that-is-long-enough".to_string(),
        host: "127.0.0.1".parse().unwrap(),
        port: 0, // unused, we bind to random port
        frontend_url: Some("http://frontend.test".to_string()),
        rate_limit_max,
        rate_limit_window_secs: 60,
        log_level: "warn".to_string(),
        smtp: None,
    }
}

async fn spawn_with(rate_limit_max: u32) -> TestApp {
    let recording = Arc::new(RecordingMailer::default());
    let app = gatehouse::build_app(
        Arc::new(MemoryStore::new()),
        Some(recording.clone() as Arc<dyn Mailer>),
        test_config(rate_limit_max),
    );

    spawn_router(app, recording).await
}

async fn spawn_router(app: axum::Router, mailer: Arc<RecordingMailer>) -> TestApp {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind to random port");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .expect("Server failed");
    });

    TestApp {
        addr,
        client: Client::new(),
        mailer,
    }
}

/// Spawn a test app with a recording mailer and a permissive rate limit.
pub async fn spawn_app() -> TestApp {
    spawn_with(1000).await
}

/// Spawn a test app with a tight per-IP rate limit.
pub async fn spawn_app_with_rate_limit(max: u32) -> TestApp {
    spawn_with(max).await
}

/// Spawn a test app around a caller-provided mailer double; the TestApp's
/// own recorder is unused in this mode.
pub async fn spawn_app_with_mailer(mailer: Arc<dyn Mailer>) -> TestApp {
    let app = gatehouse::build_app(
        Arc::new(MemoryStore::new()),
        Some(mailer),
        test_config(1000),
    );
    spawn_router(app, Arc::new(RecordingMailer::default())).await
}

/// Spawn a test app with no mailer and no frontend URL configured.
pub async fn spawn_misconfigured_app() -> TestApp {
    let mut config = test_config(1000);
    config.frontend_url = None;
    let app = gatehouse::build_app(Arc::new(MemoryStore::new()), None, config);
    spawn_router(app, Arc::new(RecordingMailer::default())).await
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn signup(&self, name: &str, email: &str, password: &str) -> (Value, StatusCode) {
        self.post(
            "/signup",
            &json!({ "name": name, "email": email, "password": password }),
        )
        .await
    }

    pub async fn login(&self, email: &str, password: &str) -> (Value, StatusCode) {
        self.post("/login", &json!({ "email": email, "password": password }))
            .await
    }

    /// First signup bootstraps the admin; returns their access token.
    pub async fn bootstrap_admin(&self) -> String {
        let (body, status) = self.signup("Admin", "admin@test.com", "Secret1!").await;
        assert_eq!(status, StatusCode::CREATED, "bootstrap signup failed: {body}");
        body["token"].as_str().unwrap().to_string()
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

    pub async fn post_auth(&self, path: &str, token: &str, body: &Value) -> (Value, StatusCode) {
        let resp = self
            .client
            .post(self.url(path))
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .expect("post request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    pub async fn put_auth(&self, path: &str, token: &str, body: &Value) -> (Value, StatusCode) {
        let resp = self
            .client
            .put(self.url(path))
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .expect("put request failed");
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

    pub async fn delete(&self, path: &str, body: &Value) -> (Value, StatusCode) {
        let resp = self
            .client
            .delete(self.url(path))
            .json(body)
            .send()
            .await
            .expect("delete request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }
}
