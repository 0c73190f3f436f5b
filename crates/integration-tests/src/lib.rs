//! Integration tests for Pizza Time.
//!
//! Each test starts the gateway in-process on an ephemeral port, backed by a
//! file store in a temporary directory, and drives it with the real client.
//! Nothing external is required.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p pizza-time-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `accounts` - Registration, sign-in, session restore, account deletion
//! - `ordering` - Checkout and the order lifecycle over HTTP
//! - `contacts` - Contact roster sync and ownership scoping
//! - `offline` - Local fallback when the gateway is unreachable
//! - `support` - Chat relay and support email

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use axum::{Json, Router};
use pizza_time_client::{ClientConfig, PizzaApp};
use pizza_time_core::Credentials;
use pizza_time_server::config::{ChatConfig, EmailConfig, StorageConfig, ServerConfig};
use pizza_time_server::state::AppState;
use pizza_time_server::{app, open_store};
use secrecy::SecretString;
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Token secret that passes the gateway's strength checks.
pub const TEST_TOKEN_SECRET: &str = "aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6v";

/// Password accepted by both the client and gateway rules.
pub const TEST_PASSWORD: &str = "Secret123";

/// A gateway running on a local ephemeral port.
pub struct TestServer {
    addr: SocketAddr,
    data_dir: TempDir,
    handle: JoinHandle<()>,
}

impl TestServer {
    /// Start a gateway with chat left unconfigured.
    pub async fn start() -> Self {
        Self::start_with_chat(None).await
    }

    /// Start a gateway whose chat relay talks to `upstream` (see [`spawn_chat_upstream`]).
    pub async fn start_with_chat(upstream: Option<String>) -> Self {
        let data_dir = tempfile::tempdir().expect("Failed to create data dir");
        let storage = StorageConfig::File {
            data_dir: data_dir.path().to_path_buf(),
        };
        let chat = ChatConfig {
            api_key: upstream
                .as_ref()
                .map(|_| SecretString::from("test-chat-key".to_owned())),
            model: "gemini-2.5-flash".to_owned(),
            fallback_model: "gemini-1.5-flash".to_owned(),
            api_base: upstream.unwrap_or_else(|| "http://127.0.0.1:9".to_owned()),
        };
        let config = ServerConfig {
            host: "127.0.0.1".parse().expect("Invalid host"),
            port: 0,
            storage: storage.clone(),
            token_secret: SecretString::from(TEST_TOKEN_SECRET.to_owned()),
            token_ttl: Duration::from_secs(3600),
            chat,
            email: EmailConfig::default(),
            sentry_dsn: None,
            sentry_environment: None,
        };

        let db = open_store(&storage)
            .await
            .expect("Failed to open document store");
        let state = AppState::with_email_delay(config, db, Duration::ZERO)
            .expect("Failed to build application state");

        let (addr, handle) = serve(app(state)).await;
        Self {
            addr,
            data_dir,
            handle,
        }
    }

    /// Base URL of the API, including the `/api` prefix.
    #[must_use]
    pub fn api_url(&self) -> String {
        format!("http://{}/api", self.addr)
    }

    /// Origin of the server, without any path.
    #[must_use]
    pub fn origin(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Directory holding the gateway's collection files.
    #[must_use]
    pub fn data_dir(&self) -> &Path {
        self.data_dir.path()
    }

    /// Client settings pointed at this server, with in-memory storage.
    #[must_use]
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            request_timeout: Duration::from_secs(5),
            ..ClientConfig::new(self.api_url())
        }
    }

    /// A fresh client with its own in-memory storage.
    #[must_use]
    pub fn client(&self) -> PizzaApp {
        PizzaApp::new(self.client_config()).expect("Failed to build client")
    }

    /// A fresh client already registered as `username`.
    pub async fn signed_in_client(&self, username: &str) -> PizzaApp {
        let client = self.client();
        client
            .session()
            .register(credentials(username))
            .await
            .expect("Failed to register test user");
        client
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Credentials for `username` with [`TEST_PASSWORD`].
#[must_use]
pub fn credentials(username: &str) -> Credentials {
    Credentials {
        username: username.to_owned(),
        email: Some(format!("{username}@pizza.example")),
        password: TEST_PASSWORD.to_owned(),
    }
}

async fn serve(router: Router) -> (SocketAddr, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind to address");
    let addr = listener.local_addr().expect("Failed to read local address");
    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.expect("Server error");
    });
    (addr, handle)
}

/// Start a stand-in for the generative model API that always answers `reply`.
///
/// Returns its base URL and the task serving it.
pub async fn spawn_chat_upstream(reply: &'static str) -> (String, JoinHandle<()>) {
    let router = Router::new().fallback(move || async move {
        Json(json!({
            "candidates": [{"content": {"parts": [{"text": reply}]}}]
        }))
    });
    let (addr, handle) = serve(router).await;
    (format!("http://{addr}"), handle)
}

/// A local address nothing listens on.
pub async fn unreachable_api_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind to address");
    let addr = listener.local_addr().expect("Failed to read local address");
    drop(listener);
    format!("http://{addr}/api")
}

/// Read one collection file written by the gateway.
#[must_use]
pub fn read_collection(dir: &Path, collection: &str) -> Vec<Value> {
    std::fs::read_to_string(dir.join(format!("{collection}.json")))
        .ok()
        .and_then(|raw| serde_json::from_str(&raw).ok())
        .unwrap_or_default()
}
