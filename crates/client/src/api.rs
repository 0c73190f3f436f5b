//! Gateway client.
//!
//! [`Remote`] is the port the aggregates talk to; [`ApiClient`] implements it
//! over HTTP with `reqwest`. Requests carry the bearer token found in local
//! storage. GET requests are retried on network failures and server errors;
//! writes are sent once.

use std::sync::Arc;

use async_trait::async_trait;
use pizza_time_core::{
    ApiResponse, AuthResponse, ChatReply, ChatRequest, Contact, ContactId, ContactPatch,
    Credentials, NewContact, NewOrder, Order, OrderId, OrderPatch, PasswordConfirmation,
    PublicUser,
};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::storage::{AUTH_TOKEN_KEY, LocalStore};

/// A message for the support inbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportEmail {
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub message: String,
}

/// Everything the client asks of the gateway.
#[async_trait]
pub trait Remote: Send + Sync {
    async fn register(&self, credentials: &Credentials) -> Result<AuthResponse>;
    async fn login(&self, credentials: &Credentials) -> Result<AuthResponse>;
    async fn current_user(&self) -> Result<PublicUser>;
    async fn delete_account(&self, password: &str) -> Result<()>;

    async fn list_orders(&self) -> Result<Vec<Order>>;
    async fn create_order(&self, order: &NewOrder) -> Result<Order>;
    async fn update_order(&self, id: &OrderId, patch: &OrderPatch) -> Result<Order>;

    async fn list_contacts(&self) -> Result<Vec<Contact>>;
    async fn create_contact(&self, contact: &NewContact) -> Result<Contact>;
    async fn update_contact(&self, id: &ContactId, patch: &ContactPatch) -> Result<Contact>;
    async fn delete_contact(&self, id: &ContactId) -> Result<()>;

    async fn send_chat(&self, request: &ChatRequest) -> Result<ChatReply>;
    async fn send_support_email(&self, email: &SupportEmail) -> Result<()>;
}

/// Body of `GET /auth/me`.
#[derive(Deserialize)]
struct Me {
    user: PublicUser,
}

/// HTTP implementation of [`Remote`].
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    http: reqwest::Client,
    base_url: String,
    store: LocalStore,
    get_retries: u32,
    enabled: bool,
}

impl ApiClient {
    /// Build a client for `config.api_url`, reading the token from `store`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: &ClientConfig, store: LocalStore) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(ClientError::Network)?;
        Ok(Self {
            inner: Arc::new(ApiClientInner {
                http,
                base_url: config.api_url.trim_end_matches('/').to_owned(),
                store,
                get_retries: config.get_retries,
                enabled: config.use_backend,
            }),
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!(
            "{}/{}",
            self.inner.base_url,
            endpoint.trim_start_matches('/')
        )
    }

    /// Send `body` to `endpoint`, retrying GETs.
    #[instrument(skip(self, body))]
    async fn request<B, T>(&self, method: Method, endpoint: &str, body: Option<&B>) -> Result<T>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        if !self.inner.enabled {
            return Err(ClientError::Offline);
        }
        let url = self.url(endpoint);
        let attempts = if method == Method::GET {
            self.inner.get_retries + 1
        } else {
            1
        };

        let mut attempt = 1;
        loop {
            match self.send_once(method.clone(), &url, body).await {
                Err(e) if attempt < attempts && is_retryable(&e) => {
                    debug!(attempt, error = %e, "retrying request");
                    attempt += 1;
                }
                outcome => return outcome,
            }
        }
    }

    async fn send_once<B, T>(&self, method: Method, url: &str, body: Option<&B>) -> Result<T>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        let mut request = self.inner.http.request(method, url);
        if let Some(token) = self.inner.store.load_string(AUTH_TOKEN_KEY) {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(ClientError::Network)?;
        let status = response.status();
        if status.is_success() {
            return response.json::<T>().await.map_err(ClientError::Decode);
        }

        let body = response.json::<serde_json::Value>().await.ok();
        Err(ClientError::Api {
            status: status.as_u16(),
            message: error_message(status, body.as_ref()),
        })
    }

    async fn get<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T> {
        self.request::<(), T>(Method::GET, endpoint, None).await
    }

    async fn post<B, T>(&self, endpoint: &str, body: &B) -> Result<T>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        self.request(Method::POST, endpoint, Some(body)).await
    }

    async fn put<B, T>(&self, endpoint: &str, body: &B) -> Result<T>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        self.request(Method::PUT, endpoint, Some(body)).await
    }

    async fn delete<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T> {
        self.request::<(), T>(Method::DELETE, endpoint, None).await
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.inner.base_url)
            .field("enabled", &self.inner.enabled)
            .finish_non_exhaustive()
    }
}

fn is_retryable(error: &ClientError) -> bool {
    match error {
        ClientError::Network(_) => true,
        ClientError::Api { status, .. } => *status >= 500,
        _ => false,
    }
}

/// The user-facing message for a failed response.
///
/// Prefers the body's `message`, then its `error`, then a default for the
/// status code.
pub(crate) fn error_message(status: StatusCode, body: Option<&serde_json::Value>) -> String {
    let field = |name: &str| {
        body.and_then(|b| b.get(name))
            .and_then(serde_json::Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .map(str::to_owned)
    };
    if let Some(message) = field("message").or_else(|| field("error")) {
        return message;
    }
    match status {
        StatusCode::BAD_REQUEST => "Invalid request. Please check your input.",
        StatusCode::UNAUTHORIZED => "Please log in to continue.",
        StatusCode::FORBIDDEN => "You do not have permission to perform this action.",
        StatusCode::NOT_FOUND => "The requested resource was not found.",
        StatusCode::INTERNAL_SERVER_ERROR => "Server error. Please try again later.",
        StatusCode::SERVICE_UNAVAILABLE => {
            "Service is temporarily unavailable. Please try again later."
        }
        _ => "An error occurred. Please try again.",
    }
    .to_owned()
}

/// Unwrap an envelope that must carry data.
fn into_data<T>(envelope: ApiResponse<T>) -> Result<T> {
    envelope.into_result().map_err(|message| ClientError::Api {
        status: StatusCode::OK.as_u16(),
        message,
    })
}

/// Check an envelope that carries only a message.
fn into_unit(envelope: ApiResponse<()>) -> Result<()> {
    if envelope.success {
        Ok(())
    } else {
        into_data(envelope)
    }
}

#[async_trait]
impl Remote for ApiClient {
    async fn register(&self, credentials: &Credentials) -> Result<AuthResponse> {
        self.post("auth/register", credentials).await
    }

    async fn login(&self, credentials: &Credentials) -> Result<AuthResponse> {
        self.post("auth/login", credentials).await
    }

    async fn current_user(&self) -> Result<PublicUser> {
        self.get::<Me>("auth/me").await.map(|me| me.user)
    }

    async fn delete_account(&self, password: &str) -> Result<()> {
        let body = PasswordConfirmation {
            password: password.to_owned(),
        };
        into_unit(self.post("auth/delete-account", &body).await?)
    }

    async fn list_orders(&self) -> Result<Vec<Order>> {
        into_data(self.get("orders").await?)
    }

    async fn create_order(&self, order: &NewOrder) -> Result<Order> {
        into_data(self.post("orders", order).await?)
    }

    async fn update_order(&self, id: &OrderId, patch: &OrderPatch) -> Result<Order> {
        into_data(self.put(&format!("orders/{id}"), patch).await?)
    }

    async fn list_contacts(&self) -> Result<Vec<Contact>> {
        into_data(self.get("contacts").await?)
    }

    async fn create_contact(&self, contact: &NewContact) -> Result<Contact> {
        into_data(self.post("contacts", contact).await?)
    }

    async fn update_contact(&self, id: &ContactId, patch: &ContactPatch) -> Result<Contact> {
        into_data(self.put(&format!("contacts/{id}"), patch).await?)
    }

    async fn delete_contact(&self, id: &ContactId) -> Result<()> {
        into_unit(self.delete(&format!("contacts/{id}")).await?)
    }

    async fn send_chat(&self, request: &ChatRequest) -> Result<ChatReply> {
        into_data(self.post("chat/message", request).await?)
    }

    async fn send_support_email(&self, email: &SupportEmail) -> Result<()> {
        into_unit(self.post("contact/send-email", email).await?)
    }
}
