//! Client configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Gateway base URL used when none is configured.
pub const DEFAULT_API_URL: &str = "http://localhost:3000/api";

/// Settings for [`crate::PizzaApp`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the gateway API, including the `/api` prefix.
    pub api_url: String,
    /// When false every remote call fails fast and state stays local.
    pub use_backend: bool,
    /// Per-request timeout.
    pub request_timeout: Duration,
    /// Extra attempts for failed GET requests.
    pub get_retries: u32,
    /// Directory for persisted state. `None` keeps everything in memory.
    pub storage_dir: Option<PathBuf>,
    /// How often the ETA sweep runs.
    pub sweep_interval: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_owned(),
            use_backend: true,
            request_timeout: Duration::from_secs(10),
            get_retries: 2,
            storage_dir: None,
            sweep_interval: Duration::from_secs(1),
        }
    }
}

impl ClientConfig {
    /// Defaults pointed at `api_url`.
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            ..Self::default()
        }
    }

    /// Work entirely offline.
    #[must_use]
    pub fn offline() -> Self {
        Self {
            use_backend: false,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_storage_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.storage_dir = Some(dir.into());
        self
    }
}
