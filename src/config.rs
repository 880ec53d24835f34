//! Gateway configuration.
//!
//! Settings are read once at start-up from `OLLAMA_GATEWAY_*` environment
//! variables. Every value has a fixed default, so an empty environment yields
//! a gateway that talks to the local Ollama on `localhost:11434`.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

/// Default model runner location.
pub const DEFAULT_UPSTREAM_URL: &str = "http://localhost:11434";
/// Default listen port.
pub const DEFAULT_PORT: u16 = 8000;
/// Default directory for the browser client.
pub const DEFAULT_STATIC_DIR: &str = "static";
/// Model used when a text request does not name one.
pub const DEFAULT_MODEL: &str = "llama3";
/// Model used when a multimodal request does not name one.
pub const DEFAULT_VISION_MODEL: &str = "llava";

const UPSTREAM_URL_ENV: &str = "OLLAMA_GATEWAY_UPSTREAM_URL";
const PORT_ENV: &str = "OLLAMA_GATEWAY_PORT";
const STATIC_DIR_ENV: &str = "OLLAMA_GATEWAY_STATIC_DIR";
const DEFAULT_MODEL_ENV: &str = "OLLAMA_GATEWAY_DEFAULT_MODEL";
const VISION_MODEL_ENV: &str = "OLLAMA_GATEWAY_VISION_MODEL";
const UPLOAD_DIR_ENV: &str = "OLLAMA_GATEWAY_UPLOAD_DIR";

/// Errors raised while loading the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The upstream URL could not be parsed.
    #[error("invalid upstream url {value:?}: {source}")]
    InvalidUrl {
        /// Raw value that failed to parse.
        value: String,
        /// Parser error.
        #[source]
        source: url::ParseError,
    },
    /// The listen port is not a valid `u16`.
    #[error("invalid port {0:?}")]
    InvalidPort(String),
}

/// Per-endpoint upper bounds for calls to the model runner.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UpstreamTimeouts {
    /// Connection establishment.
    pub connect: Duration,
    /// Text and multimodal generation (each attempt).
    pub generate: Duration,
    /// Model listing.
    pub list_models: Duration,
    /// Model pull request.
    pub pull: Duration,
}

impl Default for UpstreamTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(5),
            generate: Duration::from_secs(120),
            list_models: Duration::from_secs(10),
            pull: Duration::from_secs(60),
        }
    }
}

impl UpstreamTimeouts {
    /// Use the same bound for every call. Mostly useful in tests.
    #[must_use]
    pub const fn uniform(timeout: Duration) -> Self {
        Self {
            connect: timeout,
            generate: timeout,
            list_models: timeout,
            pull: timeout,
        }
    }
}

/// Complete gateway configuration.
#[derive(Clone, Debug)]
pub struct GatewayConfig {
    /// Base URL of the model runner.
    pub upstream_url: Url,
    /// Listen port.
    pub port: u16,
    /// Directory holding `index.html` and other static assets.
    pub static_dir: PathBuf,
    /// Fallback model for text generation.
    pub default_model: String,
    /// Fallback model for multimodal generation.
    pub vision_model: String,
    /// Where temporary upload files are created.
    pub upload_dir: PathBuf,
    /// Upstream call bounds.
    pub timeouts: UpstreamTimeouts,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            upstream_url: default_upstream_url(),
            port: DEFAULT_PORT,
            static_dir: PathBuf::from(DEFAULT_STATIC_DIR),
            default_model: DEFAULT_MODEL.to_string(),
            vision_model: DEFAULT_VISION_MODEL.to_string(),
            upload_dir: std::env::temp_dir(),
            timeouts: UpstreamTimeouts::default(),
        }
    }
}

impl GatewayConfig {
    /// Load the configuration from the process environment.
    ///
    /// # Errors
    /// Returns an error if a variable is set to an unparseable value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load the configuration through an arbitrary key lookup.
    ///
    /// Empty values are treated as unset.
    ///
    /// # Errors
    /// Returns an error if a variable is set to an unparseable value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(raw) = get(UPSTREAM_URL_ENV) {
            config.upstream_url = Url::parse(raw.trim()).map_err(|source| ConfigError::InvalidUrl {
                value: raw.clone(),
                source,
            })?;
        }
        if let Some(raw) = get(PORT_ENV) {
            config.port = raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidPort(raw.clone()))?;
        }
        if let Some(dir) = get(STATIC_DIR_ENV) {
            config.static_dir = PathBuf::from(dir);
        }
        if let Some(model) = get(DEFAULT_MODEL_ENV) {
            config.default_model = model;
        }
        if let Some(model) = get(VISION_MODEL_ENV) {
            config.vision_model = model;
        }
        if let Some(dir) = get(UPLOAD_DIR_ENV) {
            config.upload_dir = PathBuf::from(dir);
        }

        Ok(config)
    }

    /// Point the gateway at a different model runner.
    #[must_use]
    pub fn with_upstream(mut self, url: Url) -> Self {
        self.upstream_url = url;
        self
    }

    /// Override upstream timeouts.
    #[must_use]
    pub const fn with_timeouts(mut self, timeouts: UpstreamTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Override the temporary upload directory.
    #[must_use]
    pub fn with_upload_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.upload_dir = dir.into();
        self
    }

    /// Override the static asset directory.
    #[must_use]
    pub fn with_static_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.static_dir = dir.into();
        self
    }
}

#[allow(clippy::expect_used)]
fn default_upstream_url() -> Url {
    // Compile-time constant, always valid.
    Url::parse(DEFAULT_UPSTREAM_URL).expect("default upstream url is valid")
}
