//! Static configuration for the response cache.
//!
//! A [`CacheConfig`] is built once at startup, either with the builder methods
//! or from JSON, and shared read-only by every request:
//!
//! ```json
//! {
//!   "apiBaseUrl": "/api",
//!   "includedCollections": ["posts", "media"],
//!   "includedGlobals": ["header"],
//!   "includedPaths": ["/custom/report"],
//!   "cors": ["https://a.example"],
//!   "storeTimeoutMs": 250,
//!   "writeMode": "detached"
//! }
//! ```

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::security::CorsPolicy;

/// Cookie that carries the session token when none is configured.
pub const DEFAULT_TOKEN_COOKIE: &str = "payload-token";

/// Upper bound on a single cache store call when none is configured.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_millis(500);

/// Errors raised while loading a [`CacheConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read cache config from {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid cache config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// How a captured body reaches the cache store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    /// The write is awaited (bounded by the store timeout) before the response is returned.
    #[default]
    Inline,
    /// The write is spawned onto the runtime and the response is returned immediately.
    Detached,
}

/// Which requests are cached and how the cache layer behaves.
///
/// Paths are normalized on the way in: the base URL and every included path
/// get a leading `/` and lose any trailing `/`, so `"api/"` and `"/api"`
/// configure the same surface.
///
/// # Examples
///
/// ```
/// use rttp_cache::config::CacheConfig;
/// use rttp_cache::security::CorsPolicy;
///
/// let config = CacheConfig::new("/api/")
///     .include_collection("posts")
///     .include_global("header")
///     .with_cors(CorsPolicy::Wildcard);
///
/// assert_eq!(config.api_base_url(), "/api");
/// assert!(config.includes_collection("posts"));
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CacheConfig {
    api_base_url: String,
    included_collections: HashSet<String>,
    included_globals: HashSet<String>,
    included_paths: HashSet<String>,
    cors: CorsPolicy,
    token_cookie: String,
    store_timeout_ms: u64,
    write_mode: WriteMode,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            api_base_url: "/api".to_owned(),
            included_collections: HashSet::new(),
            included_globals: HashSet::new(),
            included_paths: HashSet::new(),
            cors: CorsPolicy::Disabled,
            token_cookie: DEFAULT_TOKEN_COOKIE.to_owned(),
            store_timeout_ms: DEFAULT_STORE_TIMEOUT.as_millis() as u64,
            write_mode: WriteMode::Inline,
        }
    }
}

impl CacheConfig {
    /// Creates a config for `api_base_url` with nothing included yet.
    pub fn new(api_base_url: impl AsRef<str>) -> Self {
        Self {
            api_base_url: normalize_path(api_base_url.as_ref()),
            ..Self::default()
        }
    }

    /// Parses a JSON document into a normalized config.
    ///
    /// Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        Ok(config.normalized())
    }

    /// Reads and parses a JSON config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&json)
    }

    #[must_use]
    pub fn include_collection(mut self, name: impl Into<String>) -> Self {
        self.included_collections.insert(name.into());
        self
    }

    #[must_use]
    pub fn include_global(mut self, name: impl Into<String>) -> Self {
        self.included_globals.insert(name.into());
        self
    }

    /// Includes a literal path, relative to the base URL (e.g. `"/custom/report"`).
    #[must_use]
    pub fn include_path(mut self, path: impl AsRef<str>) -> Self {
        self.included_paths.insert(normalize_path(path.as_ref()));
        self
    }

    #[must_use]
    pub fn with_cors(mut self, policy: CorsPolicy) -> Self {
        self.cors = policy;
        self
    }

    #[must_use]
    pub fn with_token_cookie(mut self, name: impl Into<String>) -> Self {
        self.token_cookie = name.into();
        self
    }

    #[must_use]
    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout_ms = timeout.as_millis() as u64;
        self
    }

    #[must_use]
    pub fn with_write_mode(mut self, mode: WriteMode) -> Self {
        self.write_mode = mode;
        self
    }

    /// Base URL without trailing slash; empty when the API is mounted at `/`.
    pub fn api_base_url(&self) -> &str {
        &self.api_base_url
    }

    pub fn includes_collection(&self, name: &str) -> bool {
        self.included_collections.contains(name)
    }

    pub fn includes_global(&self, name: &str) -> bool {
        self.included_globals.contains(name)
    }

    pub fn includes_path(&self, path: &str) -> bool {
        self.included_paths.contains(path)
    }

    pub fn cors(&self) -> &CorsPolicy {
        &self.cors
    }

    pub fn token_cookie(&self) -> &str {
        &self.token_cookie
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    pub fn write_mode(&self) -> WriteMode {
        self.write_mode
    }

    fn normalized(mut self) -> Self {
        self.api_base_url = normalize_path(&self.api_base_url);
        self.included_paths = self
            .included_paths
            .iter()
            .map(|p| normalize_path(p))
            .collect();
        self
    }
}

// Leading slash, no trailing slash; "/" and "" both become "".
fn normalize_path(path: &str) -> String {
    let trimmed = path.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else if trimmed.starts_with('/') {
        trimmed.to_owned()
    } else {
        format!("/{trimmed}")
    }
}
