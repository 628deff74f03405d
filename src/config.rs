use crate::cache::CachePolicy;
use crate::render::DEFAULT_MAX_RENDER_DEPTH;
use crate::schema::resolver::DEFAULT_MAX_REF_DEPTH;
use std::env;
use std::time::Duration;
use tracing::warn;

pub const ENV_API_URL: &str = "BLOCKFORM_API_URL";
pub const ENV_CACHE_POLICY: &str = "BLOCKFORM_CACHE_POLICY";
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "BLOCKFORM_REQUEST_TIMEOUT_SECS";

const DEFAULT_API_URL: &str = "http://localhost:8080";

/// Settings shared by an editing session and its API client.
#[derive(Debug, Clone)]
pub struct EditorConfig {
    pub api_base_url: String,
    pub cache_policy: CachePolicy,
    pub max_ref_depth: usize,
    pub max_render_depth: usize,
    pub request_timeout: Duration,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_URL.to_string(),
            cache_policy: CachePolicy::default(),
            max_ref_depth: DEFAULT_MAX_REF_DEPTH,
            max_render_depth: DEFAULT_MAX_RENDER_DEPTH,
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl EditorConfig {
    /// Defaults overridden by `BLOCKFORM_*` environment variables. Malformed
    /// values are logged and ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = env::var(ENV_API_URL) {
            config.api_base_url = url;
        }
        if let Ok(policy) = env::var(ENV_CACHE_POLICY) {
            match policy.parse() {
                Ok(policy) => config.cache_policy = policy,
                Err(e) => warn!(variable = ENV_CACHE_POLICY, error = %e, "ignoring setting"),
            }
        }
        if let Ok(secs) = env::var(ENV_REQUEST_TIMEOUT_SECS) {
            match secs.parse::<u64>() {
                Ok(secs) => config.request_timeout = Duration::from_secs(secs),
                Err(e) => warn!(variable = ENV_REQUEST_TIMEOUT_SECS, error = %e, "ignoring setting"),
            }
        }
        config
    }

    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    pub fn with_cache_policy(mut self, policy: CachePolicy) -> Self {
        self.cache_policy = policy;
        self
    }

    pub fn with_max_ref_depth(mut self, depth: usize) -> Self {
        self.max_ref_depth = depth;
        self
    }

    pub fn with_max_render_depth(mut self, depth: usize) -> Self {
        self.max_render_depth = depth;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}
