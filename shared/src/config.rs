use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::AppError;
use crate::transport::http::{MAX_RESPONSE_BODY_SIZE, MAX_TIMEOUT_MS};

pub const DEFAULT_BASE_URL: &str = "https://api.travelmate.app/api/";

/// Settings the native shell hands to the core at startup, usually as JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub base_url: String,
    pub request_timeout_ms: u64,
    pub upload_timeout_ms: u64,
    pub detail_cache_capacity: usize,
    pub max_response_bytes: usize,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_ms: 30_000,
            upload_timeout_ms: 120_000,
            detail_cache_capacity: 500,
            max_response_bytes: 16 * 1024 * 1024,
            user_agent: concat!("travelmate-shared/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl ClientConfig {
    pub fn from_json(raw: &str) -> Result<Self, AppError> {
        let config: Self = serde_json::from_str(raw)
            .map_err(|e| AppError::config(format!("invalid client configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        self.base_url()?;
        if self.request_timeout_ms == 0 || self.request_timeout_ms > MAX_TIMEOUT_MS {
            return Err(AppError::config(format!(
                "request_timeout_ms must be between 1 and {MAX_TIMEOUT_MS}"
            )));
        }
        if self.upload_timeout_ms < self.request_timeout_ms || self.upload_timeout_ms > MAX_TIMEOUT_MS
        {
            return Err(AppError::config(format!(
                "upload_timeout_ms must be between request_timeout_ms and {MAX_TIMEOUT_MS}"
            )));
        }
        if self.detail_cache_capacity == 0 {
            return Err(AppError::config("detail_cache_capacity must be > 0"));
        }
        if self.max_response_bytes == 0 || self.max_response_bytes > MAX_RESPONSE_BODY_SIZE {
            return Err(AppError::config(format!(
                "max_response_bytes must be between 1 and {MAX_RESPONSE_BODY_SIZE}"
            )));
        }
        if self.user_agent.trim().is_empty() {
            return Err(AppError::config("user_agent cannot be empty"));
        }
        Ok(())
    }

    /// The API root as a URL whose path ends in `/`, ready for segment joins.
    pub fn base_url(&self) -> Result<Url, AppError> {
        let mut url = Url::parse(self.base_url.trim())
            .map_err(|e| AppError::config(format!("invalid base_url '{}': {e}", self.base_url)))?;
        if url.scheme() != "https" && url.scheme() != "http" {
            return Err(AppError::config("base_url must use http or https"));
        }
        if url.cannot_be_a_base() || url.host_str().is_none() {
            return Err(AppError::config("base_url must be an absolute URL with a host"));
        }
        url.set_query(None);
        url.set_fragment(None);
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        Ok(url)
    }
}
