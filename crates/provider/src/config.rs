use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default API root of the provider.
pub const DEFAULT_API_BASE_URL: &str = "https://pan.szczk.top/czkapi";

/// HTTP settings of the provider client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Root URL of the token, begin-upload and management endpoints.
    pub api_base_url: String,
    pub user_agent: String,
    /// Timeout of ordinary API calls.
    pub request_timeout_secs: u64,
    /// Timeout of a single chunk or direct upload request.
    pub chunk_timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.into(),
            user_agent: concat!("panbridge/", env!("CARGO_PKG_VERSION")).into(),
            request_timeout_secs: 30,
            chunk_timeout_secs: 600,
        }
    }
}

impl ProviderConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn chunk_timeout(&self) -> Duration {
        Duration::from_secs(self.chunk_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ProviderConfig::default();
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
        assert!(config.user_agent.starts_with("panbridge/"));
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.chunk_timeout(), Duration::from_secs(600));
    }

    #[test]
    fn partial_json() {
        let config: ProviderConfig =
            serde_json::from_str(r#"{"api_base_url":"http://localhost:9000"}"#).unwrap();
        assert_eq!(config.api_base_url, "http://localhost:9000");
        assert_eq!(config.request_timeout_secs, 30);
    }
}
