use serde::{Deserialize, Serialize};

/// Connection settings for the platform HTTP API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformConfig {
    pub api_url: String,
    pub token: String,
    pub profile_id: String,
    pub request_timeout_secs: u64,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8000".to_string(),
            token: String::new(),
            profile_id: String::new(),
            request_timeout_secs: 30,
        }
    }
}
