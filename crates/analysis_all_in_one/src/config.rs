use analysis_worker::AnalysisWorkerConfig;
use common::domain::{parse_channels, DomainResult};
use common::http::PlatformConfig;
use common::telemetry::TelemetryConfig;
use config::{Config, ConfigError, Environment};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServiceConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    // Platform API configuration
    /// Base URL of the platform resource API
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Analysis token sent in the Authorization header
    #[serde(default)]
    pub api_token: String,

    /// Profile whose account-wide delivery quota is checked (empty disables the check)
    #[serde(default)]
    pub profile_id: String,

    /// Timeout for each platform request in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// File holding the invocation payload; stdin when unset
    #[serde(default)]
    pub invocation_path: Option<String>,

    // Handler configuration
    /// Channels used for alerts without an action override (comma-separated)
    #[serde(default = "default_alert_channels")]
    pub default_alert_channels: String,

    /// Maximum zone records read per hierarchy entity
    #[serde(default = "default_geofence_zone_qty")]
    pub geofence_zone_qty: u32,

    /// Widget id of the dynamic table editing device params
    #[serde(default = "default_device_params_widget_id")]
    pub device_params_widget_id: String,

    // OpenTelemetry configuration
    /// Enable OpenTelemetry export
    #[serde(default)]
    pub otel_enabled: bool,

    /// OTLP gRPC endpoint
    #[serde(default = "default_otel_endpoint")]
    pub otel_endpoint: String,

    /// Service name reported to OpenTelemetry
    #[serde(default = "default_otel_service_name")]
    pub otel_service_name: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_api_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_alert_channels() -> String {
    "notification".to_string()
}

fn default_geofence_zone_qty() -> u32 {
    1000
}

fn default_device_params_widget_id() -> String {
    "device_params".to_string()
}

fn default_otel_endpoint() -> String {
    "http://localhost:4317".to_string()
}

fn default_otel_service_name() -> String {
    "analysis".to_string()
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(Environment::with_prefix("ANALYSIS"))
            .build()?
            .try_deserialize()
    }

    pub fn platform_config(&self) -> PlatformConfig {
        PlatformConfig {
            api_url: self.api_url.clone(),
            token: self.api_token.clone(),
            profile_id: self.profile_id.clone(),
            request_timeout_secs: self.request_timeout_secs,
        }
    }

    pub fn telemetry_config(&self) -> TelemetryConfig {
        TelemetryConfig {
            service_name: self.otel_service_name.clone(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            otel_endpoint: self.otel_endpoint.clone(),
            otel_enabled: self.otel_enabled,
            log_level: self.log_level.clone(),
            profile_id: Some(self.profile_id.clone()).filter(|p| !p.is_empty()),
        }
    }

    pub fn worker_config(&self) -> DomainResult<AnalysisWorkerConfig> {
        Ok(AnalysisWorkerConfig {
            default_alert_channels: parse_channels(&self.default_alert_channels)?,
            geofence_zone_qty: self.geofence_zone_qty,
            device_params_widget_id: self.device_params_widget_id.clone(),
        })
    }
}
