use opentelemetry::KeyValue;
use opentelemetry_sdk::{logs::LoggerProvider, trace::TracerProvider as SdkTracerProvider};
use opentelemetry_semantic_conventions::resource::{SERVICE_NAME, SERVICE_VERSION};

/// Resource attribute naming the platform profile an invocation runs under
pub const PROFILE_ID_ATTRIBUTE: &str = "analysis.profile_id";

/// Logging and export settings of one analysis run
#[derive(Clone, Debug)]
pub struct TelemetryConfig {
    pub service_name: String,
    pub service_version: String,
    pub otel_endpoint: String,
    pub otel_enabled: bool,
    pub log_level: String,
    /// Attached to every exported span and log record when set
    pub profile_id: Option<String>,
}

impl TelemetryConfig {
    /// Attributes shared by the trace and log resources
    pub fn resource_attributes(&self) -> Vec<KeyValue> {
        let mut attributes = vec![
            KeyValue::new(SERVICE_NAME, self.service_name.clone()),
            KeyValue::new(SERVICE_VERSION, self.service_version.clone()),
        ];
        if let Some(profile_id) = self.profile_id.as_deref().filter(|p| !p.is_empty()) {
            attributes.push(KeyValue::new(PROFILE_ID_ATTRIBUTE, profile_id.to_string()));
        }
        attributes
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "analysis".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            otel_endpoint: "http://localhost:4317".to_string(),
            otel_enabled: false,
            log_level: "info".to_string(),
            profile_id: None,
        }
    }
}

/// Providers kept alive until `shutdown_telemetry` flushes them
pub struct TelemetryProviders {
    pub tracer_provider: SdkTracerProvider,
    pub logger_provider: LoggerProvider,
}
