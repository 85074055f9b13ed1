mod config;

use analysis_worker::{AnalysisWorker, PlatformDependencies, RouterOutcome};
use anyhow::{Context, Result};
use common::domain::AnalysisInvocation;
use common::http::{
    HttpActionRepository, HttpDeviceRepository, HttpNotificationService, HttpServiceQuota,
    HttpUserRepository, PlatformClient,
};
use common::telemetry::{init_telemetry, shutdown_telemetry, TelemetryProviders};
use config::ServiceConfig;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tracing::{debug, error, info};

#[tokio::main]
async fn main() {
    // Initialize configuration and tracing
    let config = match ServiceConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let telemetry_providers: Option<TelemetryProviders> =
        match init_telemetry(&config.telemetry_config()) {
            Ok(provider) => provider,
            Err(e) => {
                eprintln!("Failed to initialize telemetry: {}", e);
                std::process::exit(1);
            }
        };

    info!(
        otel_enabled = config.otel_enabled,
        api_url = %config.api_url,
        "Starting analysis-all-in-one"
    );
    debug!(
        log_level = %config.log_level,
        invocation_path = ?config.invocation_path,
        default_alert_channels = %config.default_alert_channels,
        "Configuration loaded"
    );

    let exit_code = match run(&config).await {
        Ok(outcome) if outcome.is_success() => {
            info!(handlers_run = ?outcome.handlers_run, "Invocation completed");
            0
        }
        Ok(outcome) => {
            for (handler, e) in &outcome.errors {
                error!(handler = %handler, error = %e, "Handler failed");
            }
            1
        }
        Err(e) => {
            error!("Invocation failed: {:#}", e);
            1
        }
    };

    shutdown_telemetry(telemetry_providers);
    std::process::exit(exit_code);
}

async fn run(config: &ServiceConfig) -> Result<RouterOutcome> {
    let invocation = read_invocation(config.invocation_path.as_deref()).await?;
    info!(
        records = invocation.data.len(),
        "Invocation payload decoded"
    );

    let client = PlatformClient::new(&config.platform_config())
        .context("Failed to create platform client")?;
    let deps = PlatformDependencies {
        devices: Arc::new(HttpDeviceRepository::new(client.clone())),
        actions: Arc::new(HttpActionRepository::new(client.clone())),
        users: Arc::new(HttpUserRepository::new(client.clone())),
        notifications: Arc::new(HttpNotificationService::new(client.clone())),
        quota: Arc::new(HttpServiceQuota::new(client)),
    };

    let worker_config = config
        .worker_config()
        .context("Invalid handler configuration")?;
    let worker = AnalysisWorker::new(deps, worker_config);

    let outcome = worker.run(&invocation).await?;
    Ok(outcome)
}

async fn read_invocation(path: Option<&str>) -> Result<AnalysisInvocation> {
    let payload = match path {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read invocation from {}", path))?,
        None => {
            let mut payload = String::new();
            tokio::io::stdin()
                .read_to_string(&mut payload)
                .await
                .context("Failed to read invocation from stdin")?;
            payload
        }
    };

    serde_json::from_str(&payload).context("Invocation payload is not valid JSON")
}
