use crate::domain::CheckinMonitor;
use crate::router::AnalysisHandler;
use async_trait::async_trait;
use common::domain::{
    DeviceRepository, DomainError, DomainResult, EventBatchExt, EventRecord, Environment,
};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

pub const CHECKIN_ROUTE: &str = "checkin";
/// Variable posted by the scheduled action that drives inactivity checks
pub const CHECKIN_TICK_VARIABLE: &str = "checkin_tick";

/// Runs the check-in monitor for the device named by a scheduled tick
pub struct CheckinHandler {
    devices: Arc<dyn DeviceRepository>,
    monitor: Arc<CheckinMonitor>,
}

impl CheckinHandler {
    pub fn new(devices: Arc<dyn DeviceRepository>, monitor: Arc<CheckinMonitor>) -> Self {
        Self { devices, monitor }
    }
}

#[async_trait]
impl AnalysisHandler for CheckinHandler {
    #[instrument(skip(self, batch, _env), fields(records = batch.len()))]
    async fn handle(&self, batch: &[EventRecord], _env: &Environment) -> DomainResult<()> {
        let device_id = batch
            .find_variable(CHECKIN_TICK_VARIABLE)
            .and_then(|r| r.value_str().filter(|v| !v.is_empty()))
            .or_else(|| batch.originating_device())
            .ok_or_else(|| DomainError::InvalidArgument("check-in tick names no device".to_string()))?;

        let device = self
            .devices
            .get_device_info(device_id)
            .await?
            .ok_or_else(|| DomainError::DeviceNotFound(device_id.to_string()))?;

        let Some(organization_id) = device.organization_id() else {
            warn!(device_id = %device.id, "device has no organization, check-in skipped");
            return Ok(());
        };

        let alerts = self
            .monitor
            .trigger(organization_id, &device.id, device.last_input)
            .await?;
        debug!(device_id = %device.id, alerts = alerts.len(), "check-in evaluated");
        Ok(())
    }
}
