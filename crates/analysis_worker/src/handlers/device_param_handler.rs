use crate::domain::KeyValueResolver;
use crate::router::AnalysisHandler;
use async_trait::async_trait;
use common::domain::{
    DeviceRepository, DomainError, DomainResult, EventBatchExt, EventRecord, Environment,
};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, instrument};

pub const DEVICE_PARAMS_EDIT_ROUTE: &str = "device_params_edit";

/// Applies a dynamic-table edit to the owning device.
///
/// Rows that carry a record id are stored data and are edited in place; any
/// other record is a parameter edit keyed by its variable.
pub struct DeviceParamEditHandler {
    devices: Arc<dyn DeviceRepository>,
}

impl DeviceParamEditHandler {
    pub fn new(devices: Arc<dyn DeviceRepository>) -> Self {
        Self { devices }
    }
}

#[async_trait]
impl AnalysisHandler for DeviceParamEditHandler {
    #[instrument(skip(self, batch, _env), fields(records = batch.len()))]
    async fn handle(&self, batch: &[EventRecord], _env: &Environment) -> DomainResult<()> {
        let device_id = batch
            .originating_device()
            .ok_or_else(|| DomainError::InvalidArgument("edit names no device".to_string()))?;

        let (rows, edits): (Vec<&EventRecord>, Vec<&EventRecord>) =
            batch.iter().partition(|r| r.id.is_some());

        for edit in &edits {
            match &edit.value {
                Some(Value::String(_)) => {}
                other => {
                    return Err(DomainError::InvalidArgument(format!(
                        "param {} must be a string, got {}",
                        edit.variable,
                        other.clone().unwrap_or(Value::Null)
                    )))
                }
            }
        }

        if !rows.is_empty() {
            let rows: Vec<EventRecord> = rows.into_iter().cloned().collect();
            debug!(device_id = %device_id, count = rows.len(), "editing data rows");
            self.devices.edit_device_data(device_id, rows).await?;
        }

        if !edits.is_empty() {
            let params = self.devices.list_params(device_id).await?;
            let mut resolver = KeyValueResolver::params(self.devices.clone(), params);
            for edit in &edits {
                resolver.set_json(&edit.variable, edit.value.as_ref().unwrap_or(&Value::Null))?;
            }
            let written = resolver.apply(device_id).await?;
            debug!(device_id = %device_id, written, "param edits applied");
        }

        Ok(())
    }
}
