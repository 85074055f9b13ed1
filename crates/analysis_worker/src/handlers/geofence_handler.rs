use crate::domain::GeofenceEvaluator;
use crate::router::AnalysisHandler;
use async_trait::async_trait;
use common::domain::{DomainError, DomainResult, EventRecord, Environment};
use std::sync::Arc;
use tracing::{debug, instrument};

pub const GEOFENCE_ROUTE: &str = "geofence";
/// Variable of the uplink record carrying the device position
pub const LOCATION_VARIABLE: &str = "location";

/// Evaluates a position uplink against the device's zones
pub struct GeofenceHandler {
    evaluator: Arc<GeofenceEvaluator>,
}

impl GeofenceHandler {
    pub fn new(evaluator: Arc<GeofenceEvaluator>) -> Self {
        Self { evaluator }
    }
}

#[async_trait]
impl AnalysisHandler for GeofenceHandler {
    #[instrument(skip(self, batch, _env), fields(records = batch.len()))]
    async fn handle(&self, batch: &[EventRecord], _env: &Environment) -> DomainResult<()> {
        let (device_id, point) = batch
            .iter()
            .rev()
            .filter(|r| r.variable == LOCATION_VARIABLE)
            .find_map(|r| r.location.map(|point| (r.device.as_str(), point)))
            .ok_or_else(|| {
                DomainError::InvalidArgument("batch carries no location record".to_string())
            })?;

        let alerts = self.evaluator.evaluate(device_id, point).await?;
        debug!(device_id = %device_id, alerts = alerts.len(), "geofence evaluated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Alert, MockAlertDispatcher, CHANNELS_TAG};
    use common::domain::{
        ActionInfo, DeviceInfo, GeoPoint, InMemoryPlatform, Tag, UsageChannel, GEOFENCE_VARIABLE,
        ORGANIZATION_TAG,
    };
    use serde_json::json;

    async fn platform() -> Arc<InMemoryPlatform> {
        let platform = Arc::new(InMemoryPlatform::new());
        platform
            .insert_device(DeviceInfo {
                id: "dev-1".to_string(),
                name: "Tracker".to_string(),
                tags: vec![Tag::new(ORGANIZATION_TAG, "org-1")],
                last_input: None,
            })
            .await;
        platform
            .insert_device(DeviceInfo {
                id: "org-1".to_string(),
                name: "Acme".to_string(),
                tags: vec![],
                last_input: None,
            })
            .await;
        platform
            .insert_action(ActionInfo {
                id: "act-1".to_string(),
                name: "Depot alert".to_string(),
                tags: vec![Tag::new(CHANNELS_TAG, "sms,email")],
                trigger: vec![],
            })
            .await;
        platform
            .insert_data(
                "org-1",
                vec![EventRecord::new(GEOFENCE_VARIABLE, "Depot", "org-1")
                    .with_id("z1")
                    .with_metadata(
                        "geolocation",
                        json!({"type": "Point", "coordinates": [13.405, 52.52], "radius": 500.0}),
                    )
                    .with_metadata("event", "red")
                    .with_metadata("action_id", "act-1")],
            )
            .await;
        platform
    }

    fn handler(platform: &Arc<InMemoryPlatform>, dispatcher: MockAlertDispatcher) -> GeofenceHandler {
        GeofenceHandler::new(Arc::new(GeofenceEvaluator::new(
            platform.clone(),
            platform.clone(),
            Arc::new(dispatcher),
            vec![UsageChannel::Notification],
            100,
        )))
    }

    fn uplink(lat: f64, lng: f64) -> Vec<EventRecord> {
        vec![EventRecord::new(LOCATION_VARIABLE, "fix", "dev-1").with_location(GeoPoint::new(lat, lng))]
    }

    #[tokio::test]
    async fn test_entry_dispatches_on_action_channels() {
        let platform = platform().await;
        let mut dispatcher = MockAlertDispatcher::new();
        dispatcher
            .expect_dispatch()
            .withf(|alert: &Alert| {
                alert.organization_id == "org-1"
                    && alert.title == "Tracker entered Depot"
                    && alert.channels == vec![UsageChannel::Sms, UsageChannel::Email]
            })
            .times(1)
            .returning(|_| Ok(1));

        let handler = handler(&platform, dispatcher);
        handler.handle(&uplink(52.5201, 13.405), &Environment::new()).await.unwrap();
        handler.handle(&uplink(52.5202, 13.405), &Environment::new()).await.unwrap();
    }

    #[tokio::test]
    async fn test_outside_position_dispatches_nothing() {
        let platform = platform().await;
        let mut dispatcher = MockAlertDispatcher::new();
        dispatcher.expect_dispatch().times(0);

        handler(&platform, dispatcher)
            .handle(&uplink(48.0, 11.0), &Environment::new())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_batch_without_position_is_rejected() {
        let platform = platform().await;
        let batch = vec![EventRecord::new(LOCATION_VARIABLE, "fix", "dev-1")];

        let result = handler(&platform, MockAlertDispatcher::new())
            .handle(&batch, &Environment::new())
            .await;
        assert!(matches!(result, Err(DomainError::InvalidArgument(_))));
    }
}
