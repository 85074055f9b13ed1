use crate::domain::{zone_contains, Alert, AlertDispatcher, AlertState, KeyValueResolver, Transition};
use common::domain::{
    parse_channels, ActionInfo, ActionRepository, DeviceDataQuery, DeviceInfo, DeviceRepository,
    DomainError, DomainResult, GeoPoint, UsageChannel, Zone, GEOFENCE_VARIABLE,
};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Prefix of the device param holding a zone's alert flag
pub const GEOFENCE_PARAM_PREFIX: &str = "geofence_";
/// Action tag listing the channels a zone alert goes out on
pub const CHANNELS_TAG: &str = "channels";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeofenceEvent {
    Entered,
    Exited,
}

impl fmt::Display for GeofenceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeofenceEvent::Entered => f.write_str("entered"),
            GeofenceEvent::Exited => f.write_str("exited"),
        }
    }
}

/// Zone transition that was dispatched during an evaluation
#[derive(Debug, Clone, PartialEq)]
pub struct GeofenceAlert {
    pub organization_id: Option<String>,
    pub device_id: String,
    pub device_name: String,
    pub zone_id: String,
    pub zone_name: String,
    pub event: GeofenceEvent,
    pub point: GeoPoint,
    pub action: Option<ActionInfo>,
    pub delivered: usize,
}

pub fn geofence_param_key(zone_id: &str) -> String {
    format!("{}{}", GEOFENCE_PARAM_PREFIX, zone_id)
}

/// Edge-triggered zone membership for a device's whole hierarchy
pub struct GeofenceEvaluator {
    devices: Arc<dyn DeviceRepository>,
    actions: Arc<dyn ActionRepository>,
    dispatcher: Arc<dyn AlertDispatcher>,
    default_channels: Vec<UsageChannel>,
    zone_qty: u32,
}

impl GeofenceEvaluator {
    pub fn new(
        devices: Arc<dyn DeviceRepository>,
        actions: Arc<dyn ActionRepository>,
        dispatcher: Arc<dyn AlertDispatcher>,
        default_channels: Vec<UsageChannel>,
        zone_qty: u32,
    ) -> Self {
        Self {
            devices,
            actions,
            dispatcher,
            default_channels,
            zone_qty,
        }
    }

    /// Evaluate `point` against every zone of the device's organization,
    /// group and subgroup and dispatch the alerts that fire now.
    ///
    /// Flags are written in a single param update after every alert went
    /// out; a failed dispatch leaves all flags untouched so the next
    /// evaluation fires again.
    #[instrument(skip(self), fields(device_id = %device_id))]
    pub async fn evaluate(&self, device_id: &str, point: GeoPoint) -> DomainResult<Vec<GeofenceAlert>> {
        let device = self
            .devices
            .get_device_info(device_id)
            .await?
            .ok_or_else(|| DomainError::DeviceNotFound(device_id.to_string()))?;

        let zones = self.load_zones(&device).await?;
        debug!(zone_count = zones.len(), lat = point.lat, lng = point.lng, "evaluating geofences");

        let params = self.devices.list_params(device_id).await?;
        let mut resolver = KeyValueResolver::params(self.devices.clone(), params);
        let mut alerts = Vec::new();

        for zone in zones {
            let inside = zone_contains(&zone, point);
            let key = geofence_param_key(&zone.id);
            let sent = resolver.get(&key).is_some_and(|e| e.sent);
            let (state, transition) = AlertState::from_sent(sent).next(zone.event_color.is_alerting(inside));

            if transition == Transition::Fire {
                let Some(action) = self.resolve_action(&zone).await? else {
                    continue;
                };
                let event = if inside {
                    GeofenceEvent::Entered
                } else {
                    GeofenceEvent::Exited
                };
                let delivered = self
                    .dispatch(&device, &zone, event, point, action.as_ref())
                    .await?;
                info!(zone_id = %zone.id, event = %event, delivered, "geofence transition");
                alerts.push(GeofenceAlert {
                    organization_id: device.organization_id().map(str::to_string),
                    device_id: device.id.clone(),
                    device_name: device.name.clone(),
                    zone_id: zone.id.clone(),
                    zone_name: zone.name.clone(),
                    event,
                    point,
                    action,
                    delivered,
                });
            }

            resolver.set_with_sent(&key, zone.event_color.as_str(), state.is_sent())?;
        }

        resolver.apply(device_id).await?;
        Ok(alerts)
    }

    async fn dispatch(
        &self,
        device: &DeviceInfo,
        zone: &Zone,
        event: GeofenceEvent,
        point: GeoPoint,
        action: Option<&ActionInfo>,
    ) -> DomainResult<usize> {
        let Some(organization_id) = device.organization_id() else {
            warn!(device_id = %device.id, zone_id = %zone.id, "device has no organization, alert dropped");
            return Ok(0);
        };

        self.dispatcher
            .dispatch(Alert {
                organization_id: organization_id.to_string(),
                device_id: device.id.clone(),
                title: format!("{} {} {}", device.name, event, zone.name),
                message: format!(
                    "{} {} zone {} at {:.5}, {:.5}",
                    device.name, event, zone.name, point.lat, point.lng
                ),
                channels: self.channels(zone, action),
            })
            .await
    }

    /// Channels from the action's `channels` tag, else the configured defaults
    fn channels(&self, zone: &Zone, action: Option<&ActionInfo>) -> Vec<UsageChannel> {
        let Some(list) = action.and_then(|a| a.tag(CHANNELS_TAG)) else {
            return self.default_channels.clone();
        };
        match parse_channels(list) {
            Ok(channels) if !channels.is_empty() => channels,
            Ok(_) => self.default_channels.clone(),
            Err(e) => {
                warn!(zone_id = %zone.id, error = %e, "invalid action channels, using defaults");
                self.default_channels.clone()
            }
        }
    }

    /// Zones of every hierarchy entity, first occurrence of an id wins
    async fn load_zones(&self, device: &DeviceInfo) -> DomainResult<Vec<Zone>> {
        let mut zones: Vec<Zone> = Vec::new();
        for entity_id in device.hierarchy_ids() {
            let query = DeviceDataQuery {
                variables: vec![GEOFENCE_VARIABLE.to_string()],
                groups: Vec::new(),
                qty: self.zone_qty,
            };
            let records = match self.devices.get_device_data(entity_id, query).await {
                Ok(records) => records,
                Err(e) if e.is_not_found() => {
                    warn!(entity_id = %entity_id, "hierarchy entity not found, zones skipped");
                    continue;
                }
                Err(e) => return Err(e),
            };

            for record in &records {
                match Zone::from_record(record) {
                    Ok(zone) if zones.iter().any(|z| z.id == zone.id) => {}
                    Ok(zone) => zones.push(zone),
                    Err(e) => warn!(entity_id = %entity_id, error = %e, "skipping invalid zone"),
                }
            }
        }
        Ok(zones)
    }

    /// `Ok(None)` means the zone references an action that no longer exists
    async fn resolve_action(&self, zone: &Zone) -> DomainResult<Option<Option<ActionInfo>>> {
        let Some(action_id) = zone.action_id.as_deref() else {
            return Ok(Some(None));
        };

        match self.actions.get_action_info(action_id).await {
            Ok(Some(action)) => Ok(Some(Some(action))),
            Ok(None) => {
                warn!(zone_id = %zone.id, action_id = %action_id, "zone action no longer exists, skipped");
                Ok(None)
            }
            Err(e) if e.is_not_found() => {
                warn!(zone_id = %zone.id, action_id = %action_id, "zone action no longer exists, skipped");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}
