use crate::domain::{Alert, AlertDispatcher, AlertState, KeyValueResolver, Transition};
use chrono::{DateTime, SecondsFormat, Utc};
use common::domain::{DeviceRepository, DomainError, DomainResult, UsageChannel};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Prefix of every device param configuring an inactivity threshold
pub const CHECKIN_PARAM_PREFIX: &str = "checkin_";

/// Inactivity threshold stored as `"<interval hours>,<RFC 3339 timestamp>"`
#[derive(Debug, Clone, PartialEq)]
pub struct CheckinParameter {
    pub interval_hours: f64,
    pub armed_since: DateTime<Utc>,
}

impl CheckinParameter {
    pub fn new(interval_hours: f64, armed_since: DateTime<Utc>) -> Self {
        Self {
            interval_hours,
            armed_since,
        }
    }

    /// Hours without input, counted from the later of the last input and
    /// the moment the threshold was configured
    pub fn elapsed_hours(&self, last_input: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
        let reference = last_input.max(self.armed_since);
        let seconds = (now - reference).num_seconds().max(0);
        seconds as f64 / 3600.0
    }
}

impl FromStr for CheckinParameter {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| DomainError::InvalidCheckinParameter(s.to_string(), reason.to_string());

        let (interval, armed_since) = s
            .split_once(',')
            .ok_or_else(|| invalid("expected <interval>,<timestamp>"))?;

        let interval_hours: f64 = interval
            .trim()
            .parse()
            .map_err(|_| invalid("interval is not a number"))?;
        if !interval_hours.is_finite() || interval_hours <= 0.0 {
            return Err(invalid("interval must be positive"));
        }

        let armed_since = DateTime::parse_from_rfc3339(armed_since.trim())
            .map_err(|_| invalid("timestamp is not RFC 3339"))?
            .with_timezone(&Utc);

        Ok(Self {
            interval_hours,
            armed_since,
        })
    }
}

impl fmt::Display for CheckinParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{}",
            self.interval_hours,
            self.armed_since.to_rfc3339_opts(SecondsFormat::Millis, true)
        )
    }
}

/// Inactivity alert that was dispatched during a trigger
#[derive(Debug, Clone, PartialEq)]
pub struct CheckinAlert {
    pub param_key: String,
    pub interval_hours: f64,
    pub elapsed_hours: f64,
    pub delivered: usize,
}

/// Compares the time since a device's last input against its check-in params
pub struct CheckinMonitor {
    devices: Arc<dyn DeviceRepository>,
    dispatcher: Arc<dyn AlertDispatcher>,
    channels: Vec<UsageChannel>,
}

impl CheckinMonitor {
    pub fn new(
        devices: Arc<dyn DeviceRepository>,
        dispatcher: Arc<dyn AlertDispatcher>,
        channels: Vec<UsageChannel>,
    ) -> Self {
        Self {
            devices,
            dispatcher,
            channels,
        }
    }

    pub async fn trigger(
        &self,
        organization_id: &str,
        device_id: &str,
        last_input: Option<DateTime<Utc>>,
    ) -> DomainResult<Vec<CheckinAlert>> {
        self.trigger_at(organization_id, device_id, last_input, Utc::now())
            .await
    }

    /// Evaluate every check-in threshold of the device at `now`.
    ///
    /// Without a last input the elapsed time is unknown: nothing fires and no
    /// flag changes.
    #[instrument(skip(self, last_input, now), fields(organization_id = %organization_id, device_id = %device_id))]
    pub async fn trigger_at(
        &self,
        organization_id: &str,
        device_id: &str,
        last_input: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> DomainResult<Vec<CheckinAlert>> {
        let Some(last_input) = last_input else {
            debug!("device has no last input, check-in skipped");
            return Ok(Vec::new());
        };

        let params = self.devices.list_params(device_id).await?;
        let checkins: Vec<_> = params
            .iter()
            .filter(|p| p.key.starts_with(CHECKIN_PARAM_PREFIX))
            .cloned()
            .collect();
        let mut resolver = KeyValueResolver::params(self.devices.clone(), params);
        let mut alerts = Vec::new();

        for entry in checkins {
            let parameter: CheckinParameter = match entry.value.parse() {
                Ok(parameter) => parameter,
                Err(e) => {
                    warn!(param_key = %entry.key, error = %e, "skipping check-in param");
                    continue;
                }
            };

            let elapsed_hours = parameter.elapsed_hours(last_input, now);
            let overdue = elapsed_hours >= parameter.interval_hours;
            let (state, transition) = AlertState::from_sent(entry.sent).next(overdue);

            match transition {
                Transition::Fire => {
                    let delivered = self
                        .dispatcher
                        .dispatch(Alert {
                            organization_id: organization_id.to_string(),
                            device_id: device_id.to_string(),
                            title: "Device inactive".to_string(),
                            message: format!(
                                "Device {} has not sent data for {:.1} hours (check-in interval {} hours)",
                                device_id, elapsed_hours, parameter.interval_hours
                            ),
                            channels: self.channels.clone(),
                        })
                        .await?;
                    info!(param_key = %entry.key, elapsed_hours, delivered, "check-in missed");
                    alerts.push(CheckinAlert {
                        param_key: entry.key.clone(),
                        interval_hours: parameter.interval_hours,
                        elapsed_hours,
                        delivered,
                    });
                }
                Transition::Rearm => {
                    info!(param_key = %entry.key, elapsed_hours, "device checked in again");
                }
                Transition::Hold => continue,
            }

            resolver.set_with_sent(&entry.key, &entry.value, state.is_sent())?;
        }

        resolver.apply(device_id).await?;
        Ok(alerts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MockAlertDispatcher;
    use chrono::{Duration, TimeZone};
    use common::domain::{InMemoryPlatform, KeyValueEntry, MockDeviceRepository};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn checkin_value(hours: f64) -> String {
        CheckinParameter::new(hours, now() - Duration::days(10)).to_string()
    }

    fn dispatcher(times: usize) -> MockAlertDispatcher {
        let mut dispatcher = MockAlertDispatcher::new();
        dispatcher
            .expect_dispatch()
            .withf(|alert: &Alert| alert.device_id == "dev-1" && alert.organization_id == "org-1")
            .times(times)
            .returning(|_| Ok(2));
        dispatcher
    }

    #[test]
    fn test_parse_parameter() {
        let parameter: CheckinParameter = "24,2024-05-01T00:00:00.000Z".parse().unwrap();
        assert_eq!(parameter.interval_hours, 24.0);
        assert_eq!(
            parameter.armed_since,
            Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(parameter.to_string(), "24,2024-05-01T00:00:00.000Z");
    }

    #[test]
    fn test_parse_rejects_malformed_values() {
        for value in ["24", "abc,2024-05-01T00:00:00Z", "0,2024-05-01T00:00:00Z", "24,yesterday"] {
            assert!(
                matches!(
                    value.parse::<CheckinParameter>(),
                    Err(DomainError::InvalidCheckinParameter(_, _))
                ),
                "{} should be rejected",
                value
            );
        }
    }

    #[test]
    fn test_elapsed_counts_from_configuration_when_later() {
        let parameter = CheckinParameter::new(24.0, now() - Duration::hours(2));
        assert_eq!(parameter.elapsed_hours(now() - Duration::hours(30), now()), 2.0);
    }

    #[tokio::test]
    async fn test_threshold_crossing_and_recovery() {
        let platform = Arc::new(InMemoryPlatform::new());
        platform
            .insert_params(
                "dev-1",
                vec![KeyValueEntry::new("checkin_daily", checkin_value(24.0)).with_id("p1")],
            )
            .await;

        let monitor = CheckinMonitor::new(platform.clone(), Arc::new(dispatcher(1)), vec![UsageChannel::Email]);
        let alerts = monitor
            .trigger_at("org-1", "dev-1", Some(now() - Duration::hours(25)), now())
            .await
            .unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].delivered, 2);
        let param = platform.param("dev-1", "checkin_daily").await.unwrap();
        assert!(param.sent);
        assert_eq!(param.id.as_deref(), Some("p1"));

        let alerts = monitor
            .trigger_at("org-1", "dev-1", Some(now() - Duration::hours(26)), now())
            .await
            .unwrap();
        assert!(alerts.is_empty());

        let alerts = monitor
            .trigger_at("org-1", "dev-1", Some(now() - Duration::hours(23)), now())
            .await
            .unwrap();
        assert!(alerts.is_empty());
        assert!(!platform.param("dev-1", "checkin_daily").await.unwrap().sent);
    }

    #[tokio::test]
    async fn test_thresholds_are_independent() {
        let platform = Arc::new(InMemoryPlatform::new());
        platform
            .insert_params(
                "dev-1",
                vec![
                    KeyValueEntry::new("checkin_short", checkin_value(12.0)),
                    KeyValueEntry::new("checkin_long", checkin_value(48.0)),
                    KeyValueEntry::new("checkin_broken", "soon"),
                    KeyValueEntry::new("threshold", "5"),
                ],
            )
            .await;

        let monitor = CheckinMonitor::new(platform.clone(), Arc::new(dispatcher(1)), vec![]);
        let alerts = monitor
            .trigger_at("org-1", "dev-1", Some(now() - Duration::hours(25)), now())
            .await
            .unwrap();

        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].param_key, "checkin_short");
        assert!(platform.param("dev-1", "checkin_short").await.unwrap().sent);
        assert!(!platform.param("dev-1", "checkin_long").await.unwrap().sent);
        assert_eq!(platform.param_writes("dev-1").await, 1);
    }

    #[tokio::test]
    async fn test_absent_last_input_touches_nothing() {
        let mut devices = MockDeviceRepository::new();
        devices.expect_list_params().times(0);
        devices.expect_set_params().times(0);

        let monitor = CheckinMonitor::new(Arc::new(devices), Arc::new(dispatcher(0)), vec![]);
        let alerts = monitor.trigger_at("org-1", "dev-1", None, now()).await.unwrap();
        assert!(alerts.is_empty());
    }
}
