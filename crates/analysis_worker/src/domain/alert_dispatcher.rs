use crate::domain::{ChargeRequest, UsageMeter};
use async_trait::async_trait;
use chrono::Utc;
use common::domain::{
    DeviceRepository, DomainResult, EmailMessage, EventRecord, Notification, NotificationService,
    SmsMessage, UsageChannel, UserFilter, UserInfo, UserRepository,
};
use common::garde::validate_struct;
use garde::Validate;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Variable of the record appended to a device for every dispatched alert
pub const ALERT_HISTORY_VARIABLE: &str = "alert_history";

/// Alert addressed to every member of an organization
#[derive(Debug, Clone, PartialEq, Eq, Validate)]
pub struct Alert {
    #[garde(length(min = 1))]
    pub organization_id: String,
    #[garde(length(min = 1))]
    pub device_id: String,
    #[garde(length(min = 1))]
    pub title: String,
    #[garde(skip)]
    pub message: String,
    #[garde(skip)]
    pub channels: Vec<UsageChannel>,
}

/// Alert-sending collaborator used by the geofence and check-in paths
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AlertDispatcher: Send + Sync {
    /// Deliver the alert and return the number of messages sent
    async fn dispatch(&self, alert: Alert) -> DomainResult<usize>;
}

/// Dispatcher that charges the organization's plan before each channel
pub struct PlatformAlertDispatcher {
    devices: Arc<dyn DeviceRepository>,
    users: Arc<dyn UserRepository>,
    notifications: Arc<dyn NotificationService>,
    meter: Arc<UsageMeter>,
}

impl PlatformAlertDispatcher {
    pub fn new(
        devices: Arc<dyn DeviceRepository>,
        users: Arc<dyn UserRepository>,
        notifications: Arc<dyn NotificationService>,
        meter: Arc<UsageMeter>,
    ) -> Self {
        Self {
            devices,
            users,
            notifications,
            meter,
        }
    }

    async fn deliver(
        &self,
        channel: UsageChannel,
        recipients: &[&UserInfo],
        alert: &Alert,
    ) -> DomainResult<()> {
        for user in recipients {
            match channel {
                UsageChannel::Notification => {
                    self.notifications
                        .send_notification(
                            &user.id,
                            Notification {
                                title: alert.title.clone(),
                                message: alert.message.clone(),
                            },
                        )
                        .await?
                }
                UsageChannel::Email => {
                    if let Some(email) = reachable_address(&user.email) {
                        self.notifications
                            .send_email(EmailMessage {
                                to: email.to_string(),
                                subject: alert.title.clone(),
                                message: alert.message.clone(),
                            })
                            .await?
                    }
                }
                UsageChannel::Sms => {
                    if let Some(phone) = reachable_address(&user.phone) {
                        self.notifications
                            .send_sms(SmsMessage {
                                to: phone.to_string(),
                                message: alert.message.clone(),
                            })
                            .await?
                    }
                }
            }
        }
        Ok(())
    }
}

fn reachable_address(address: &Option<String>) -> Option<&str> {
    address.as_deref().map(str::trim).filter(|a| !a.is_empty())
}

/// Members that can receive messages on `channel`
pub fn reachable_recipients(users: &[UserInfo], channel: UsageChannel) -> Vec<&UserInfo> {
    users
        .iter()
        .filter(|user| match channel {
            UsageChannel::Notification => true,
            UsageChannel::Email => reachable_address(&user.email).is_some(),
            UsageChannel::Sms => reachable_address(&user.phone).is_some(),
        })
        .collect()
}

#[async_trait]
impl AlertDispatcher for PlatformAlertDispatcher {
    #[instrument(skip(self, alert), fields(organization_id = %alert.organization_id, device_id = %alert.device_id))]
    async fn dispatch(&self, alert: Alert) -> DomainResult<usize> {
        validate_struct(&alert)?;

        let members = self
            .users
            .list_users(UserFilter::organization(&alert.organization_id))
            .await?;

        let mut delivered = 0;
        for channel in &alert.channels {
            let recipients = reachable_recipients(&members, *channel);
            let permitted = self
                .meter
                .check_and_charge(ChargeRequest::new(
                    alert.organization_id.clone(),
                    *channel,
                    recipients.len() as u64,
                ))
                .await?;

            if !permitted {
                info!(channel = %channel, "plan limit reached, channel skipped");
                continue;
            }

            self.deliver(*channel, &recipients, &alert).await?;
            delivered += recipients.len();
        }

        let record = EventRecord::new(ALERT_HISTORY_VARIABLE, alert.message.clone(), alert.device_id.clone())
            .with_time(Utc::now())
            .with_metadata("title", alert.title.clone())
            .with_metadata("delivered", delivered);
        self.devices
            .send_device_data(&alert.device_id, vec![record])
            .await?;

        debug!(delivered, "alert dispatched");
        Ok(delivered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::domain::{Delivery, InMemoryPlatform, KeyValueEntry, Tag, ORGANIZATION_TAG};

    fn user(id: &str, email: Option<&str>, phone: Option<&str>) -> UserInfo {
        UserInfo {
            id: id.to_string(),
            name: id.to_string(),
            email: email.map(str::to_string),
            phone: phone.map(str::to_string),
            tags: vec![Tag::new(ORGANIZATION_TAG, "org-1")],
        }
    }

    async fn platform() -> Arc<InMemoryPlatform> {
        let platform = Arc::new(InMemoryPlatform::new());
        platform
            .insert_user(user("u1", Some("ada@example.com"), Some("+4912345")))
            .await;
        platform.insert_user(user("u2", Some(" "), None)).await;
        platform
            .insert_params(
                "org-1",
                vec![
                    KeyValueEntry::new("plan_email_limit", "100"),
                    KeyValueEntry::new("plan_sms_limit", "0"),
                    KeyValueEntry::new("plan_notification_limit", "100"),
                ],
            )
            .await;
        platform
    }

    fn dispatcher(platform: &Arc<InMemoryPlatform>) -> PlatformAlertDispatcher {
        let meter = Arc::new(UsageMeter::new(
            platform.clone(),
            platform.clone(),
            platform.clone(),
            platform.clone(),
        ));
        PlatformAlertDispatcher::new(platform.clone(), platform.clone(), platform.clone(), meter)
    }

    fn alert(channels: Vec<UsageChannel>) -> Alert {
        Alert {
            organization_id: "org-1".to_string(),
            device_id: "dev-1".to_string(),
            title: "Tracker left Depot".to_string(),
            message: "Tracker left the Depot zone".to_string(),
            channels,
        }
    }

    #[test]
    fn test_reachable_recipients() {
        let users = vec![user("u1", Some("a@b.c"), None), user("u2", None, Some("+1"))];
        assert_eq!(reachable_recipients(&users, UsageChannel::Email).len(), 1);
        assert_eq!(reachable_recipients(&users, UsageChannel::Sms)[0].id, "u2");
        assert_eq!(reachable_recipients(&users, UsageChannel::Notification).len(), 2);
    }

    #[tokio::test]
    async fn test_dispatch_charges_reachable_recipients() {
        let platform = platform().await;
        let delivered = dispatcher(&platform)
            .dispatch(alert(vec![UsageChannel::Email, UsageChannel::Notification]))
            .await
            .unwrap();

        assert_eq!(delivered, 3);
        assert_eq!(platform.param("org-1", "email_usage").await.unwrap().value, "1");
        assert_eq!(
            platform.param("org-1", "notification_usage").await.unwrap().value,
            "2"
        );

        let history = platform.data("dev-1").await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].variable, ALERT_HISTORY_VARIABLE);
    }

    #[tokio::test]
    async fn test_dispatch_skips_channel_over_limit() {
        let platform = platform().await;
        let delivered = dispatcher(&platform)
            .dispatch(alert(vec![UsageChannel::Sms]))
            .await
            .unwrap();

        assert_eq!(delivered, 0);
        assert!(platform
            .deliveries()
            .await
            .iter()
            .all(|d| !matches!(d, Delivery::Sms(_))));
    }

    #[tokio::test]
    async fn test_dispatch_rejects_missing_organization() {
        let platform = platform().await;
        let mut invalid = alert(vec![UsageChannel::Email]);
        invalid.organization_id = String::new();

        assert!(dispatcher(&platform).dispatch(invalid).await.is_err());
        assert!(platform.deliveries().await.is_empty());
    }
}
