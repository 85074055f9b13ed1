use crate::domain::{AlertState, KeyValueResolver, Transition};
use common::domain::{
    DeviceRepository, DomainResult, Notification, NotificationService, ServiceQuota, UsageChannel,
    UsageCounter, UserFilter, UserRepository,
};
use common::garde::validate_struct;
use garde::Validate;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Request to attribute `quantity` deliveries to an organization's plan
#[derive(Debug, Clone, PartialEq, Eq, Validate)]
pub struct ChargeRequest {
    #[garde(length(min = 1))]
    pub organization_id: String,
    #[garde(skip)]
    pub channel: UsageChannel,
    #[garde(skip)]
    pub quantity: u64,
}

impl ChargeRequest {
    pub fn new(organization_id: impl Into<String>, channel: UsageChannel, quantity: u64) -> Self {
        Self {
            organization_id: organization_id.into(),
            channel,
            quantity,
        }
    }
}

/// Per-organization plan usage with a one-shot over-limit alert
pub struct UsageMeter {
    devices: Arc<dyn DeviceRepository>,
    users: Arc<dyn UserRepository>,
    notifications: Arc<dyn NotificationService>,
    quota: Arc<dyn ServiceQuota>,
}

impl UsageMeter {
    pub fn new(
        devices: Arc<dyn DeviceRepository>,
        users: Arc<dyn UserRepository>,
        notifications: Arc<dyn NotificationService>,
        quota: Arc<dyn ServiceQuota>,
    ) -> Self {
        Self {
            devices,
            users,
            notifications,
            quota,
        }
    }

    /// Current counter of one channel
    pub async fn counter(
        &self,
        organization_id: &str,
        channel: UsageChannel,
    ) -> DomainResult<UsageCounter> {
        let params = self.devices.list_params(organization_id).await?;
        UsageCounter::from_params(&params, channel)
    }

    /// Charge the plan and report whether the delivery may proceed.
    ///
    /// Exceeding the limit is a `false` return, never an error. Members are
    /// told once per excursion; the flag resets with the next charge that fits.
    #[instrument(skip(self, request), fields(organization_id = %request.organization_id, channel = %request.channel, quantity = request.quantity))]
    pub async fn check_and_charge(&self, request: ChargeRequest) -> DomainResult<bool> {
        validate_struct(&request)?;

        if request.quantity == 0 {
            debug!("nothing to charge");
            return Ok(true);
        }

        if self.quota.is_exhausted(request.channel).await? {
            warn!(channel = %request.channel, "platform quota exhausted, delivery refused");
            return Ok(false);
        }

        let params = self.devices.list_params(&request.organization_id).await?;
        let counter = UsageCounter::from_params(&params, request.channel)?;
        let projected = counter.used.saturating_add(request.quantity);
        let over_limit = projected > counter.limit;
        let (state, transition) = AlertState::from_sent(counter.sent).next(over_limit);

        let mut resolver = KeyValueResolver::params(self.devices.clone(), params);
        let usage_key = request.channel.usage_key();

        if !over_limit {
            resolver.set_with_sent(&usage_key, &projected.to_string(), state.is_sent())?;
            resolver.apply(&request.organization_id).await?;
            debug!(used = projected, limit = counter.limit, "usage charged");
            return Ok(true);
        }

        if transition == Transition::Fire {
            self.notify_members(&request.organization_id, request.channel, counter.limit)
                .await?;
            resolver.set_with_sent(&usage_key, &counter.used.to_string(), state.is_sent())?;
            resolver.apply(&request.organization_id).await?;
            info!(used = counter.used, limit = counter.limit, "usage limit reached, members notified");
        } else {
            debug!(used = counter.used, limit = counter.limit, "usage limit already reported");
        }

        Ok(false)
    }

    async fn notify_members(
        &self,
        organization_id: &str,
        channel: UsageChannel,
        limit: u64,
    ) -> DomainResult<()> {
        let members = self
            .users
            .list_users(UserFilter::organization(organization_id))
            .await?;

        let notification = Notification {
            title: "Usage limit reached".to_string(),
            message: format!(
                "Your organization has reached its {} limit of {}. Further messages on this channel will not be delivered.",
                channel, limit
            ),
        };

        for member in &members {
            self.notifications
                .send_notification(&member.id, notification.clone())
                .await?;
        }
        debug!(count = members.len(), "over-limit notice sent");
        Ok(())
    }
}
