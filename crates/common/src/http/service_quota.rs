use crate::domain::{DomainResult, ServiceQuota, UsageChannel};
use crate::http::PlatformClient;
use async_trait::async_trait;
use serde_json::Value;
use tracing::{instrument, warn};

/// Account-level quota read from the profile limits and statistics
#[derive(Clone)]
pub struct HttpServiceQuota {
    client: PlatformClient,
    profile_id: String,
}

impl HttpServiceQuota {
    /// Quota of the profile configured on the client
    pub fn new(client: PlatformClient) -> Self {
        let profile_id = client.profile_id().to_string();
        Self { client, profile_id }
    }
}

/// Key used by the profile limit and statistics documents
pub fn quota_key(channel: UsageChannel) -> &'static str {
    match channel {
        UsageChannel::Email => "email",
        UsageChannel::Sms => "sms",
        UsageChannel::Notification => "push_notification",
    }
}

/// True when statistics have reached the limit; a missing limit never exhausts
pub fn quota_exhausted(limits: &Value, statistics: &Value, channel: UsageChannel) -> bool {
    let key = quota_key(channel);
    let Some(limit) = limits.get(key).and_then(Value::as_f64) else {
        return false;
    };
    let used = statistics.get(key).and_then(Value::as_f64).unwrap_or(0.0);
    used >= limit
}

#[async_trait]
impl ServiceQuota for HttpServiceQuota {
    #[instrument(skip(self), fields(channel = %channel, profile_id = %self.profile_id))]
    async fn is_exhausted(&self, channel: UsageChannel) -> DomainResult<bool> {
        if self.profile_id.is_empty() {
            return Ok(false);
        }

        let limits: Option<Value> = self
            .client
            .get(&format!("profile/{}/limits", self.profile_id), &[])
            .await?;
        let statistics: Option<Value> = self
            .client
            .get(&format!("profile/{}/statistics", self.profile_id), &[])
            .await?;

        match (limits, statistics) {
            (Some(limits), Some(statistics)) => Ok(quota_exhausted(&limits, &statistics, channel)),
            _ => {
                warn!(profile_id = %self.profile_id, "profile limits unavailable, assuming quota left");
                Ok(false)
            }
        }
    }
}
