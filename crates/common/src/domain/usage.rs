use crate::domain::{find_entry, DomainError, DomainResult, KeyValueEntry};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Metered delivery channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UsageChannel {
    Email,
    Sms,
    Notification,
}

impl UsageChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            UsageChannel::Email => "email",
            UsageChannel::Sms => "sms",
            UsageChannel::Notification => "notification",
        }
    }

    /// Organization param holding the plan limit
    pub fn limit_key(&self) -> String {
        format!("plan_{}_limit", self.as_str())
    }

    /// Organization param holding the consumed quantity and alert flag
    pub fn usage_key(&self) -> String {
        format!("{}_usage", self.as_str())
    }
}

impl fmt::Display for UsageChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UsageChannel {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "email" => Ok(UsageChannel::Email),
            "sms" => Ok(UsageChannel::Sms),
            "notification" | "push" => Ok(UsageChannel::Notification),
            other => Err(DomainError::InvalidArgument(format!(
                "unknown usage channel: {}",
                other
            ))),
        }
    }
}

/// Parse a comma separated channel list, e.g. `"email,sms"`
pub fn parse_channels(list: &str) -> DomainResult<Vec<UsageChannel>> {
    let mut channels: Vec<UsageChannel> = Vec::new();
    for part in list.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let channel: UsageChannel = part.parse()?;
        if !channels.contains(&channel) {
            channels.push(channel);
        }
    }
    Ok(channels)
}

/// Per-organization counter for one channel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UsageCounter {
    pub limit: u64,
    pub used: u64,
    pub sent: bool,
}

impl UsageCounter {
    /// Read the counter from organization params; absent params count as zero
    pub fn from_params(params: &[KeyValueEntry], channel: UsageChannel) -> DomainResult<Self> {
        let limit = match find_entry(params, &channel.limit_key()) {
            Some(entry) => parse_quantity(&entry.key, &entry.value)?,
            None => 0,
        };
        let (used, sent) = match find_entry(params, &channel.usage_key()) {
            Some(entry) => (parse_quantity(&entry.key, &entry.value)?, entry.sent),
            None => (0, false),
        };
        Ok(Self { limit, used, sent })
    }
}

fn parse_quantity(key: &str, value: &str) -> DomainResult<u64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(0);
    }
    trimmed.parse::<u64>().map_err(|_| {
        DomainError::InvalidArgument(format!("param {} is not a quantity: {}", key, value))
    })
}

/// Platform-wide delivery quota of the hosting account
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ServiceQuota: Send + Sync {
    /// True when the account cannot deliver more on this channel
    async fn is_exhausted(&self, channel: UsageChannel) -> DomainResult<bool>;
}
