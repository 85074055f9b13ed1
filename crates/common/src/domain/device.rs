use crate::domain::{find_tag, DomainResult, EventRecord, KeyValueEntry, Tag};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::warn;

/// Tag naming the organization that owns a device or user
pub const ORGANIZATION_TAG: &str = "organization_id";
/// Tag naming the group that owns a device
pub const GROUP_TAG: &str = "group_id";
/// Tag naming the subgroup that owns a device
pub const SUBGROUP_TAG: &str = "subgroup_id";

/// Device (or hierarchy entity) as returned by the platform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub tags: Vec<Tag>,
    /// Unparsable timestamps read as absent
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub last_input: Option<DateTime<Utc>>,
}

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    let text = match raw {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::String(text)) if text.trim().is_empty() => return Ok(None),
        Some(Value::String(text)) => text,
        Some(other) => {
            warn!(value = %other, "last input is not a timestamp, treated as absent");
            return Ok(None);
        }
    };

    match DateTime::parse_from_rfc3339(text.trim()) {
        Ok(timestamp) => Ok(Some(timestamp.with_timezone(&Utc))),
        Err(e) => {
            warn!(value = %text, error = %e, "unparsable last input, treated as absent");
            Ok(None)
        }
    }
}

impl DeviceInfo {
    pub fn tag(&self, key: &str) -> Option<&str> {
        find_tag(&self.tags, key).filter(|v| !v.is_empty())
    }

    pub fn organization_id(&self) -> Option<&str> {
        self.tag(ORGANIZATION_TAG)
    }

    /// Organization, group and subgroup ids in that order, skipping absent tiers
    pub fn hierarchy_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = Vec::new();
        for key in [ORGANIZATION_TAG, GROUP_TAG, SUBGROUP_TAG] {
            if let Some(id) = self.tag(key) {
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
        }
        ids
    }
}

/// Query for historical device data
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceDataQuery {
    pub variables: Vec<String>,
    pub groups: Vec<String>,
    pub qty: u32,
}

/// Remote key-value and data store for devices and hierarchy entities
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait DeviceRepository: Send + Sync {
    /// Get device info (None when the device no longer exists)
    async fn get_device_info(&self, device_id: &str) -> DomainResult<Option<DeviceInfo>>;

    /// List all configuration parameters of a device
    async fn list_params(&self, device_id: &str) -> DomainResult<Vec<KeyValueEntry>>;

    /// Upsert parameters by key in a single call
    async fn set_params(&self, device_id: &str, entries: Vec<KeyValueEntry>) -> DomainResult<()>;

    /// Replace the tag list of a device
    async fn set_tags(&self, device_id: &str, tags: Vec<Tag>) -> DomainResult<()>;

    /// Read stored data records
    async fn get_device_data(
        &self,
        device_id: &str,
        query: DeviceDataQuery,
    ) -> DomainResult<Vec<EventRecord>>;

    /// Append data records
    async fn send_device_data(&self, device_id: &str, records: Vec<EventRecord>) -> DomainResult<()>;

    /// Edit existing data records in place (matched by record id)
    async fn edit_device_data(&self, device_id: &str, records: Vec<EventRecord>) -> DomainResult<()>;
}
