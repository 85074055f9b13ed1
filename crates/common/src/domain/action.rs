use crate::domain::{find_tag, DomainResult, Tag};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Alert action configured on the platform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionInfo {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub trigger: Vec<serde_json::Value>,
}

impl ActionInfo {
    pub fn tag(&self, key: &str) -> Option<&str> {
        find_tag(&self.tags, key)
    }
}

/// Repository trait for alert action lookups
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ActionRepository: Send + Sync {
    /// Get an action by ID (None when it no longer exists)
    async fn get_action_info(&self, action_id: &str) -> DomainResult<Option<ActionInfo>>;
}
