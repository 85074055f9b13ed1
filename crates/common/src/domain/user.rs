use crate::domain::{DomainResult, Tag, ORGANIZATION_TAG};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Run user (end user of the hosted application)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub tags: Vec<Tag>,
}

/// Filter for listing users; every tag must match
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserFilter {
    pub tags: Vec<Tag>,
}

impl UserFilter {
    /// Members of an organization
    pub fn organization(organization_id: &str) -> Self {
        Self {
            tags: vec![Tag::new(ORGANIZATION_TAG, organization_id)],
        }
    }

    pub fn matches(&self, user: &UserInfo) -> bool {
        self.tags.iter().all(|wanted| user.tags.contains(wanted))
    }
}

/// Repository trait for user lookups
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// List users matching the filter
    async fn list_users(&self, filter: UserFilter) -> DomainResult<Vec<UserInfo>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_organization_filter_matches_tagged_users() {
        let filter = UserFilter::organization("org-1");
        let member = UserInfo {
            id: "u1".to_string(),
            name: "Ada".to_string(),
            email: None,
            phone: None,
            tags: vec![Tag::new(ORGANIZATION_TAG, "org-1"), Tag::new("role", "admin")],
        };
        let outsider = UserInfo {
            tags: vec![Tag::new(ORGANIZATION_TAG, "org-2")],
            ..member.clone()
        };

        assert!(filter.matches(&member));
        assert!(!filter.matches(&outsider));
    }
}
