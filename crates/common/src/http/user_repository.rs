use crate::domain::{DomainResult, UserFilter, UserInfo, UserRepository};
use crate::http::PlatformClient;
use async_trait::async_trait;
use tracing::{debug, instrument};

/// Page size used when listing run users
const USER_PAGE_AMOUNT: u32 = 10_000;

/// User repository backed by the platform HTTP API
#[derive(Clone)]
pub struct HttpUserRepository {
    client: PlatformClient,
}

impl HttpUserRepository {
    pub fn new(client: PlatformClient) -> Self {
        Self { client }
    }
}

/// Query string for `GET /run/users`
pub fn user_query(filter: &UserFilter) -> Vec<(String, String)> {
    let mut pairs = Vec::with_capacity(filter.tags.len() * 2 + 1);
    for (i, tag) in filter.tags.iter().enumerate() {
        pairs.push((format!("filter[tags][{}][key]", i), tag.key.clone()));
        pairs.push((format!("filter[tags][{}][value]", i), tag.value.clone()));
    }
    pairs.push(("amount".to_string(), USER_PAGE_AMOUNT.to_string()));
    pairs
}

#[async_trait]
impl UserRepository for HttpUserRepository {
    #[instrument(skip(self, filter), fields(tag_count = filter.tags.len()))]
    async fn list_users(&self, filter: UserFilter) -> DomainResult<Vec<UserInfo>> {
        let users: Option<Vec<UserInfo>> = self.client.get("run/users", &user_query(&filter)).await?;
        let users = users.unwrap_or_default();
        debug!(count = users.len(), "users listed");
        Ok(users)
    }
}
