use crate::domain::{ActionInfo, ActionRepository, DomainResult};
use crate::http::PlatformClient;
use async_trait::async_trait;
use tracing::instrument;

/// Action repository backed by the platform HTTP API
#[derive(Clone)]
pub struct HttpActionRepository {
    client: PlatformClient,
}

impl HttpActionRepository {
    pub fn new(client: PlatformClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ActionRepository for HttpActionRepository {
    #[instrument(skip(self), fields(action_id = %action_id))]
    async fn get_action_info(&self, action_id: &str) -> DomainResult<Option<ActionInfo>> {
        self.client.get(&format!("action/{}", action_id), &[]).await
    }
}
