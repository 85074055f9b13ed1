use crate::domain::{
    DeviceDataQuery, DeviceInfo, DeviceRepository, DomainError, DomainResult, EventRecord,
    KeyValueEntry, Tag,
};
use crate::http::PlatformClient;
use async_trait::async_trait;
use reqwest::Method;
use serde_json::json;
use tracing::{debug, instrument};

/// Device repository backed by the platform HTTP API
#[derive(Clone)]
pub struct HttpDeviceRepository {
    client: PlatformClient,
}

impl HttpDeviceRepository {
    pub fn new(client: PlatformClient) -> Self {
        Self { client }
    }
}

/// Query string for `GET /device/{id}/data`
pub fn data_query(query: &DeviceDataQuery) -> Vec<(String, String)> {
    let mut pairs: Vec<(String, String)> = query
        .variables
        .iter()
        .map(|v| ("variables".to_string(), v.clone()))
        .collect();
    pairs.extend(query.groups.iter().map(|g| ("groups".to_string(), g.clone())));
    if query.qty > 0 {
        pairs.push(("qty".to_string(), query.qty.to_string()));
    }
    pairs
}

#[async_trait]
impl DeviceRepository for HttpDeviceRepository {
    #[instrument(skip(self), fields(device_id = %device_id))]
    async fn get_device_info(&self, device_id: &str) -> DomainResult<Option<DeviceInfo>> {
        self.client.get(&format!("device/{}", device_id), &[]).await
    }

    #[instrument(skip(self), fields(device_id = %device_id))]
    async fn list_params(&self, device_id: &str) -> DomainResult<Vec<KeyValueEntry>> {
        let params: Option<Vec<KeyValueEntry>> = self
            .client
            .get(&format!("device/{}/params", device_id), &[])
            .await?;
        params.ok_or_else(|| DomainError::DeviceNotFound(device_id.to_string()))
    }

    #[instrument(skip(self, entries), fields(device_id = %device_id, count = entries.len()))]
    async fn set_params(&self, device_id: &str, entries: Vec<KeyValueEntry>) -> DomainResult<()> {
        if entries.is_empty() {
            return Ok(());
        }
        self.client
            .send(Method::POST, &format!("device/{}/params", device_id), &entries)
            .await?;
        debug!(device_id = %device_id, "params saved");
        Ok(())
    }

    #[instrument(skip(self, tags), fields(device_id = %device_id, count = tags.len()))]
    async fn set_tags(&self, device_id: &str, tags: Vec<Tag>) -> DomainResult<()> {
        self.client
            .send(Method::PUT, &format!("device/{}", device_id), &json!({ "tags": tags }))
            .await
    }

    #[instrument(skip(self, query), fields(device_id = %device_id))]
    async fn get_device_data(
        &self,
        device_id: &str,
        query: DeviceDataQuery,
    ) -> DomainResult<Vec<EventRecord>> {
        let records: Option<Vec<EventRecord>> = self
            .client
            .get(&format!("device/{}/data", device_id), &data_query(&query))
            .await?;
        records.ok_or_else(|| DomainError::DeviceNotFound(device_id.to_string()))
    }

    #[instrument(skip(self, records), fields(device_id = %device_id, count = records.len()))]
    async fn send_device_data(&self, device_id: &str, records: Vec<EventRecord>) -> DomainResult<()> {
        self.client
            .send(Method::POST, &format!("device/{}/data", device_id), &records)
            .await
    }

    #[instrument(skip(self, records), fields(device_id = %device_id, count = records.len()))]
    async fn edit_device_data(&self, device_id: &str, records: Vec<EventRecord>) -> DomainResult<()> {
        self.client
            .send(Method::PUT, &format!("device/{}/data", device_id), &records)
            .await
    }
}
