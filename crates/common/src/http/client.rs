use crate::domain::{DomainError, DomainResult};
use crate::http::PlatformConfig;
use anyhow::Result;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// HTTP client for the platform resource API
///
/// Every response is wrapped in a `{status, result, message}` envelope.
#[derive(Clone)]
pub struct PlatformClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
    profile_id: String,
}

impl PlatformClient {
    /// Creates a new client
    ///
    /// # Arguments
    /// * `config` - API URL, token and request timeout
    pub fn new(config: &PlatformConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            profile_id: config.profile_id.trim().to_string(),
        })
    }

    /// Profile owning the account quota; empty when none is configured
    pub fn profile_id(&self) -> &str {
        &self.profile_id
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// GET a resource; `None` when the platform answers 404
    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(String, String)],
    ) -> DomainResult<Option<T>> {
        let request = self.request(Method::GET, path).query(query);
        self.execute(request).await
    }

    /// Send a JSON body and discard the result payload
    pub async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> DomainResult<()> {
        let request = self.request(method, path).json(body);
        let response: Option<IgnoredAny> = self.execute(request).await?;
        match response {
            Some(_) => Ok(()),
            None => Err(DomainError::RemoteCallError(format!(
                "resource not found: {}",
                path
            ))),
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, self.url(path))
            .header("Authorization", &self.token)
    }

    async fn execute<T: DeserializeOwned>(&self, request: RequestBuilder) -> DomainResult<Option<T>> {
        let response = request
            .send()
            .await
            .map_err(|e| DomainError::RemoteCallError(e.to_string()))?;

        let status = response.status();
        let url = response.url().path().to_string();
        let body = response
            .text()
            .await
            .map_err(|e| DomainError::RemoteCallError(e.to_string()))?;

        debug!(status = %status, path = %url, "platform response received");
        decode_response(status, &body)
    }
}

/// Unwrap the platform response envelope
pub fn decode_response<T: DeserializeOwned>(status: StatusCode, body: &str) -> DomainResult<Option<T>> {
    if status == StatusCode::NOT_FOUND {
        return Ok(None);
    }

    let envelope: Value = serde_json::from_str(body).map_err(|e| {
        DomainError::RemoteCallError(format!("invalid response body ({}): {}", status, e))
    })?;

    let accepted = envelope
        .get("status")
        .and_then(Value::as_bool)
        .unwrap_or(status.is_success());

    if !status.is_success() || !accepted {
        let message = envelope
            .get("message")
            .and_then(Value::as_str)
            .or_else(|| envelope.get("result").and_then(Value::as_str))
            .unwrap_or("no message");
        return Err(DomainError::RemoteCallError(format!("{}: {}", status, message)));
    }

    let result = envelope.get("result").cloned().unwrap_or(Value::Null);
    serde_json::from_value(result)
        .map(Some)
        .map_err(|e| DomainError::RemoteCallError(format!("unexpected result shape: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DeviceInfo;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Payload {
        id: String,
    }

    #[test]
    fn test_decode_success() {
        let decoded: Option<Payload> =
            decode_response(StatusCode::OK, r#"{"status": true, "result": {"id": "dev-1"}}"#)
                .unwrap();
        assert_eq!(
            decoded,
            Some(Payload {
                id: "dev-1".to_string()
            })
        );
    }

    #[test]
    fn test_decode_not_found() {
        let decoded: Option<Payload> =
            decode_response(StatusCode::NOT_FOUND, "Not Found").unwrap();
        assert!(decoded.is_none());
    }

    #[test]
    fn test_decode_status_false_is_remote_error() {
        let result: DomainResult<Option<Payload>> = decode_response(
            StatusCode::OK,
            r#"{"status": false, "message": "Authorization denied"}"#,
        );
        match result {
            Err(DomainError::RemoteCallError(msg)) => assert!(msg.contains("Authorization denied")),
            other => panic!("Expected RemoteCallError, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_server_error_uses_result_text() {
        let result: DomainResult<Option<Payload>> = decode_response(
            StatusCode::BAD_REQUEST,
            r#"{"status": false, "result": "Invalid device id"}"#,
        );
        match result {
            Err(DomainError::RemoteCallError(msg)) => assert!(msg.contains("Invalid device id")),
            other => panic!("Expected RemoteCallError, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_ignored_result() {
        let decoded: Option<IgnoredAny> =
            decode_response(StatusCode::OK, r#"{"status": true, "result": "5 items added"}"#)
                .unwrap();
        assert!(decoded.is_some());
    }

    #[test]
    fn test_decode_device_with_unparsable_last_input() {
        let decoded: Option<DeviceInfo> = decode_response(
            StatusCode::OK,
            r#"{"status": true, "result": {"id": "dev-1", "name": "Meter", "tags": [], "last_input": "never"}}"#,
        )
        .unwrap();
        let device = decoded.unwrap();
        assert_eq!(device.id, "dev-1");
        assert!(device.last_input.is_none());
    }

    #[test]
    fn test_decode_garbage_body() {
        let result: DomainResult<Option<Payload>> = decode_response(StatusCode::OK, "<html>");
        assert!(matches!(result, Err(DomainError::RemoteCallError(_))));
    }

    #[test]
    fn test_url_joins_without_double_slash() {
        let client = PlatformClient::new(&PlatformConfig {
            api_url: "https://api.example.com/".to_string(),
            ..PlatformConfig::default()
        })
        .unwrap();
        assert_eq!(client.url("/device/abc"), "https://api.example.com/device/abc");
    }
}
