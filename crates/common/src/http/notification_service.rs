use crate::domain::{DomainResult, EmailMessage, Notification, NotificationService, SmsMessage};
use crate::http::PlatformClient;
use async_trait::async_trait;
use reqwest::Method;
use serde_json::json;
use tracing::instrument;

/// Notification, email and SMS delivery through the platform HTTP API
#[derive(Clone)]
pub struct HttpNotificationService {
    client: PlatformClient,
}

impl HttpNotificationService {
    pub fn new(client: PlatformClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl NotificationService for HttpNotificationService {
    #[instrument(skip(self, notification), fields(user_id = %user_id))]
    async fn send_notification(&self, user_id: &str, notification: Notification) -> DomainResult<()> {
        let body = json!({
            "run_user": user_id,
            "title": notification.title,
            "message": notification.message,
        });
        self.client.send(Method::POST, "run/notification", &body).await
    }

    #[instrument(skip(self, email))]
    async fn send_email(&self, email: EmailMessage) -> DomainResult<()> {
        self.client
            .send(Method::POST, "analysis/services/email/send", &email)
            .await
    }

    #[instrument(skip(self, sms))]
    async fn send_sms(&self, sms: SmsMessage) -> DomainResult<()> {
        self.client
            .send(Method::POST, "analysis/services/sms/send", &sms)
            .await
    }
}
