use crate::domain::DomainResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Push notification shown to a run user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmsMessage {
    pub to: String,
    pub message: String,
}

/// Delivery collaborator for notifications, email and SMS
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait NotificationService: Send + Sync {
    async fn send_notification(&self, user_id: &str, notification: Notification) -> DomainResult<()>;

    async fn send_email(&self, email: EmailMessage) -> DomainResult<()>;

    async fn send_sms(&self, sms: SmsMessage) -> DomainResult<()>;
}
