use super::{build_http_client, check_status, ClientError};
use crate::config::UpstreamConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub topic: String,
    pub subject: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    pub body: String,
    #[serde(default)]
    pub links: HashMap<String, String>,
}

/// Delivery transport for user notifications.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, account_id: Uuid, notification: &Notification)
        -> Result<(), ClientError>;

    async fn notify_batch(
        &self,
        account_ids: &[Uuid],
        notification: &Notification,
    ) -> Result<(), ClientError>;
}

#[derive(Serialize)]
struct SingleDelivery<'a> {
    account_id: Uuid,
    notification: &'a Notification,
}

#[derive(Serialize)]
struct BatchDelivery<'a> {
    account_ids: &'a [Uuid],
    notification: &'a Notification,
}

pub struct HttpNotificationSink {
    client: reqwest::Client,
    base_url: String,
}

impl HttpNotificationSink {
    pub fn new(config: &UpstreamConfig) -> Result<Self, ClientError> {
        Ok(Self {
            client: build_http_client(config.timeout())?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl NotificationSink for HttpNotificationSink {
    async fn notify(
        &self,
        account_id: Uuid,
        notification: &Notification,
    ) -> Result<(), ClientError> {
        let url = format!("{}/api/v1/notifications", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&SingleDelivery {
                account_id,
                notification,
            })
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    async fn notify_batch(
        &self,
        account_ids: &[Uuid],
        notification: &Notification,
    ) -> Result<(), ClientError> {
        if account_ids.is_empty() {
            return Ok(());
        }
        let url = format!("{}/api/v1/notifications/batch", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&BatchDelivery {
                account_ids,
                notification,
            })
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }
}
