use super::{build_http_client, check_status, ClientError};
use crate::config::UpstreamConfig;
use async_trait::async_trait;
use reqwest::StatusCode;

/// Attachment storage, consulted only when content is created or edited.
#[async_trait]
pub trait AttachmentChecker: Send + Sync {
    async fn exists(&self, attachment_id: &str, usage: &str) -> Result<bool, ClientError>;
}

pub struct HttpAttachmentChecker {
    client: reqwest::Client,
    base_url: String,
}

impl HttpAttachmentChecker {
    pub fn new(config: &UpstreamConfig) -> Result<Self, ClientError> {
        Ok(Self {
            client: build_http_client(config.timeout())?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl AttachmentChecker for HttpAttachmentChecker {
    async fn exists(&self, attachment_id: &str, usage: &str) -> Result<bool, ClientError> {
        let url = format!("{}/api/v1/attachments/{}", self.base_url, attachment_id);
        let response = self
            .client
            .head(&url)
            .query(&[("usage", usage)])
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        check_status(response).await?;
        Ok(true)
    }
}
