use super::{build_http_client, check_status, ClientError};
use crate::config::UpstreamConfig;
use crate::models::{Realm, RealmMember};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;
use uuid::Uuid;

/// Social graph and realm data owned by the identity provider.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn list_friends(&self, account_id: Uuid) -> Result<Vec<Uuid>, ClientError>;

    async fn list_blocked(&self, account_id: Uuid) -> Result<Vec<Uuid>, ClientError>;

    /// `Ok(None)` when the realm does not exist upstream.
    async fn get_realm(&self, alias: &str) -> Result<Option<Realm>, ClientError>;

    /// `Ok(None)` when the account is not a member.
    async fn get_realm_membership(
        &self,
        realm_id: Uuid,
        account_id: Uuid,
    ) -> Result<Option<RealmMember>, ClientError>;
}

#[derive(Debug, Deserialize)]
struct AccountIdList {
    account_ids: Vec<Uuid>,
}

pub struct HttpIdentityClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpIdentityClient {
    pub fn new(config: &UpstreamConfig) -> Result<Self, ClientError> {
        Ok(Self {
            client: build_http_client(config.timeout())?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn fetch_account_ids(&self, path: String) -> Result<Vec<Uuid>, ClientError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "fetching account relations");
        let response = check_status(self.client.get(&url).send().await?).await?;
        let list: AccountIdList = response.json().await?;
        Ok(list.account_ids)
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityClient {
    async fn list_friends(&self, account_id: Uuid) -> Result<Vec<Uuid>, ClientError> {
        self.fetch_account_ids(format!("/api/v1/accounts/{}/friends", account_id))
            .await
    }

    async fn list_blocked(&self, account_id: Uuid) -> Result<Vec<Uuid>, ClientError> {
        self.fetch_account_ids(format!("/api/v1/accounts/{}/blocked", account_id))
            .await
    }

    async fn get_realm(&self, alias: &str) -> Result<Option<Realm>, ClientError> {
        let url = format!("{}/api/v1/realms/{}", self.base_url, alias);
        let response = self.client.get(&url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let realm: Realm = check_status(response).await?.json().await?;
        Ok(Some(realm))
    }

    async fn get_realm_membership(
        &self,
        realm_id: Uuid,
        account_id: Uuid,
    ) -> Result<Option<RealmMember>, ClientError> {
        let url = format!(
            "{}/api/v1/realms/{}/members/{}",
            self.base_url, realm_id, account_id
        );
        let response = self.client.get(&url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let member: RealmMember = check_status(response).await?.json().await?;
        Ok(Some(member))
    }
}
