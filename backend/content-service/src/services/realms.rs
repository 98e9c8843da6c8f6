use crate::clients::{with_timeout, IdentityProvider};
use crate::db::RealmStore;
use crate::error::{AppError, Result};
use crate::metrics::REALM_CACHE_FALLBACK_TOTAL;
use crate::models::Realm;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

/// Power level required to publish into a realm that is not a community.
pub const MIN_PUBLISH_POWER_LEVEL: i32 = 25;

/// Resolves realms against the identity provider, mirroring every remote
/// answer into the local realm table.
#[derive(Clone)]
pub struct RealmDirectory {
    identity: Arc<dyn IdentityProvider>,
    store: Arc<dyn RealmStore>,
    timeout: Duration,
}

impl RealmDirectory {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        store: Arc<dyn RealmStore>,
        timeout: Duration,
    ) -> Self {
        Self {
            identity,
            store,
            timeout,
        }
    }

    pub async fn resolve(&self, alias: &str) -> Result<Realm> {
        match with_timeout(self.timeout, self.identity.get_realm(alias)).await {
            Ok(Some(remote)) => {
                debug!(realm = %remote.alias, "refreshing realm mirror");
                self.store.upsert(remote).await
            }
            Ok(None) => Err(AppError::NotFound(format!("realm {}", alias))),
            Err(err) => {
                warn!(realm = %alias, error = %err, "identity provider unavailable, using realm mirror");
                REALM_CACHE_FALLBACK_TOTAL.inc();
                self.store
                    .get_by_alias(alias)
                    .await?
                    .ok_or_else(|| AppError::UpstreamUnavailable(err.to_string()))
            }
        }
    }

    /// Membership is required; realms that are not communities also require
    /// [`MIN_PUBLISH_POWER_LEVEL`].
    pub async fn ensure_can_publish(&self, realm: &Realm, account_id: Uuid) -> Result<()> {
        let member = with_timeout(
            self.timeout,
            self.identity.get_realm_membership(realm.id, account_id),
        )
        .await?;

        match member {
            None => Err(AppError::Forbidden(format!(
                "you must be a member of realm {} to publish there",
                realm.alias
            ))),
            Some(member) if !realm.is_community && member.power_level < MIN_PUBLISH_POWER_LEVEL => {
                Err(AppError::Forbidden(format!(
                    "you need at least power level {} to publish in realm {}",
                    MIN_PUBLISH_POWER_LEVEL, realm.alias
                )))
            }
            Some(_) => Ok(()),
        }
    }

    /// Private realms are listed only to their members; everyone else is told
    /// the realm does not exist.
    pub async fn ensure_can_browse(&self, realm: &Realm, viewer_id: Option<Uuid>) -> Result<()> {
        if realm.is_public {
            return Ok(());
        }
        let hidden = || AppError::NotFound(format!("realm {}", realm.alias));
        let viewer_id = viewer_id.ok_or_else(hidden)?;
        let member = with_timeout(
            self.timeout,
            self.identity.get_realm_membership(realm.id, viewer_id),
        )
        .await?;
        member.map(|_| ()).ok_or_else(hidden)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::identity::MockIdentityProvider;
    use crate::clients::ClientError;
    use crate::db::MemoryStore;
    use crate::models::RealmMember;

    fn private_realm() -> Realm {
        Realm {
            is_public: false,
            ..realm(true)
        }
    }

    fn realm(is_community: bool) -> Realm {
        Realm {
            id: Uuid::new_v4(),
            alias: "lounge".to_string(),
            name: "Lounge".to_string(),
            description: String::new(),
            is_public: true,
            is_community,
        }
    }

    #[tokio::test]
    async fn remote_realm_is_mirrored() {
        let remote = realm(true);
        let returned = remote.clone();
        let mut mock = MockIdentityProvider::new();
        mock.expect_get_realm()
            .returning(move |_| Ok(Some(returned.clone())));

        let store = Arc::new(MemoryStore::new());
        let directory = RealmDirectory::new(Arc::new(mock), store.clone(), Duration::from_secs(1));

        assert_eq!(directory.resolve("lounge").await.unwrap(), remote);
        assert_eq!(store.get_by_alias("lounge").await.unwrap(), Some(remote));
    }

    #[tokio::test]
    async fn falls_back_to_mirror_when_upstream_fails() {
        let cached = realm(false);
        let store = Arc::new(MemoryStore::new());
        store.upsert(cached.clone()).await.unwrap();

        let mut mock = MockIdentityProvider::new();
        mock.expect_get_realm()
            .returning(|_| Err(ClientError::Http("down".into())));
        let directory = RealmDirectory::new(Arc::new(mock), store, Duration::from_secs(1));

        assert_eq!(directory.resolve("lounge").await.unwrap(), cached);
        assert!(matches!(
            directory.resolve("missing").await,
            Err(AppError::UpstreamUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn low_power_members_cannot_publish_outside_communities() {
        let target = realm(false);
        let mut mock = MockIdentityProvider::new();
        mock.expect_get_realm_membership()
            .returning(|realm_id, account_id| {
                Ok(Some(RealmMember {
                    realm_id,
                    account_id,
                    power_level: 10,
                }))
            });
        let directory = RealmDirectory::new(
            Arc::new(mock),
            Arc::new(MemoryStore::new()),
            Duration::from_secs(1),
        );

        assert!(matches!(
            directory.ensure_can_publish(&target, Uuid::new_v4()).await,
            Err(AppError::Forbidden(_))
        ));
        assert!(directory
            .ensure_can_publish(&realm(true), Uuid::new_v4())
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn non_members_cannot_publish() {
        let mut mock = MockIdentityProvider::new();
        mock.expect_get_realm_membership().returning(|_, _| Ok(None));
        let directory = RealmDirectory::new(
            Arc::new(mock),
            Arc::new(MemoryStore::new()),
            Duration::from_secs(1),
        );
        assert!(matches!(
            directory.ensure_can_publish(&realm(true), Uuid::new_v4()).await,
            Err(AppError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn public_realms_are_browsable_by_anyone() {
        let directory = RealmDirectory::new(
            Arc::new(MockIdentityProvider::new()),
            Arc::new(MemoryStore::new()),
            Duration::from_secs(1),
        );
        assert!(directory.ensure_can_browse(&realm(true), None).await.is_ok());
    }

    #[tokio::test]
    async fn private_realms_are_hidden_from_outsiders() {
        let member_id = Uuid::new_v4();
        let mut mock = MockIdentityProvider::new();
        mock.expect_get_realm_membership()
            .returning(move |realm_id, account_id| {
                Ok((account_id == member_id).then(|| RealmMember {
                    realm_id,
                    account_id,
                    power_level: 0,
                }))
            });
        let directory = RealmDirectory::new(
            Arc::new(mock),
            Arc::new(MemoryStore::new()),
            Duration::from_secs(1),
        );
        let private = private_realm();

        assert!(directory
            .ensure_can_browse(&private, Some(member_id))
            .await
            .is_ok());
        assert!(matches!(
            directory
                .ensure_can_browse(&private, Some(Uuid::new_v4()))
                .await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            directory.ensure_can_browse(&private, None).await,
            Err(AppError::NotFound(_))
        ));
    }
}
