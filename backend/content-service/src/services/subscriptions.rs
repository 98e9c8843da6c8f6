use crate::db::SubscriptionStore;
use crate::error::{AppError, Result};
use crate::models::{Subscription, SubscriptionTarget};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

#[derive(Clone)]
pub struct SubscriptionService {
    store: Arc<dyn SubscriptionStore>,
}

impl SubscriptionService {
    pub fn new(store: Arc<dyn SubscriptionStore>) -> Self {
        Self { store }
    }

    pub async fn get(&self, follower_id: Uuid, target: SubscriptionTarget) -> Result<Subscription> {
        self.store
            .find(follower_id, target)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("subscription to {:?}", target)))
    }

    pub async fn subscribe(
        &self,
        follower_id: Uuid,
        target: SubscriptionTarget,
    ) -> Result<Subscription> {
        if target == SubscriptionTarget::Account(follower_id) {
            return Err(AppError::ValidationError(
                "cannot subscribe to yourself".to_string(),
            ));
        }
        if self.store.find(follower_id, target).await?.is_some() {
            return Err(AppError::Conflict(format!(
                "already subscribed to {:?}",
                target
            )));
        }
        let subscription = self.store.insert(follower_id, target).await?;
        info!(%follower_id, target = ?target, "subscribed");
        Ok(subscription)
    }

    pub async fn unsubscribe(&self, follower_id: Uuid, target: SubscriptionTarget) -> Result<()> {
        let subscription = self.get(follower_id, target).await?;
        self.store.delete(subscription.id).await?;
        info!(%follower_id, target = ?target, "unsubscribed");
        Ok(())
    }

    /// Drops every subscription to a target that no longer exists.
    pub async fn purge_target(&self, target: SubscriptionTarget) -> Result<u64> {
        let removed = self.store.purge_target(target).await?;
        info!(target = ?target, removed, "subscriptions purged");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;

    #[tokio::test]
    async fn subscribe_twice_conflicts_and_unsubscribe_removes() {
        let service = SubscriptionService::new(Arc::new(MemoryStore::new()));
        let follower = Uuid::new_v4();
        let target = SubscriptionTarget::Tag(Uuid::new_v4());

        service.subscribe(follower, target).await.unwrap();
        assert!(matches!(
            service.subscribe(follower, target).await,
            Err(AppError::Conflict(_))
        ));

        service.unsubscribe(follower, target).await.unwrap();
        assert!(matches!(
            service.unsubscribe(follower, target).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn self_subscription_is_rejected() {
        let service = SubscriptionService::new(Arc::new(MemoryStore::new()));
        let me = Uuid::new_v4();
        assert!(matches!(
            service.subscribe(me, SubscriptionTarget::Account(me)).await,
            Err(AppError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn purge_removes_all_followers_of_target() {
        let service = SubscriptionService::new(Arc::new(MemoryStore::new()));
        let target = SubscriptionTarget::Realm(Uuid::new_v4());
        for _ in 0..3 {
            service.subscribe(Uuid::new_v4(), target).await.unwrap();
        }
        assert_eq!(service.purge_target(target).await.unwrap(), 3);
        assert_eq!(service.purge_target(target).await.unwrap(), 0);
    }
}
