use super::SubscriptionStore;
use crate::error::{AppError, Result};
use crate::models::{Subscription, SubscriptionTarget};
use async_trait::async_trait;
use sqlx::{postgres::PgRow, PgPool, Postgres, QueryBuilder, Row};
use uuid::Uuid;

#[derive(Clone)]
pub struct PgSubscriptionRepository {
    pool: PgPool,
}

impl PgSubscriptionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_subscription(row: &PgRow) -> Result<Subscription> {
        Ok(Subscription {
            id: row.get("id"),
            follower_id: row.get("follower_id"),
            target: SubscriptionTarget::from_columns(
                row.get("account_id"),
                row.get("tag_id"),
                row.get("category_id"),
                row.get("realm_id"),
            )?,
            created_at: row.get("created_at"),
        })
    }
}

#[async_trait]
impl SubscriptionStore for PgSubscriptionRepository {
    async fn find(
        &self,
        follower_id: Uuid,
        target: SubscriptionTarget,
    ) -> Result<Option<Subscription>> {
        let sql = format!(
            "SELECT id, follower_id, account_id, tag_id, category_id, realm_id, created_at \
             FROM subscriptions WHERE follower_id = $1 AND {} = $2",
            target.column()
        );
        let row = sqlx::query(&sql)
            .bind(follower_id)
            .bind(target.id())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_subscription).transpose()
    }

    async fn insert(&self, follower_id: Uuid, target: SubscriptionTarget) -> Result<Subscription> {
        let sql = format!(
            "INSERT INTO subscriptions (id, follower_id, {}) VALUES ($1, $2, $3) \
             ON CONFLICT DO NOTHING \
             RETURNING id, follower_id, account_id, tag_id, category_id, realm_id, created_at",
            target.column()
        );
        let row = sqlx::query(&sql)
            .bind(Uuid::new_v4())
            .bind(follower_id)
            .bind(target.id())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::Conflict("subscription already exists".to_string()))?;

        Self::row_to_subscription(&row)
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM subscriptions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("subscription {}", id)));
        }
        Ok(())
    }

    async fn followers_of(&self, targets: &[SubscriptionTarget]) -> Result<Vec<Uuid>> {
        if targets.is_empty() {
            return Ok(Vec::new());
        }

        let mut qb = QueryBuilder::<Postgres>::new(
            "SELECT DISTINCT follower_id FROM subscriptions WHERE ",
        );
        let mut separated = qb.separated(" OR ");
        for target in targets {
            separated
                .push(format!("{} = ", target.column()))
                .push_bind_unseparated(target.id());
        }

        let followers = qb
            .build_query_scalar::<Uuid>()
            .fetch_all(&self.pool)
            .await?;
        Ok(followers)
    }

    async fn purge_target(&self, target: SubscriptionTarget) -> Result<u64> {
        let sql = format!("DELETE FROM subscriptions WHERE {} = $1", target.column());
        let result = sqlx::query(&sql)
            .bind(target.id())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
