use super::ReactionStore;
use crate::error::{AppError, Result};
use crate::models::{Attitude, ContentKind, ContentRef, Reaction, ReactionTally};
use async_trait::async_trait;
use sqlx::{PgConnection, PgPool, Row};
use uuid::Uuid;

/// A toggle that keeps losing the insert race to identical concurrent
/// toggles gives up after this many rounds.
const MAX_TOGGLE_ROUNDS: usize = 3;

#[derive(Clone)]
pub struct PgReactionRepository {
    pool: PgPool,
}

impl PgReactionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn adjust_counter(
        conn: &mut PgConnection,
        target: ContentRef,
        attitude: Attitude,
        delta: i32,
    ) -> Result<()> {
        let Some(column) = attitude.counter_column() else {
            return Ok(());
        };
        let sql = format!(
            "UPDATE {table} SET {col} = GREATEST({col} + $1, 0) WHERE id = $2",
            table = target.kind.table(),
            col = column
        );
        sqlx::query(&sql)
            .bind(delta)
            .bind(target.id)
            .execute(conn)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ReactionStore for PgReactionRepository {
    async fn toggle(
        &self,
        account_id: Uuid,
        target: ContentRef,
        symbol: &str,
        attitude: Attitude,
    ) -> Result<(bool, Reaction)> {
        let column = target.kind.reaction_column();
        let delete_sql = format!(
            "DELETE FROM reactions WHERE account_id = $1 AND {} = $2 AND symbol = $3 AND attitude = $4 \
             RETURNING id, created_at",
            column
        );
        let insert_sql = format!(
            "INSERT INTO reactions (id, symbol, attitude, account_id, {}) VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT DO NOTHING RETURNING id, created_at",
            column
        );

        let mut tx = self.pool.begin().await?;

        for _ in 0..MAX_TOGGLE_ROUNDS {
            let deleted = sqlx::query(&delete_sql)
                .bind(account_id)
                .bind(target.id)
                .bind(symbol)
                .bind(attitude.as_i16())
                .fetch_optional(&mut *tx)
                .await?;

            if let Some(row) = deleted {
                Self::adjust_counter(&mut tx, target, attitude, -1).await?;
                tx.commit().await?;
                return Ok((
                    false,
                    Reaction {
                        id: row.get("id"),
                        symbol: symbol.to_string(),
                        attitude,
                        account_id,
                        target,
                        created_at: row.get("created_at"),
                    },
                ));
            }

            // Blocks on a concurrent uncommitted insert of the same tuple and
            // yields no row once that insert commits.
            let inserted = sqlx::query(&insert_sql)
                .bind(Uuid::new_v4())
                .bind(symbol)
                .bind(attitude.as_i16())
                .bind(account_id)
                .bind(target.id)
                .fetch_optional(&mut *tx)
                .await?;

            if let Some(row) = inserted {
                Self::adjust_counter(&mut tx, target, attitude, 1).await?;
                tx.commit().await?;
                return Ok((
                    true,
                    Reaction {
                        id: row.get("id"),
                        symbol: symbol.to_string(),
                        attitude,
                        account_id,
                        target,
                        created_at: row.get("created_at"),
                    },
                ));
            }
        }

        tx.rollback().await?;
        Err(AppError::Conflict(format!(
            "reaction on {} {} is being toggled concurrently",
            target.kind, target.id
        )))
    }

    async fn tally(&self, kind: ContentKind, ids: &[Uuid]) -> Result<ReactionTally> {
        let mut tally = ReactionTally::new();
        if ids.is_empty() {
            return Ok(tally);
        }
        let sql = format!(
            "SELECT {col} AS item_id, symbol, COUNT(*) AS total FROM reactions \
             WHERE {col} = ANY($1) GROUP BY {col}, symbol",
            col = kind.reaction_column()
        );
        let rows = sqlx::query(&sql).bind(ids).fetch_all(&self.pool).await?;

        for row in rows {
            tally
                .entry(row.get::<Uuid, _>("item_id"))
                .or_default()
                .insert(row.get("symbol"), row.get::<i64, _>("total"));
        }
        Ok(tally)
    }
}
