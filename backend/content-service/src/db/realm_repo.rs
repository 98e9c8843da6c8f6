use super::RealmStore;
use crate::error::Result;
use crate::models::Realm;
use async_trait::async_trait;
use sqlx::{postgres::PgRow, PgPool, Row};
use uuid::Uuid;

/// Local mirror of realms owned by the identity provider.
#[derive(Clone)]
pub struct PgRealmRepository {
    pool: PgPool,
}

impl PgRealmRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_realm(row: &PgRow) -> Realm {
        Realm {
            id: row.get("id"),
            alias: row.get("alias"),
            name: row.get("name"),
            description: row.get("description"),
            is_public: row.get("is_public"),
            is_community: row.get("is_community"),
        }
    }
}

#[async_trait]
impl RealmStore for PgRealmRepository {
    async fn upsert(&self, realm: Realm) -> Result<Realm> {
        let row = sqlx::query(
            r#"
            INSERT INTO realms (id, alias, name, description, is_public, is_community)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO UPDATE SET
                alias = EXCLUDED.alias,
                name = EXCLUDED.name,
                description = EXCLUDED.description,
                is_public = EXCLUDED.is_public,
                is_community = EXCLUDED.is_community,
                updated_at = NOW()
            RETURNING id, alias, name, description, is_public, is_community
            "#,
        )
        .bind(realm.id)
        .bind(&realm.alias)
        .bind(&realm.name)
        .bind(&realm.description)
        .bind(realm.is_public)
        .bind(realm.is_community)
        .fetch_one(&self.pool)
        .await?;

        Ok(Self::row_to_realm(&row))
    }

    async fn get_by_alias(&self, alias: &str) -> Result<Option<Realm>> {
        let row = sqlx::query(
            "SELECT id, alias, name, description, is_public, is_community FROM realms WHERE alias = $1",
        )
        .bind(alias)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(Self::row_to_realm))
    }

    async fn get(&self, id: Uuid) -> Result<Option<Realm>> {
        let row = sqlx::query(
            "SELECT id, alias, name, description, is_public, is_community FROM realms WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(Self::row_to_realm))
    }
}
