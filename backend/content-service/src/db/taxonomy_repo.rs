use super::TaxonomyStore;
use crate::error::Result;
use crate::models::{Category, Tag};
use async_trait::async_trait;
use sqlx::{PgPool, Row};
use uuid::Uuid;

#[derive(Clone)]
pub struct PgTaxonomyRepository {
    pool: PgPool,
}

impl PgTaxonomyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TaxonomyStore for PgTaxonomyRepository {
    async fn find_categories(&self, aliases: &[String]) -> Result<Vec<Category>> {
        if aliases.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query(
            r#"
            SELECT id, alias, name, description
            FROM categories
            WHERE alias = ANY($1)
            "#,
        )
        .bind(aliases)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| Category {
                id: row.get("id"),
                alias: row.get("alias"),
                name: row.get("name"),
                description: row.get("description"),
            })
            .collect())
    }

    async fn get_or_create_tags(&self, aliases: &[String]) -> Result<Vec<Tag>> {
        let mut tags = Vec::with_capacity(aliases.len());
        for alias in aliases {
            // The no-op update makes RETURNING yield the existing row too.
            let row = sqlx::query(
                r#"
                INSERT INTO tags (id, alias, name)
                VALUES ($1, $2, $2)
                ON CONFLICT (alias) DO UPDATE SET alias = EXCLUDED.alias
                RETURNING id, alias, name, description
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(alias)
            .fetch_one(&self.pool)
            .await?;

            tags.push(Tag {
                id: row.get("id"),
                alias: row.get("alias"),
                name: row.get("name"),
                description: row.get("description"),
            });
        }
        Ok(tags)
    }
}
