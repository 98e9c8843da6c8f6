use super::{ChildRelation, ContentOrder, ContentQuery, ContentStore, Page};
use crate::error::{AppError, Result};
use crate::models::{
    Category, ContentItem, ContentKind, ContentRef, NewContent, Tag, VisibilityTier,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, PgPool, Postgres, QueryBuilder, Row, Transaction};
use std::collections::HashMap;
use uuid::Uuid;

/// Column list shared by `posts` and `articles`.
const CONTENT_COLUMNS: &str = "id, author_id, realm_id, alias, area_alias, body, reply_to_id, \
     repost_to_id, visibility, visible_account_ids, invisible_account_ids, is_draft, \
     published_at, published_until, edited_at, pinned_at, locked_at, total_upvote, \
     total_downvote, created_at, updated_at";

#[derive(Clone)]
pub struct PgContentRepository {
    pool: PgPool,
}

impl PgContentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_item(kind: ContentKind, row: &PgRow) -> Result<ContentItem> {
        Ok(ContentItem {
            id: row.get("id"),
            kind,
            author_id: row.get("author_id"),
            realm_id: row.get("realm_id"),
            alias: row.get("alias"),
            area_alias: row.get("area_alias"),
            body: row.get("body"),
            tags: Vec::new(),
            categories: Vec::new(),
            reply_to_id: row.get("reply_to_id"),
            repost_to_id: row.get("repost_to_id"),
            visibility: VisibilityTier::try_from(row.get::<i16, _>("visibility"))?,
            visible_account_ids: row.get("visible_account_ids"),
            invisible_account_ids: row.get("invisible_account_ids"),
            is_draft: row.get("is_draft"),
            published_at: row.get("published_at"),
            published_until: row.get("published_until"),
            edited_at: row.get("edited_at"),
            pinned_at: row.get("pinned_at"),
            locked_at: row.get("locked_at"),
            total_upvote: row.get("total_upvote"),
            total_downvote: row.get("total_downvote"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
            metric: None,
        })
    }

    /// Attaches tags and categories to `items` with one query per relation.
    async fn load_taxonomy(&self, kind: ContentKind, items: &mut [ContentItem]) -> Result<()> {
        if items.is_empty() {
            return Ok(());
        }
        let ids: Vec<Uuid> = items.iter().map(|i| i.id).collect();

        let tag_rows = sqlx::query(
            r#"
            SELECT ct.content_id, t.id, t.alias, t.name, t.description
            FROM content_tags ct
            JOIN tags t ON t.id = ct.tag_id
            WHERE ct.content_kind = $1 AND ct.content_id = ANY($2)
            ORDER BY t.alias
            "#,
        )
        .bind(kind.as_str())
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut tags: HashMap<Uuid, Vec<Tag>> = HashMap::new();
        for row in tag_rows {
            tags.entry(row.get("content_id")).or_default().push(Tag {
                id: row.get("id"),
                alias: row.get("alias"),
                name: row.get("name"),
                description: row.get("description"),
            });
        }

        let category_rows = sqlx::query(
            r#"
            SELECT cc.content_id, c.id, c.alias, c.name, c.description
            FROM content_categories cc
            JOIN categories c ON c.id = cc.category_id
            WHERE cc.content_kind = $1 AND cc.content_id = ANY($2)
            ORDER BY c.alias
            "#,
        )
        .bind(kind.as_str())
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut categories: HashMap<Uuid, Vec<Category>> = HashMap::new();
        for row in category_rows {
            categories
                .entry(row.get("content_id"))
                .or_default()
                .push(Category {
                    id: row.get("id"),
                    alias: row.get("alias"),
                    name: row.get("name"),
                    description: row.get("description"),
                });
        }

        for item in items.iter_mut() {
            item.tags = tags.remove(&item.id).unwrap_or_default();
            item.categories = categories.remove(&item.id).unwrap_or_default();
        }
        Ok(())
    }

    async fn replace_links(
        tx: &mut Transaction<'_, Postgres>,
        kind: ContentKind,
        content_id: Uuid,
        tag_ids: &[Uuid],
        category_ids: &[Uuid],
    ) -> Result<()> {
        sqlx::query("DELETE FROM content_tags WHERE content_kind = $1 AND content_id = $2")
            .bind(kind.as_str())
            .bind(content_id)
            .execute(&mut **tx)
            .await?;
        sqlx::query("DELETE FROM content_categories WHERE content_kind = $1 AND content_id = $2")
            .bind(kind.as_str())
            .bind(content_id)
            .execute(&mut **tx)
            .await?;

        if !tag_ids.is_empty() {
            sqlx::query(
                r#"
                INSERT INTO content_tags (content_kind, content_id, tag_id)
                SELECT $1, $2, UNNEST($3::uuid[])
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(kind.as_str())
            .bind(content_id)
            .bind(tag_ids)
            .execute(&mut **tx)
            .await?;
        }

        if !category_ids.is_empty() {
            sqlx::query(
                r#"
                INSERT INTO content_categories (content_kind, content_id, category_id)
                SELECT $1, $2, UNNEST($3::uuid[])
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(kind.as_str())
            .bind(content_id)
            .bind(category_ids)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }

    async fn set_timestamp(
        &self,
        target: ContentRef,
        column: &'static str,
        at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let sql = format!(
            "UPDATE {} SET {} = $1, updated_at = NOW() WHERE id = $2 AND deleted_at IS NULL",
            target.kind.table(),
            column
        );
        let result = sqlx::query(&sql)
            .bind(at)
            .bind(target.id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("{} {}", target.kind, target.id)));
        }
        Ok(())
    }
}

#[async_trait]
impl ContentStore for PgContentRepository {
    async fn count(&self, query: &ContentQuery) -> Result<i64> {
        let mut qb =
            QueryBuilder::<Postgres>::new(format!("SELECT COUNT(*) FROM {}", query.kind.table()));
        query.push_where(&mut qb);
        let count = qb.build_query_scalar::<i64>().fetch_one(&self.pool).await?;
        Ok(count)
    }

    async fn list(
        &self,
        query: &ContentQuery,
        page: Page,
        order: ContentOrder,
    ) -> Result<Vec<ContentItem>> {
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {} FROM {}",
            CONTENT_COLUMNS,
            query.kind.table()
        ));
        query.push_where(&mut qb);
        qb.push(order.sql());
        qb.push(" LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset);

        let rows = qb.build().fetch_all(&self.pool).await?;
        let mut items = rows
            .iter()
            .map(|row| Self::row_to_item(query.kind, row))
            .collect::<Result<Vec<_>>>()?;
        self.load_taxonomy(query.kind, &mut items).await?;
        Ok(items)
    }

    async fn get(&self, target: ContentRef) -> Result<Option<ContentItem>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE id = $1 AND deleted_at IS NULL",
            CONTENT_COLUMNS,
            target.kind.table()
        );
        let row = sqlx::query(&sql)
            .bind(target.id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let mut items = vec![Self::row_to_item(target.kind, &row)?];
                self.load_taxonomy(target.kind, &mut items).await?;
                Ok(items.pop())
            }
            None => Ok(None),
        }
    }

    async fn insert(&self, new: NewContent) -> Result<ContentItem> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            r#"
            INSERT INTO {} (
                id, author_id, realm_id, alias, area_alias, body, reply_to_id, repost_to_id,
                visibility, visible_account_ids, invisible_account_ids, is_draft,
                published_at, published_until
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING {}
            "#,
            new.kind.table(),
            CONTENT_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(Uuid::new_v4())
            .bind(new.author_id)
            .bind(new.realm_id)
            .bind(&new.alias)
            .bind(&new.area_alias)
            .bind(&new.body)
            .bind(new.reply_to_id)
            .bind(new.repost_to_id)
            .bind(new.visibility.as_i16())
            .bind(&new.visible_account_ids)
            .bind(&new.invisible_account_ids)
            .bind(new.is_draft)
            .bind(new.published_at)
            .bind(new.published_until)
            .fetch_one(&mut *tx)
            .await?;
        let item = Self::row_to_item(new.kind, &row)?;

        Self::replace_links(&mut tx, new.kind, item.id, &new.tag_ids, &new.category_ids).await?;
        tx.commit().await?;

        let mut items = vec![item];
        self.load_taxonomy(new.kind, &mut items).await?;
        items
            .pop()
            .ok_or_else(|| AppError::Internal("inserted row vanished".to_string()))
    }

    async fn update(&self, target: ContentRef, new: NewContent) -> Result<ContentItem> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            r#"
            UPDATE {} SET
                realm_id = $2, alias = $3, area_alias = $4, body = $5,
                visibility = $6, visible_account_ids = $7, invisible_account_ids = $8,
                is_draft = $9, published_at = $10, published_until = $11,
                edited_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING {}
            "#,
            target.kind.table(),
            CONTENT_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(target.id)
            .bind(new.realm_id)
            .bind(&new.alias)
            .bind(&new.area_alias)
            .bind(&new.body)
            .bind(new.visibility.as_i16())
            .bind(&new.visible_account_ids)
            .bind(&new.invisible_account_ids)
            .bind(new.is_draft)
            .bind(new.published_at)
            .bind(new.published_until)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("{} {}", target.kind, target.id)))?;
        let item = Self::row_to_item(target.kind, &row)?;

        Self::replace_links(&mut tx, target.kind, item.id, &new.tag_ids, &new.category_ids)
            .await?;
        tx.commit().await?;

        let mut items = vec![item];
        self.load_taxonomy(target.kind, &mut items).await?;
        items
            .pop()
            .ok_or_else(|| AppError::Internal("updated row vanished".to_string()))
    }

    async fn soft_delete(&self, target: ContentRef) -> Result<()> {
        self.set_timestamp(target, "deleted_at", Some(Utc::now()))
            .await
    }

    async fn set_pinned(&self, target: ContentRef, at: Option<DateTime<Utc>>) -> Result<()> {
        self.set_timestamp(target, "pinned_at", at).await
    }

    async fn set_locked(&self, target: ContentRef, at: Option<DateTime<Utc>>) -> Result<()> {
        self.set_timestamp(target, "locked_at", at).await
    }

    async fn count_children(
        &self,
        kind: ContentKind,
        parent_ids: &[Uuid],
        relation: ChildRelation,
    ) -> Result<HashMap<Uuid, i64>> {
        if parent_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let column = relation.column();
        let sql = format!(
            "SELECT {col} AS parent_id, COUNT(*) AS total FROM {table} \
             WHERE {col} = ANY($1) AND deleted_at IS NULL GROUP BY {col}",
            col = column,
            table = kind.table()
        );
        let rows = sqlx::query(&sql)
            .bind(parent_ids)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| (row.get::<Uuid, _>("parent_id"), row.get::<i64, _>("total")))
            .collect())
    }

    async fn alias_taken(
        &self,
        kind: ContentKind,
        area_alias: &str,
        alias: &str,
        except: Option<Uuid>,
    ) -> Result<bool> {
        let sql = format!(
            "SELECT EXISTS (SELECT 1 FROM {} WHERE area_alias = $1 AND alias = $2 \
             AND deleted_at IS NULL AND ($3::uuid IS NULL OR id <> $3))",
            kind.table()
        );
        let taken: bool = sqlx::query_scalar(&sql)
            .bind(area_alias)
            .bind(alias)
            .bind(except)
            .fetch_one(&self.pool)
            .await?;
        Ok(taken)
    }
}
