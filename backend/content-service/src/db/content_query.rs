//! Composable content filters.
//!
//! A [`ContentQuery`] is a conjunction of [`Predicate`]s for a single content
//! kind. Storage adapters render it either as a SQL `WHERE` clause
//! ([`ContentQuery::push_where`]) or evaluate it in memory
//! ([`ContentQuery::matches`]); both renderings share the visibility and
//! publication rules.

use crate::models::{ContentItem, ContentKind};
use crate::services::publication::{
    in_draft_box, is_currently_published, push_draft_box_sql, push_published_sql,
};
use crate::services::visibility::{is_visible, push_visibility_sql, ViewerContext};
use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

/// Upper bound on any page, regardless of what the caller asked for.
pub const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Clone)]
pub enum Predicate {
    Id(Uuid),
    Alias { area: String, alias: String },
    /// `Some` restricts to one realm, `None` to items outside any realm.
    Realm(Option<Uuid>),
    Author(Uuid),
    AuthorIn(Vec<Uuid>),
    TagAlias(String),
    CategoryAlias(String),
    ReplyTo(Uuid),
    RootOnly,
    /// Case-insensitive substring over `content`, `title` and `description`.
    Probe(String),
    Visibility(ViewerContext),
    PublishedAt(DateTime<Utc>),
    DraftBox { author_id: Uuid, now: DateTime<Utc> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContentOrder {
    /// Publication time (creation time when unscheduled), newest first.
    #[default]
    Published,
    /// Publication time, ties broken by net votes.
    Popular,
    Random,
    /// Creation time, newest first.
    Newest,
}

impl ContentOrder {
    pub fn sql(&self) -> &'static str {
        match self {
            ContentOrder::Published => " ORDER BY COALESCE(published_at, created_at) DESC, id DESC",
            ContentOrder::Popular => {
                " ORDER BY COALESCE(published_at, created_at) DESC, (total_upvote - total_downvote) DESC, id DESC"
            }
            ContentOrder::Random => " ORDER BY RANDOM()",
            ContentOrder::Newest => " ORDER BY created_at DESC, id DESC",
        }
    }

    /// In-memory rendering of [`ContentOrder::sql`].
    pub fn sort(&self, items: &mut [ContentItem]) {
        match self {
            ContentOrder::Published => items.sort_by(|a, b| {
                effective_published_at(b)
                    .cmp(&effective_published_at(a))
                    .then(b.id.cmp(&a.id))
            }),
            ContentOrder::Popular => items.sort_by(|a, b| {
                effective_published_at(b)
                    .cmp(&effective_published_at(a))
                    .then(net_votes(b).cmp(&net_votes(a)))
                    .then(b.id.cmp(&a.id))
            }),
            ContentOrder::Random => items.shuffle(&mut rand::thread_rng()),
            ContentOrder::Newest => {
                items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)))
            }
        }
    }
}

fn effective_published_at(item: &ContentItem) -> DateTime<Utc> {
    item.published_at.unwrap_or(item.created_at)
}

fn net_votes(item: &ContentItem) -> i64 {
    i64::from(item.total_upvote) - i64::from(item.total_downvote)
}

/// Clamped page window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

impl Page {
    pub fn new(limit: i64, offset: i64) -> Self {
        Self {
            limit: limit.clamp(1, MAX_PAGE_SIZE),
            offset: offset.max(0),
        }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(20, 0)
    }
}

#[derive(Debug, Clone)]
pub struct ContentQuery {
    pub kind: ContentKind,
    predicates: Vec<Predicate>,
}

impl ContentQuery {
    pub fn new(kind: ContentKind) -> Self {
        Self {
            kind,
            predicates: Vec::new(),
        }
    }

    /// Same filters, different kind.
    pub fn for_kind(&self, kind: ContentKind) -> Self {
        Self {
            kind,
            predicates: self.predicates.clone(),
        }
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn and(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn with_id(self, id: Uuid) -> Self {
        self.and(Predicate::Id(id))
    }

    pub fn with_alias(self, area: impl Into<String>, alias: impl Into<String>) -> Self {
        self.and(Predicate::Alias {
            area: area.into(),
            alias: alias.into(),
        })
    }

    pub fn in_realm(self, realm_id: Option<Uuid>) -> Self {
        self.and(Predicate::Realm(realm_id))
    }

    pub fn by_author(self, author_id: Uuid) -> Self {
        self.and(Predicate::Author(author_id))
    }

    pub fn by_authors(self, author_ids: Vec<Uuid>) -> Self {
        self.and(Predicate::AuthorIn(author_ids))
    }

    pub fn with_tag(self, alias: impl Into<String>) -> Self {
        self.and(Predicate::TagAlias(alias.into()))
    }

    pub fn with_category(self, alias: impl Into<String>) -> Self {
        self.and(Predicate::CategoryAlias(alias.into()))
    }

    pub fn replying_to(self, parent_id: Uuid) -> Self {
        self.and(Predicate::ReplyTo(parent_id))
    }

    pub fn root_only(self) -> Self {
        self.and(Predicate::RootOnly)
    }

    pub fn probe(self, needle: impl Into<String>) -> Self {
        self.and(Predicate::Probe(needle.into()))
    }

    pub fn visible_to(self, viewer: ViewerContext) -> Self {
        self.and(Predicate::Visibility(viewer))
    }

    pub fn published(self, now: DateTime<Utc>) -> Self {
        self.and(Predicate::PublishedAt(now))
    }

    pub fn draft_box(self, author_id: Uuid, now: DateTime<Utc>) -> Self {
        self.and(Predicate::DraftBox { author_id, now })
    }

    /// Appends ` WHERE deleted_at IS NULL AND ...` over unqualified columns of
    /// `self.kind.table()`.
    pub fn push_where(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        qb.push(" WHERE deleted_at IS NULL");
        for predicate in &self.predicates {
            qb.push(" AND ");
            self.push_predicate(qb, predicate);
        }
    }

    fn push_predicate(&self, qb: &mut QueryBuilder<'_, Postgres>, predicate: &Predicate) {
        let table = self.kind.table();
        match predicate {
            Predicate::Id(id) => {
                qb.push("id = ").push_bind(*id);
            }
            Predicate::Alias { area, alias } => {
                qb.push("(area_alias = ")
                    .push_bind(area.clone())
                    .push(" AND alias = ")
                    .push_bind(alias.clone())
                    .push(")");
            }
            Predicate::Realm(Some(realm_id)) => {
                qb.push("realm_id = ").push_bind(*realm_id);
            }
            Predicate::Realm(None) => {
                qb.push("realm_id IS NULL");
            }
            Predicate::Author(author_id) => {
                qb.push("author_id = ").push_bind(*author_id);
            }
            Predicate::AuthorIn(author_ids) => {
                qb.push("author_id = ANY(")
                    .push_bind(author_ids.clone())
                    .push(")");
            }
            Predicate::TagAlias(alias) => {
                qb.push("EXISTS (SELECT 1 FROM content_tags ct JOIN tags t ON t.id = ct.tag_id WHERE ct.content_kind = ")
                    .push_bind(self.kind.as_str())
                    .push(format!(" AND ct.content_id = {}.id AND t.alias = ", table))
                    .push_bind(alias.clone())
                    .push(")");
            }
            Predicate::CategoryAlias(alias) => {
                qb.push("EXISTS (SELECT 1 FROM content_categories cc JOIN categories c ON c.id = cc.category_id WHERE cc.content_kind = ")
                    .push_bind(self.kind.as_str())
                    .push(format!(" AND cc.content_id = {}.id AND c.alias = ", table))
                    .push_bind(alias.clone())
                    .push(")");
            }
            Predicate::ReplyTo(parent_id) => {
                qb.push("reply_to_id = ").push_bind(*parent_id);
            }
            Predicate::RootOnly => {
                qb.push("reply_to_id IS NULL");
            }
            Predicate::Probe(needle) => {
                let pattern = format!("%{}%", escape_like(needle));
                qb.push("(body->>'content' ILIKE ")
                    .push_bind(pattern.clone())
                    .push(" OR body->>'title' ILIKE ")
                    .push_bind(pattern.clone())
                    .push(" OR body->>'description' ILIKE ")
                    .push_bind(pattern)
                    .push(")");
            }
            Predicate::Visibility(viewer) => push_visibility_sql(qb, viewer),
            Predicate::PublishedAt(now) => push_published_sql(qb, *now),
            Predicate::DraftBox { author_id, now } => push_draft_box_sql(qb, *author_id, *now),
        }
    }

    /// In-memory evaluation; `item` must already be of `self.kind` and not
    /// soft-deleted.
    pub fn matches(&self, item: &ContentItem) -> bool {
        item.kind == self.kind && self.predicates.iter().all(|p| predicate_matches(p, item))
    }
}

fn predicate_matches(predicate: &Predicate, item: &ContentItem) -> bool {
    match predicate {
        Predicate::Id(id) => item.id == *id,
        Predicate::Alias { area, alias } => {
            item.area_alias.as_deref() == Some(area.as_str())
                && item.alias.as_deref() == Some(alias.as_str())
        }
        Predicate::Realm(realm_id) => item.realm_id == *realm_id,
        Predicate::Author(author_id) => item.author_id == *author_id,
        Predicate::AuthorIn(author_ids) => author_ids.contains(&item.author_id),
        Predicate::TagAlias(alias) => item.tags.iter().any(|t| &t.alias == alias),
        Predicate::CategoryAlias(alias) => item.categories.iter().any(|c| &c.alias == alias),
        Predicate::ReplyTo(parent_id) => item.reply_to_id == Some(*parent_id),
        Predicate::RootOnly => item.reply_to_id.is_none(),
        Predicate::Probe(needle) => {
            let needle = needle.to_lowercase();
            ["content", "title", "description"].iter().any(|key| {
                item.body
                    .get(*key)
                    .and_then(|v| v.as_str())
                    .map(|text| text.to_lowercase().contains(&needle))
                    .unwrap_or(false)
            })
        }
        Predicate::Visibility(viewer) => is_visible(item, viewer),
        Predicate::PublishedAt(now) => is_currently_published(item, *now),
        Predicate::DraftBox { author_id, now } => in_draft_box(item, *author_id, *now),
    }
}

/// Escapes `%`, `_` and the escape character itself for `ILIKE`.
pub fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}
