/// Database access layer for content-service
///
/// Storage is reached through the async traits below so the service layer can
/// run against PostgreSQL in production and against [`memory::MemoryStore`]
/// in tests.
pub mod content_query;
pub mod content_repo;
pub mod memory;
pub mod reaction_repo;
pub mod realm_repo;
pub mod subscription_repo;
pub mod taxonomy_repo;

pub use content_query::{ContentOrder, ContentQuery, Page, Predicate, MAX_PAGE_SIZE};
pub use content_repo::PgContentRepository;
pub use memory::MemoryStore;
pub use reaction_repo::PgReactionRepository;
pub use realm_repo::PgRealmRepository;
pub use subscription_repo::PgSubscriptionRepository;
pub use taxonomy_repo::PgTaxonomyRepository;

use crate::error::Result;
use crate::models::{
    Attitude, Category, ContentItem, ContentKind, ContentRef, NewContent, Reaction,
    ReactionTally, Realm, Subscription, SubscriptionTarget, Tag,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::migrate::Migrator;
use std::collections::HashMap;
use uuid::Uuid;

pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Parent relation counted by [`ContentStore::count_children`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildRelation {
    Reply,
    Repost,
}

impl ChildRelation {
    pub fn column(&self) -> &'static str {
        match self {
            ChildRelation::Reply => "reply_to_id",
            ChildRelation::Repost => "repost_to_id",
        }
    }
}

#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn count(&self, query: &ContentQuery) -> Result<i64>;

    /// Items matching `query`, with tags and categories loaded.
    async fn list(
        &self,
        query: &ContentQuery,
        page: Page,
        order: ContentOrder,
    ) -> Result<Vec<ContentItem>>;

    /// Unfiltered lookup of a live (not soft-deleted) item.
    async fn get(&self, target: ContentRef) -> Result<Option<ContentItem>>;

    async fn insert(&self, new: NewContent) -> Result<ContentItem>;

    /// Replaces the editable columns; vote counters are left untouched.
    async fn update(&self, target: ContentRef, new: NewContent) -> Result<ContentItem>;

    async fn soft_delete(&self, target: ContentRef) -> Result<()>;

    async fn set_pinned(&self, target: ContentRef, at: Option<DateTime<Utc>>) -> Result<()>;

    async fn set_locked(&self, target: ContentRef, at: Option<DateTime<Utc>>) -> Result<()>;

    /// Live children per parent id, in one grouped query.
    async fn count_children(
        &self,
        kind: ContentKind,
        parent_ids: &[Uuid],
        relation: ChildRelation,
    ) -> Result<HashMap<Uuid, i64>>;

    async fn alias_taken(
        &self,
        kind: ContentKind,
        area_alias: &str,
        alias: &str,
        except: Option<Uuid>,
    ) -> Result<bool>;
}

#[async_trait]
pub trait TaxonomyStore: Send + Sync {
    /// Categories with the given aliases; unknown aliases are simply absent.
    async fn find_categories(&self, aliases: &[String]) -> Result<Vec<Category>>;

    async fn get_or_create_tags(&self, aliases: &[String]) -> Result<Vec<Tag>>;
}

#[async_trait]
pub trait ReactionStore: Send + Sync {
    /// Removes the exact reaction if present, otherwise records it, adjusting
    /// the vote counter of the target in the same unit of work. Returns
    /// whether a reaction was created.
    async fn toggle(
        &self,
        account_id: Uuid,
        target: ContentRef,
        symbol: &str,
        attitude: Attitude,
    ) -> Result<(bool, Reaction)>;

    async fn tally(&self, kind: ContentKind, ids: &[Uuid]) -> Result<ReactionTally>;
}

#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    async fn find(
        &self,
        follower_id: Uuid,
        target: SubscriptionTarget,
    ) -> Result<Option<Subscription>>;

    async fn insert(&self, follower_id: Uuid, target: SubscriptionTarget) -> Result<Subscription>;

    async fn delete(&self, id: Uuid) -> Result<()>;

    /// Distinct followers of any of `targets`.
    async fn followers_of(&self, targets: &[SubscriptionTarget]) -> Result<Vec<Uuid>>;

    async fn purge_target(&self, target: SubscriptionTarget) -> Result<u64>;
}

#[async_trait]
pub trait RealmStore: Send + Sync {
    async fn upsert(&self, realm: Realm) -> Result<Realm>;

    async fn get_by_alias(&self, alias: &str) -> Result<Option<Realm>>;

    async fn get(&self, id: Uuid) -> Result<Option<Realm>>;
}
