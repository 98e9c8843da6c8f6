/// Data models for content-service
///
/// - `ContentItem`: the common projection of every content kind (posts, articles)
/// - `Reaction`: a viewer's symbol/attitude on an item
/// - `Subscription`: a follower watching an account, tag, category or realm
/// - `Realm`: local mirror of realm data owned by the identity provider
/// - `FeedRecord` / `FeedPage`: normalized, merged feed output
pub mod feed;
pub mod reaction;
pub mod realm;
pub mod subscription;

pub use feed::{FeedPage, FeedRecord};
pub use reaction::{Attitude, Reaction, ReactionTally};
pub use realm::{Realm, RealmMember};
pub use subscription::{Subscription, SubscriptionTarget};

use crate::error::AppError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Closed set of content kinds. Each kind lives in its own table and shares
/// the common column set described by [`ContentItem`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Post,
    Article,
}

impl ContentKind {
    pub const ALL: [ContentKind; 2] = [ContentKind::Post, ContentKind::Article];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Post => "post",
            ContentKind::Article => "article",
        }
    }

    pub fn table(&self) -> &'static str {
        match self {
            ContentKind::Post => "posts",
            ContentKind::Article => "articles",
        }
    }

    /// Column in `reactions` that references this kind.
    pub fn reaction_column(&self) -> &'static str {
        match self {
            ContentKind::Post => "post_id",
            ContentKind::Article => "article_id",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ContentKind {
    type Error = AppError;
    fn try_from(s: &str) -> std::result::Result<Self, Self::Error> {
        match s {
            "post" | "posts" => Ok(ContentKind::Post),
            "article" | "articles" => Ok(ContentKind::Article),
            _ => Err(AppError::ValidationError(format!(
                "unknown content kind: {}",
                s
            ))),
        }
    }
}

/// Addresses one item of one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentRef {
    pub kind: ContentKind,
    pub id: Uuid,
}

impl ContentRef {
    pub fn new(kind: ContentKind, id: Uuid) -> Self {
        Self { kind, id }
    }
}

/// Who may see an item besides its author. Stored as SMALLINT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum VisibilityTier {
    #[default]
    All,
    FriendsOnly,
    Filtered,
    Selected,
    None,
}

impl VisibilityTier {
    pub fn as_i16(&self) -> i16 {
        match self {
            VisibilityTier::All => 0,
            VisibilityTier::FriendsOnly => 1,
            VisibilityTier::Filtered => 2,
            VisibilityTier::Selected => 3,
            VisibilityTier::None => 4,
        }
    }
}

impl TryFrom<i16> for VisibilityTier {
    type Error = AppError;
    fn try_from(v: i16) -> std::result::Result<Self, Self::Error> {
        match v {
            0 => Ok(VisibilityTier::All),
            1 => Ok(VisibilityTier::FriendsOnly),
            2 => Ok(VisibilityTier::Filtered),
            3 => Ok(VisibilityTier::Selected),
            4 => Ok(VisibilityTier::None),
            other => Err(AppError::Internal(format!(
                "invalid visibility tier stored: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: Uuid,
    pub alias: String,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: Uuid,
    pub alias: String,
    pub name: String,
    pub description: String,
}

/// Aggregates attached to an item when it is served.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentMetric {
    pub reply_count: i64,
    pub repost_count: i64,
    pub reaction_count: i64,
    pub reaction_list: HashMap<String, i64>,
}

/// Common projection of a post or an article.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: Uuid,
    pub kind: ContentKind,
    pub author_id: Uuid,
    pub realm_id: Option<Uuid>,
    pub alias: Option<String>,
    pub area_alias: Option<String>,
    pub body: serde_json::Value,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub categories: Vec<Category>,
    pub reply_to_id: Option<Uuid>,
    pub repost_to_id: Option<Uuid>,
    pub visibility: VisibilityTier,
    #[serde(default)]
    pub visible_account_ids: Vec<Uuid>,
    #[serde(default)]
    pub invisible_account_ids: Vec<Uuid>,
    pub is_draft: bool,
    pub published_at: Option<DateTime<Utc>>,
    pub published_until: Option<DateTime<Utc>>,
    pub edited_at: Option<DateTime<Utc>>,
    pub pinned_at: Option<DateTime<Utc>>,
    pub locked_at: Option<DateTime<Utc>>,
    pub total_upvote: i32,
    pub total_downvote: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metric: Option<ContentMetric>,
}

impl ContentItem {
    pub fn content_ref(&self) -> ContentRef {
        ContentRef::new(self.kind, self.id)
    }

    /// `body.title`, present for articles.
    pub fn title(&self) -> Option<&str> {
        self.body.get("title").and_then(|v| v.as_str())
    }

    /// `body.content`, present for every kind.
    pub fn content(&self) -> Option<&str> {
        self.body.get("content").and_then(|v| v.as_str())
    }
}

/// Kind-specific payload for short posts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostBody {
    pub content: String,
    #[serde(default)]
    pub attachments: Vec<String>,
}

/// Kind-specific payload for long-form articles.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleBody {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub content: String,
    #[serde(default)]
    pub attachments: Vec<String>,
}

/// Tagged payload submitted on create/edit. The kind is carried by the variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContentPayload {
    Post(PostBody),
    Article(ArticleBody),
}

impl ContentPayload {
    pub fn kind(&self) -> ContentKind {
        match self {
            ContentPayload::Post(_) => ContentKind::Post,
            ContentPayload::Article(_) => ContentKind::Article,
        }
    }

    pub fn attachments(&self) -> &[String] {
        match self {
            ContentPayload::Post(body) => &body.attachments,
            ContentPayload::Article(body) => &body.attachments,
        }
    }

    /// JSON body stored in the `body` column.
    pub fn to_body(&self) -> Result<serde_json::Value, AppError> {
        let value = match self {
            ContentPayload::Post(body) => serde_json::to_value(body)?,
            ContentPayload::Article(body) => serde_json::to_value(body)?,
        };
        Ok(value)
    }
}

/// Caller-supplied fields for creating or editing an item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentDraft {
    pub payload: ContentPayload,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub realm_alias: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub reply_to_id: Option<Uuid>,
    #[serde(default)]
    pub repost_to_id: Option<Uuid>,
    #[serde(default)]
    pub visibility: VisibilityTier,
    #[serde(default)]
    pub visible_account_ids: Vec<Uuid>,
    #[serde(default)]
    pub invisible_account_ids: Vec<Uuid>,
    #[serde(default)]
    pub is_draft: bool,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub published_until: Option<DateTime<Utc>>,
}

/// Fully resolved row ready to be written. Vote counters are never part of it.
#[derive(Debug, Clone)]
pub struct NewContent {
    pub kind: ContentKind,
    pub author_id: Uuid,
    pub realm_id: Option<Uuid>,
    pub alias: Option<String>,
    pub area_alias: Option<String>,
    pub body: serde_json::Value,
    pub tag_ids: Vec<Uuid>,
    pub category_ids: Vec<Uuid>,
    pub reply_to_id: Option<Uuid>,
    pub repost_to_id: Option<Uuid>,
    pub visibility: VisibilityTier,
    pub visible_account_ids: Vec<Uuid>,
    pub invisible_account_ids: Vec<Uuid>,
    pub is_draft: bool,
    pub published_at: Option<DateTime<Utc>>,
    pub published_until: Option<DateTime<Utc>>,
}

/// The acting, authenticated account as forwarded by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: Uuid,
    pub name: String,
    pub nick: String,
}

/// Published, public item with an empty post body.
#[cfg(test)]
pub(crate) fn sample_item(kind: ContentKind, author_id: Uuid) -> ContentItem {
    let now = Utc::now();
    ContentItem {
        id: Uuid::new_v4(),
        kind,
        author_id,
        realm_id: None,
        alias: None,
        area_alias: None,
        body: serde_json::json!({ "content": "" }),
        tags: vec![],
        categories: vec![],
        reply_to_id: None,
        repost_to_id: None,
        visibility: VisibilityTier::All,
        visible_account_ids: vec![],
        invisible_account_ids: vec![],
        is_draft: false,
        published_at: None,
        published_until: None,
        edited_at: None,
        pinned_at: None,
        locked_at: None,
        total_upvote: 0,
        total_downvote: 0,
        created_at: now,
        updated_at: now,
        metric: None,
    }
}
