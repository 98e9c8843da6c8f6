use crate::models::{ContentItem, ContentKind};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// One entry of a merged feed, regardless of the underlying kind.
#[derive(Debug, Clone, Serialize)]
pub struct FeedRecord {
    #[serde(rename = "type")]
    pub kind: ContentKind,
    pub data: ContentItem,
    pub created_at: DateTime<Utc>,
}

impl From<ContentItem> for FeedRecord {
    fn from(item: ContentItem) -> Self {
        Self {
            kind: item.kind,
            created_at: item.created_at,
            data: item,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FeedPage {
    /// Total matches across all kinds, independent of the page window.
    pub count: i64,
    pub data: Vec<FeedRecord>,
}
