//! Feed composition across content kinds.
//!
//! Every registered kind is queried with the same filters; results are
//! normalized into [`FeedRecord`]s, merged in the listing order and cut to
//! the requested page size. `count` is the sum of the per-kind totals.

use crate::db::{ContentOrder, ContentQuery, ContentStore, Page};
use crate::error::{AppError, Result};
use crate::metrics::FEED_COMPOSE_DURATION_SECONDS;
use crate::models::{ContentItem, ContentKind, FeedPage, FeedRecord};
use crate::services::reactions::ReactionLedger;
use crate::services::visibility::ViewerContext;
use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Structural filters shared by every listing.
#[derive(Debug, Clone, Default)]
pub struct FeedFilter {
    pub realm_id: Option<Uuid>,
    pub author_id: Option<Uuid>,
    pub tag: Option<String>,
    pub category: Option<String>,
    pub probe: Option<String>,
    pub reply_to: Option<Uuid>,
    /// Replies are excluded unless asked for (or `reply_to` is set).
    pub include_replies: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FeedMode {
    #[default]
    Latest,
    /// Featured listing: ties on publication time go to the better voted item.
    Popular,
    Shuffle,
    /// Only items authored by the viewer's (unblocked) friends.
    Friends,
    /// Free-text search; a probe is required.
    Search,
    /// The viewer's own unpublished items.
    Drafts,
}

impl FeedMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedMode::Latest => "latest",
            FeedMode::Popular => "popular",
            FeedMode::Shuffle => "shuffle",
            FeedMode::Friends => "friends",
            FeedMode::Search => "search",
            FeedMode::Drafts => "drafts",
        }
    }

    fn order(&self) -> ContentOrder {
        match self {
            FeedMode::Latest | FeedMode::Friends | FeedMode::Search => ContentOrder::Published,
            FeedMode::Popular => ContentOrder::Popular,
            FeedMode::Shuffle => ContentOrder::Random,
            FeedMode::Drafts => ContentOrder::Newest,
        }
    }
}

impl TryFrom<&str> for FeedMode {
    type Error = AppError;
    fn try_from(s: &str) -> std::result::Result<Self, Self::Error> {
        match s {
            "latest" => Ok(FeedMode::Latest),
            "popular" | "featured" => Ok(FeedMode::Popular),
            "shuffle" => Ok(FeedMode::Shuffle),
            "friends" => Ok(FeedMode::Friends),
            "search" => Ok(FeedMode::Search),
            "drafts" => Ok(FeedMode::Drafts),
            other => Err(AppError::ValidationError(format!(
                "unknown feed mode: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedOptions {
    pub mode: FeedMode,
    /// Shorten `body.content` for list views.
    pub truncate: bool,
}

impl Default for FeedOptions {
    fn default() -> Self {
        Self {
            mode: FeedMode::Latest,
            truncate: true,
        }
    }
}

#[derive(Clone)]
pub struct FeedComposer {
    content: Arc<dyn ContentStore>,
    ledger: ReactionLedger,
    kinds: Vec<ContentKind>,
    truncate_threshold: usize,
}

impl FeedComposer {
    pub fn new(
        content: Arc<dyn ContentStore>,
        ledger: ReactionLedger,
        truncate_threshold: usize,
    ) -> Self {
        Self {
            content,
            ledger,
            kinds: ContentKind::ALL.to_vec(),
            truncate_threshold,
        }
    }

    /// Builds the query for one kind: structural filters plus either the
    /// visibility and publication rules or, in draft mode, the draft box.
    pub fn build_query(
        &self,
        kind: ContentKind,
        viewer: &ViewerContext,
        filter: &FeedFilter,
        mode: FeedMode,
        now: DateTime<Utc>,
    ) -> Result<ContentQuery> {
        let mut query = ContentQuery::new(kind);

        if let Some(realm_id) = filter.realm_id {
            query = query.in_realm(Some(realm_id));
        }
        if let Some(author_id) = filter.author_id {
            query = query.by_author(author_id);
        }
        if let Some(tag) = &filter.tag {
            query = query.with_tag(tag.clone());
        }
        if let Some(category) = &filter.category {
            query = query.with_category(category.clone());
        }
        match filter.reply_to {
            Some(parent_id) => query = query.replying_to(parent_id),
            None if !filter.include_replies => query = query.root_only(),
            None => {}
        }

        let probe = filter
            .probe
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty());
        if let Some(probe) = probe {
            query = query.probe(probe);
        } else if mode == FeedMode::Search {
            return Err(AppError::ValidationError(
                "search requires a non-empty probe".to_string(),
            ));
        }

        match mode {
            FeedMode::Drafts => {
                let author_id = viewer.account_id.ok_or_else(|| {
                    AppError::Unauthorized("drafts require a signed-in viewer".to_string())
                })?;
                Ok(query.draft_box(author_id, now))
            }
            FeedMode::Friends => {
                if viewer.is_anonymous() {
                    return Err(AppError::Unauthorized(
                        "friends feed requires a signed-in viewer".to_string(),
                    ));
                }
                let friends: Vec<Uuid> = viewer
                    .social
                    .friends
                    .iter()
                    .filter(|id| viewer.social.is_trusted(id))
                    .copied()
                    .collect();
                Ok(query
                    .by_authors(friends)
                    .visible_to(viewer.clone())
                    .published(now))
            }
            _ => Ok(query.visible_to(viewer.clone()).published(now)),
        }
    }

    /// Merged multi-kind feed.
    pub async fn compose(
        &self,
        viewer: &ViewerContext,
        filter: &FeedFilter,
        page: Page,
        options: FeedOptions,
    ) -> Result<FeedPage> {
        self.compose_kinds(&self.kinds, viewer, filter, page, options)
            .await
    }

    /// Single-kind listing through the same path.
    pub async fn list_kind(
        &self,
        kind: ContentKind,
        viewer: &ViewerContext,
        filter: &FeedFilter,
        page: Page,
        options: FeedOptions,
    ) -> Result<FeedPage> {
        self.compose_kinds(&[kind], viewer, filter, page, options)
            .await
    }

    async fn compose_kinds(
        &self,
        kinds: &[ContentKind],
        viewer: &ViewerContext,
        filter: &FeedFilter,
        page: Page,
        options: FeedOptions,
    ) -> Result<FeedPage> {
        let _timer = FEED_COMPOSE_DURATION_SECONDS
            .with_label_values(&[options.mode.as_str()])
            .start_timer();
        let now = Utc::now();
        let order = options.mode.order();

        let queries = kinds
            .iter()
            .map(|kind| self.build_query(*kind, viewer, filter, options.mode, now))
            .collect::<Result<Vec<_>>>()?;

        let per_kind = try_join_all(queries.iter().map(|query| async move {
            tokio::try_join!(
                self.content.count(query),
                self.content.list(query, page, order)
            )
        }))
        .await?;

        let count: i64 = per_kind.iter().map(|(count, _)| *count).sum();
        let mut items: Vec<ContentItem> = per_kind
            .into_iter()
            .flat_map(|(_, items)| items)
            .collect();

        // A single kind is already in storage order; merged kinds are
        // re-sorted with the order that picked each kind's page.
        if kinds.len() > 1 {
            order.sort(&mut items);
        }
        items.truncate(page.limit as usize);

        let mut items = self.attach_metrics(items, kinds).await?;

        if options.truncate {
            for item in items.iter_mut() {
                truncate_body(&mut item.body, self.truncate_threshold);
            }
        }

        debug!(
            mode = options.mode.as_str(),
            kinds = kinds.len(),
            count,
            returned = items.len(),
            offset = page.offset,
            "feed composed"
        );

        Ok(FeedPage {
            count,
            data: items.into_iter().map(FeedRecord::from).collect(),
        })
    }

    /// Attaches tallies per kind without disturbing the page order.
    async fn attach_metrics(
        &self,
        items: Vec<ContentItem>,
        kinds: &[ContentKind],
    ) -> Result<Vec<ContentItem>> {
        let mut slots: Vec<Option<ContentItem>> = Vec::with_capacity(items.len());
        let mut rest: Vec<(usize, ContentItem)> = items.into_iter().enumerate().collect();
        slots.resize_with(rest.len(), || None);

        for kind in kinds {
            let (of_kind, others): (Vec<_>, Vec<_>) =
                rest.into_iter().partition(|(_, item)| item.kind == *kind);
            rest = others;
            let (positions, mut batch): (Vec<usize>, Vec<ContentItem>) =
                of_kind.into_iter().unzip();
            self.ledger.attach_metrics(*kind, &mut batch).await?;
            for (index, item) in positions.into_iter().zip(batch) {
                slots[index] = Some(item);
            }
        }
        for (index, item) in rest {
            slots[index] = Some(item);
        }
        Ok(slots.into_iter().flatten().collect())
    }
}

/// Prefix of `text` holding `max_chars` characters, or `None` when `text` is
/// not longer than that.
pub fn truncate_chars(text: &str, max_chars: usize) -> Option<&str> {
    text.char_indices()
        .nth(max_chars)
        .map(|(byte_index, _)| &text[..byte_index])
}

/// Cuts `body.content` to `threshold` characters plus `"..."` and marks the
/// body with `content_truncated`.
pub fn truncate_body(body: &mut serde_json::Value, threshold: usize) {
    let Some(content) = body.get("content").and_then(|v| v.as_str()) else {
        return;
    };
    let Some(prefix) = truncate_chars(content, threshold) else {
        return;
    };
    let shortened = format!("{}...", prefix);
    if let Some(object) = body.as_object_mut() {
        object.insert("content".to_string(), serde_json::Value::String(shortened));
        object.insert("content_truncated".to_string(), serde_json::Value::Bool(true));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_chars_counts_characters_not_bytes() {
        assert_eq!(truncate_chars("héllo", 2), Some("hé"));
        assert_eq!(truncate_chars("héllo", 5), None);
        assert_eq!(truncate_chars("", 0), None);
    }

    #[test]
    fn long_content_is_truncated_and_flagged() {
        let mut body = serde_json::json!({ "content": "a".repeat(200) });
        truncate_body(&mut body, 160);
        let content = body["content"].as_str().unwrap();
        assert_eq!(content.chars().count(), 163);
        assert!(content.ends_with("..."));
        assert_eq!(body["content_truncated"], true);
    }

    #[test]
    fn short_content_is_untouched() {
        let mut body = serde_json::json!({ "content": "short" });
        truncate_body(&mut body, 160);
        assert_eq!(body["content"], "short");
        assert!(body.get("content_truncated").is_none());
    }

    #[test]
    fn feed_mode_parses_aliases() {
        assert_eq!(FeedMode::try_from("featured").unwrap(), FeedMode::Popular);
        assert!(FeedMode::try_from("trending").is_err());
    }
}
