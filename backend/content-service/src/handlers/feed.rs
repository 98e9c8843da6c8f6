use actix_web::{web, HttpResponse};
use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::config::FeedConfig;
use crate::db::Page;
use crate::error::{AppError, Result};
use crate::handlers::AppState;
use crate::middleware::ViewerId;
use crate::models::{ContentKind, FeedPage};
use crate::services::{FeedFilter, FeedMode, FeedOptions};

#[derive(Debug, Default, Deserialize)]
pub struct FeedQueryParams {
    pub mode: Option<String>,
    /// Realm alias.
    pub realm: Option<String>,
    pub author: Option<Uuid>,
    pub tag: Option<String>,
    pub category: Option<String>,
    pub probe: Option<String>,
    pub reply_to: Option<Uuid>,
    #[serde(default)]
    pub include_replies: bool,
    /// Full bodies instead of list-view previews.
    #[serde(default)]
    pub full: bool,
    pub take: Option<i64>,
    pub offset: Option<i64>,
    pub cursor: Option<String>,
}

impl FeedQueryParams {
    pub(crate) fn decode_cursor(&self) -> Result<i64> {
        match &self.cursor {
            Some(cursor) => {
                let decoded = general_purpose::STANDARD
                    .decode(cursor)
                    .map_err(|_| AppError::ValidationError("Invalid cursor format".to_string()))?;

                let offset_str = String::from_utf8(decoded).map_err(|_| {
                    AppError::ValidationError("Invalid cursor encoding".to_string())
                })?;

                offset_str
                    .parse::<i64>()
                    .ok()
                    .filter(|offset| *offset >= 0)
                    .ok_or_else(|| AppError::ValidationError("Invalid cursor value".to_string()))
            }
            None => Ok(self.offset.unwrap_or(0)),
        }
    }

    pub(crate) fn encode_cursor(offset: i64) -> String {
        general_purpose::STANDARD.encode(offset.to_string())
    }

    /// Limit clamped to the configured maximum; a cursor wins over `offset`.
    pub(crate) fn page(&self, config: &FeedConfig) -> Result<Page> {
        let limit = self
            .take
            .unwrap_or(config.default_page_size)
            .clamp(1, config.max_page_size);
        Ok(Page::new(limit, self.decode_cursor()?))
    }

    fn mode(&self) -> Result<FeedMode> {
        self.mode
            .as_deref()
            .map(FeedMode::try_from)
            .transpose()
            .map(Option::unwrap_or_default)
    }
}

#[derive(Debug, Serialize)]
pub struct FeedResponse {
    #[serde(flatten)]
    pub page: FeedPage,
    /// Present while more items remain past this page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

impl FeedResponse {
    fn new(page: FeedPage, requested: Page) -> Self {
        let next_offset = requested.offset + page.data.len() as i64;
        let cursor = (!page.data.is_empty() && next_offset < page.count)
            .then(|| FeedQueryParams::encode_cursor(next_offset));
        Self { page, cursor }
    }
}

async fn filter_from(
    state: &AppState,
    query: &FeedQueryParams,
    viewer: &ViewerId,
) -> Result<FeedFilter> {
    let realm_id = match query.realm.as_deref() {
        Some(alias) => {
            let realm = state.realms.resolve(alias).await?;
            state.realms.ensure_can_browse(&realm, viewer.0).await?;
            Some(realm.id)
        }
        None => None,
    };
    Ok(FeedFilter {
        realm_id,
        author_id: query.author,
        tag: query.tag.clone(),
        category: query.category.clone(),
        probe: query.probe.clone(),
        reply_to: query.reply_to,
        include_replies: query.include_replies,
    })
}

/// Merged feed over every content kind.
pub async fn get_feed(
    query: web::Query<FeedQueryParams>,
    viewer: ViewerId,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let page = query.page(&state.feed_config)?;
    let options = FeedOptions {
        mode: query.mode()?,
        truncate: !query.full,
    };
    debug!(
        viewer = ?viewer.0,
        mode = options.mode.as_str(),
        limit = page.limit,
        offset = page.offset,
        "feed request"
    );

    let filter = filter_from(&state, &query, &viewer).await?;
    let context = state.social.load(viewer.0).await;
    let feed = state.feed.compose(&context, &filter, page, options).await?;

    Ok(HttpResponse::Ok().json(FeedResponse::new(feed, page)))
}

/// The caller's drafts, scheduled and expired items.
pub async fn get_drafts(
    query: web::Query<FeedQueryParams>,
    viewer: ViewerId,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let page = query.page(&state.feed_config)?;
    let mut filter = filter_from(&state, &query, &viewer).await?;
    filter.include_replies = true;
    let options = FeedOptions {
        mode: FeedMode::Drafts,
        truncate: !query.full,
    };

    let context = state.social.load(viewer.0).await;
    let feed = state.feed.compose(&context, &filter, page, options).await?;

    Ok(HttpResponse::Ok().json(FeedResponse::new(feed, page)))
}

/// Listing of a single kind, e.g. `/posts` or `/articles`.
pub async fn list_kind(
    path: web::Path<String>,
    query: web::Query<FeedQueryParams>,
    viewer: ViewerId,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let kind = ContentKind::try_from(path.as_str())?;
    let page = query.page(&state.feed_config)?;
    let options = FeedOptions {
        mode: query.mode()?,
        truncate: !query.full,
    };

    let filter = filter_from(&state, &query, &viewer).await?;
    let context = state.social.load(viewer.0).await;
    let feed = state
        .feed
        .list_kind(kind, &context, &filter, page, options)
        .await?;

    Ok(HttpResponse::Ok().json(FeedResponse::new(feed, page)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_takes_precedence_over_offset() {
        let query = FeedQueryParams {
            offset: Some(3),
            cursor: Some(FeedQueryParams::encode_cursor(40)),
            ..Default::default()
        };
        assert_eq!(query.decode_cursor().unwrap(), 40);
    }

    #[test]
    fn invalid_cursor_is_rejected() {
        let query = FeedQueryParams {
            cursor: Some("%%%".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            query.decode_cursor(),
            Err(AppError::ValidationError(_))
        ));
    }

    #[test]
    fn page_size_is_clamped_to_config() {
        let config = FeedConfig::default();
        let query = FeedQueryParams {
            take: Some(10_000),
            ..Default::default()
        };
        assert_eq!(query.page(&config).unwrap().limit, config.max_page_size);

        let query = FeedQueryParams::default();
        assert_eq!(query.page(&config).unwrap().limit, config.default_page_size);
    }

    #[test]
    fn cursor_only_while_items_remain() {
        let page = FeedPage {
            count: 5,
            data: vec![],
        };
        assert!(FeedResponse::new(page, Page::new(2, 0)).cursor.is_none());
    }

    #[test]
    fn default_mode_is_latest() {
        assert_eq!(FeedQueryParams::default().mode().unwrap(), FeedMode::Latest);
    }
}
