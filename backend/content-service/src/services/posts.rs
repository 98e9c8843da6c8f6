/// Content write and single-item read paths.
///
/// Creation resolves every reference (realm, tags, categories, attachments,
/// reply and repost targets) before anything is written; notifications are
/// handed to the dispatcher only after the write succeeded.
use crate::clients::AttachmentChecker;
use crate::db::{ContentOrder, ContentQuery, ContentStore, Page, TaxonomyStore};
use crate::error::{AppError, Result};
use crate::models::{
    Actor, Attitude, ContentDraft, ContentItem, ContentKind, ContentPayload, ContentRef,
    NewContent, Reaction,
};
use crate::notifications::{ContentEvent, NotificationDispatcher};
use crate::services::publication::is_currently_published;
use crate::services::reactions::ReactionLedger;
use crate::services::realms::RealmDirectory;
use crate::services::visibility::{is_visible, ViewerContext};
use chrono::Utc;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};

lazy_static! {
    static ref ALIAS_PATTERN: Regex =
        Regex::new(r"^[a-z0-9.-]+$").expect("alias pattern must compile");
}

pub const MAX_ALIAS_LENGTH: usize = 255;

#[derive(Clone)]
pub struct ContentService {
    content: Arc<dyn ContentStore>,
    taxonomy: Arc<dyn TaxonomyStore>,
    ledger: ReactionLedger,
    realms: RealmDirectory,
    attachments: Arc<dyn AttachmentChecker>,
    notifications: NotificationDispatcher,
}

impl ContentService {
    pub fn new(
        content: Arc<dyn ContentStore>,
        taxonomy: Arc<dyn TaxonomyStore>,
        ledger: ReactionLedger,
        realms: RealmDirectory,
        attachments: Arc<dyn AttachmentChecker>,
        notifications: NotificationDispatcher,
    ) -> Self {
        Self {
            content,
            taxonomy,
            ledger,
            realms,
            attachments,
            notifications,
        }
    }

    pub async fn create(&self, actor: &Actor, draft: ContentDraft) -> Result<ContentItem> {
        let kind = draft.payload.kind();

        let parent = match draft.reply_to_id {
            Some(parent_id) => {
                let parent = self.require(ContentRef::new(kind, parent_id)).await?;
                if parent.locked_at.is_some() {
                    return Err(AppError::Forbidden(format!(
                        "{} {} is locked for replies",
                        kind, parent_id
                    )));
                }
                Some(parent)
            }
            None => None,
        };
        if let Some(repost_id) = draft.repost_to_id {
            self.require(ContentRef::new(kind, repost_id)).await?;
        }

        let new = self.resolve(actor, &draft, None).await?;
        let item = self.content.insert(new).await?;

        info!(
            kind = %item.kind,
            item_id = %item.id,
            author_id = %actor.id,
            "content created"
        );

        if let Some(parent) = parent {
            self.notifications.dispatch(ContentEvent::Replied {
                actor: actor.clone(),
                parent,
                reply: item.clone(),
            });
        }
        if is_currently_published(&item, Utc::now()) {
            self.notifications.dispatch(ContentEvent::Published {
                actor: actor.clone(),
                item: item.clone(),
            });
        }

        Ok(item)
    }

    pub async fn edit(
        &self,
        actor: &Actor,
        target: ContentRef,
        draft: ContentDraft,
    ) -> Result<ContentItem> {
        if draft.payload.kind() != target.kind {
            return Err(AppError::ValidationError(format!(
                "payload kind {} does not match {}",
                draft.payload.kind(),
                target.kind
            )));
        }
        let existing = self.require_owned(actor, target).await?;
        let new = self.resolve(actor, &draft, Some(&existing)).await?;
        let item = self.content.update(target, new).await?;

        debug!(kind = %target.kind, item_id = %target.id, "content edited");

        // A draft going live announces itself like a fresh item.
        let now = Utc::now();
        if !is_currently_published(&existing, now) && is_currently_published(&item, now) {
            self.notifications.dispatch(ContentEvent::Published {
                actor: actor.clone(),
                item: item.clone(),
            });
        }
        Ok(item)
    }

    pub async fn delete(&self, actor: &Actor, target: ContentRef) -> Result<()> {
        self.require_owned(actor, target).await?;
        self.content.soft_delete(target).await?;
        info!(kind = %target.kind, item_id = %target.id, "content deleted");
        Ok(())
    }

    /// Single item with full body and metrics. Items the viewer may not see
    /// are reported as missing.
    pub async fn get(&self, viewer: &ViewerContext, target: ContentRef) -> Result<ContentItem> {
        let item = self.require(target).await?;
        self.reveal(viewer, item).await
    }

    pub async fn get_by_alias(
        &self,
        viewer: &ViewerContext,
        kind: ContentKind,
        area_alias: &str,
        alias: &str,
    ) -> Result<ContentItem> {
        let query = ContentQuery::new(kind).with_alias(area_alias, alias);
        let item = self
            .content
            .list(&query, Page::new(1, 0), ContentOrder::Newest)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::NotFound(format!("{} {}:{}", kind, area_alias, alias)))?;
        self.reveal(viewer, item).await
    }

    /// Toggles the actor's reaction on an item they can see. Only a newly
    /// created reaction notifies the author.
    pub async fn react(
        &self,
        actor: &Actor,
        viewer: &ViewerContext,
        target: ContentRef,
        symbol: &str,
        attitude: Attitude,
    ) -> Result<(bool, Reaction)> {
        let item = self.require(target).await?;
        if !self.viewable(viewer, &item) {
            return Err(AppError::NotFound(format!("{} {}", target.kind, target.id)));
        }

        let (created, reaction) = self
            .ledger
            .toggle(actor.id, target, symbol, attitude)
            .await?;

        if created {
            self.notifications.dispatch(ContentEvent::Reacted {
                actor: actor.clone(),
                item,
                symbol: reaction.symbol.clone(),
            });
        }
        Ok((created, reaction))
    }

    /// Returns whether the item is pinned afterwards.
    pub async fn toggle_pin(&self, actor: &Actor, target: ContentRef) -> Result<bool> {
        let item = self.require_owned(actor, target).await?;
        let pinned_at = match item.pinned_at {
            Some(_) => None,
            None => Some(Utc::now()),
        };
        self.content.set_pinned(target, pinned_at).await?;
        Ok(pinned_at.is_some())
    }

    /// Returns whether the item is locked afterwards.
    pub async fn toggle_lock(&self, actor: &Actor, target: ContentRef) -> Result<bool> {
        let item = self.require_owned(actor, target).await?;
        let locked_at = match item.locked_at {
            Some(_) => None,
            None => Some(Utc::now()),
        };
        self.content.set_locked(target, locked_at).await?;
        Ok(locked_at.is_some())
    }

    async fn require(&self, target: ContentRef) -> Result<ContentItem> {
        self.content
            .get(target)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("{} {}", target.kind, target.id)))
    }

    async fn require_owned(&self, actor: &Actor, target: ContentRef) -> Result<ContentItem> {
        let item = self.require(target).await?;
        if item.author_id != actor.id {
            return Err(AppError::Forbidden(format!(
                "only the author can modify {} {}",
                target.kind, target.id
            )));
        }
        Ok(item)
    }

    fn viewable(&self, viewer: &ViewerContext, item: &ContentItem) -> bool {
        if viewer.account_id == Some(item.author_id) {
            return true;
        }
        is_visible(item, viewer) && is_currently_published(item, Utc::now())
    }

    async fn reveal(&self, viewer: &ViewerContext, item: ContentItem) -> Result<ContentItem> {
        if !self.viewable(viewer, &item) {
            return Err(AppError::NotFound(format!("{} {}", item.kind, item.id)));
        }
        let kind = item.kind;
        let mut items = vec![item];
        self.ledger.attach_metrics(kind, &mut items).await?;
        items
            .pop()
            .ok_or_else(|| AppError::Internal("item vanished while attaching metrics".into()))
    }

    /// Validates the draft and resolves every reference into a writable row.
    async fn resolve(
        &self,
        actor: &Actor,
        draft: &ContentDraft,
        existing: Option<&ContentItem>,
    ) -> Result<NewContent> {
        let kind = draft.payload.kind();
        validate_payload(&draft.payload)?;
        let alias = normalize_alias(draft.alias.as_deref())?;

        if let (Some(at), Some(until)) = (draft.published_at, draft.published_until) {
            if until < at {
                return Err(AppError::ValidationError(
                    "published_until must not be earlier than published_at".to_string(),
                ));
            }
        }

        let realm = match draft.realm_alias.as_deref().map(str::trim) {
            Some(realm_alias) if !realm_alias.is_empty() => {
                let realm = self.realms.resolve(realm_alias).await?;
                self.realms.ensure_can_publish(&realm, actor.id).await?;
                Some(realm)
            }
            _ => None,
        };
        let area_alias = realm
            .as_ref()
            .map(|r| r.alias.clone())
            .unwrap_or_else(|| actor.name.clone());

        if let Some(alias) = &alias {
            if self
                .content
                .alias_taken(kind, &area_alias, alias, existing.map(|e| e.id))
                .await?
            {
                return Err(AppError::Conflict(format!(
                    "alias {}:{} is already taken",
                    area_alias, alias
                )));
            }
        }

        let category_aliases = normalize_labels(&draft.categories);
        let categories = self.taxonomy.find_categories(&category_aliases).await?;
        if let Some(missing) = category_aliases
            .iter()
            .find(|alias| !categories.iter().any(|c| &c.alias == *alias))
        {
            return Err(AppError::ValidationError(format!(
                "category {} does not exist",
                missing
            )));
        }
        let tags = self
            .taxonomy
            .get_or_create_tags(&normalize_labels(&draft.tags))
            .await?;

        let usage = format!("interactive.{}", kind);
        for attachment in draft.payload.attachments() {
            if !self.attachments.exists(attachment, &usage).await? {
                return Err(AppError::ValidationError(format!(
                    "attachment {} does not exist",
                    attachment
                )));
            }
        }

        Ok(NewContent {
            kind,
            author_id: existing.map(|e| e.author_id).unwrap_or(actor.id),
            realm_id: realm.map(|r| r.id),
            alias,
            area_alias: Some(area_alias),
            body: draft.payload.to_body()?,
            tag_ids: tags.iter().map(|t| t.id).collect(),
            category_ids: categories.iter().map(|c| c.id).collect(),
            reply_to_id: existing
                .map(|e| e.reply_to_id)
                .unwrap_or(draft.reply_to_id),
            repost_to_id: existing
                .map(|e| e.repost_to_id)
                .unwrap_or(draft.repost_to_id),
            visibility: draft.visibility,
            visible_account_ids: draft.visible_account_ids.clone(),
            invisible_account_ids: draft.invisible_account_ids.clone(),
            is_draft: draft.is_draft,
            published_at: draft.published_at,
            published_until: draft.published_until,
        })
    }
}

fn validate_payload(payload: &ContentPayload) -> Result<()> {
    match payload {
        ContentPayload::Post(body) => {
            if body.content.trim().is_empty() && body.attachments.is_empty() {
                return Err(AppError::ValidationError(
                    "post needs content or attachments".to_string(),
                ));
            }
        }
        ContentPayload::Article(body) => {
            if body.title.trim().is_empty() {
                return Err(AppError::ValidationError(
                    "article title is required".to_string(),
                ));
            }
        }
    }
    Ok(())
}

/// Empty aliases mean "no alias".
pub fn normalize_alias(raw: Option<&str>) -> Result<Option<String>> {
    let Some(alias) = raw.map(str::trim).filter(|a| !a.is_empty()) else {
        return Ok(None);
    };
    if alias.len() > MAX_ALIAS_LENGTH || !ALIAS_PATTERN.is_match(alias) {
        return Err(AppError::ValidationError(format!(
            "alias {} may only contain lowercase letters, digits, dots and dashes",
            alias
        )));
    }
    Ok(Some(alias.to_string()))
}

/// Trimmed, lowercased, de-duplicated, empty entries dropped.
fn normalize_labels(labels: &[String]) -> Vec<String> {
    labels
        .iter()
        .map(|l| l.trim().to_lowercase())
        .filter(|l| !l.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
