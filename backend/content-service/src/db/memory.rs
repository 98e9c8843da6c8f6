//! In-memory storage backend.
//!
//! Implements every storage trait over a single mutex-guarded state, which
//! makes each operation (including the reaction toggle) atomic. Used by the
//! test suites and for running the service without a database.

use super::{
    ChildRelation, ContentOrder, ContentQuery, ContentStore, Page, ReactionStore, RealmStore,
    SubscriptionStore, TaxonomyStore,
};
use crate::error::{AppError, Result};
use crate::models::{
    Attitude, Category, ContentItem, ContentKind, ContentRef, NewContent, Reaction,
    ReactionTally, Realm, Subscription, SubscriptionTarget, Tag,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
struct State {
    items: HashMap<ContentRef, ContentItem>,
    deleted: HashSet<ContentRef>,
    reactions: Vec<Reaction>,
    tags: Vec<Tag>,
    categories: Vec<Category>,
    subscriptions: Vec<Subscription>,
    realms: HashMap<Uuid, Realm>,
}

impl State {
    fn live(&self, target: &ContentRef) -> Option<&ContentItem> {
        if self.deleted.contains(target) {
            return None;
        }
        self.items.get(target)
    }

    fn live_mut(&mut self, target: &ContentRef) -> Result<&mut ContentItem> {
        if self.deleted.contains(target) {
            return Err(AppError::NotFound(format!("{} {}", target.kind, target.id)));
        }
        self.items
            .get_mut(target)
            .ok_or_else(|| AppError::NotFound(format!("{} {}", target.kind, target.id)))
    }

    fn resolve_tags(&self, ids: &[Uuid]) -> Vec<Tag> {
        self.tags
            .iter()
            .filter(|t| ids.contains(&t.id))
            .cloned()
            .collect()
    }

    fn resolve_categories(&self, ids: &[Uuid]) -> Vec<Category> {
        self.categories
            .iter()
            .filter(|c| ids.contains(&c.id))
            .cloned()
            .collect()
    }

    fn matching<'a>(&'a self, query: &'a ContentQuery) -> impl Iterator<Item = &'a ContentItem> {
        self.items
            .iter()
            .filter(move |(target, item)| !self.deleted.contains(*target) && query.matches(item))
            .map(|(_, item)| item)
    }
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a fully formed item as-is, timestamps and counters included.
    pub async fn put(&self, item: ContentItem) {
        let mut state = self.state.lock().await;
        state.items.insert(item.content_ref(), item);
    }

    pub async fn add_category(&self, alias: &str, name: &str) -> Category {
        let category = Category {
            id: Uuid::new_v4(),
            alias: alias.to_string(),
            name: name.to_string(),
            description: String::new(),
        };
        self.state.lock().await.categories.push(category.clone());
        category
    }

    pub async fn reaction_count(&self, target: ContentRef) -> usize {
        let state = self.state.lock().await;
        state.reactions.iter().filter(|r| r.target == target).count()
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn count(&self, query: &ContentQuery) -> Result<i64> {
        let state = self.state.lock().await;
        Ok(state.matching(query).count() as i64)
    }

    async fn list(
        &self,
        query: &ContentQuery,
        page: Page,
        order: ContentOrder,
    ) -> Result<Vec<ContentItem>> {
        let state = self.state.lock().await;
        let mut items: Vec<ContentItem> = state.matching(query).cloned().collect();
        order.sort(&mut items);
        Ok(items
            .into_iter()
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .collect())
    }

    async fn get(&self, target: ContentRef) -> Result<Option<ContentItem>> {
        let state = self.state.lock().await;
        Ok(state.live(&target).cloned())
    }

    async fn insert(&self, new: NewContent) -> Result<ContentItem> {
        let mut state = self.state.lock().await;
        let now = Utc::now();
        let item = ContentItem {
            id: Uuid::new_v4(),
            kind: new.kind,
            author_id: new.author_id,
            realm_id: new.realm_id,
            alias: new.alias,
            area_alias: new.area_alias,
            body: new.body,
            tags: state.resolve_tags(&new.tag_ids),
            categories: state.resolve_categories(&new.category_ids),
            reply_to_id: new.reply_to_id,
            repost_to_id: new.repost_to_id,
            visibility: new.visibility,
            visible_account_ids: new.visible_account_ids,
            invisible_account_ids: new.invisible_account_ids,
            is_draft: new.is_draft,
            published_at: new.published_at,
            published_until: new.published_until,
            edited_at: None,
            pinned_at: None,
            locked_at: None,
            total_upvote: 0,
            total_downvote: 0,
            created_at: now,
            updated_at: now,
            metric: None,
        };
        state.items.insert(item.content_ref(), item.clone());
        Ok(item)
    }

    async fn update(&self, target: ContentRef, new: NewContent) -> Result<ContentItem> {
        let mut state = self.state.lock().await;
        let tags = state.resolve_tags(&new.tag_ids);
        let categories = state.resolve_categories(&new.category_ids);
        let item = state.live_mut(&target)?;

        let now = Utc::now();
        item.realm_id = new.realm_id;
        item.alias = new.alias;
        item.area_alias = new.area_alias;
        item.body = new.body;
        item.tags = tags;
        item.categories = categories;
        item.visibility = new.visibility;
        item.visible_account_ids = new.visible_account_ids;
        item.invisible_account_ids = new.invisible_account_ids;
        item.is_draft = new.is_draft;
        item.published_at = new.published_at;
        item.published_until = new.published_until;
        item.edited_at = Some(now);
        item.updated_at = now;
        Ok(item.clone())
    }

    async fn soft_delete(&self, target: ContentRef) -> Result<()> {
        let mut state = self.state.lock().await;
        state.live_mut(&target)?;
        state.deleted.insert(target);
        Ok(())
    }

    async fn set_pinned(&self, target: ContentRef, at: Option<DateTime<Utc>>) -> Result<()> {
        let mut state = self.state.lock().await;
        state.live_mut(&target)?.pinned_at = at;
        Ok(())
    }

    async fn set_locked(&self, target: ContentRef, at: Option<DateTime<Utc>>) -> Result<()> {
        let mut state = self.state.lock().await;
        state.live_mut(&target)?.locked_at = at;
        Ok(())
    }

    async fn count_children(
        &self,
        kind: ContentKind,
        parent_ids: &[Uuid],
        relation: ChildRelation,
    ) -> Result<HashMap<Uuid, i64>> {
        let state = self.state.lock().await;
        let mut counts = HashMap::new();
        for (target, item) in &state.items {
            if target.kind != kind || state.deleted.contains(target) {
                continue;
            }
            let parent = match relation {
                ChildRelation::Reply => item.reply_to_id,
                ChildRelation::Repost => item.repost_to_id,
            };
            if let Some(parent) = parent.filter(|p| parent_ids.contains(p)) {
                *counts.entry(parent).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }

    async fn alias_taken(
        &self,
        kind: ContentKind,
        area_alias: &str,
        alias: &str,
        except: Option<Uuid>,
    ) -> Result<bool> {
        let state = self.state.lock().await;
        Ok(state.items.iter().any(|(target, item)| {
            target.kind == kind
                && !state.deleted.contains(target)
                && Some(item.id) != except
                && item.area_alias.as_deref() == Some(area_alias)
                && item.alias.as_deref() == Some(alias)
        }))
    }
}

#[async_trait]
impl TaxonomyStore for MemoryStore {
    async fn find_categories(&self, aliases: &[String]) -> Result<Vec<Category>> {
        let state = self.state.lock().await;
        Ok(state
            .categories
            .iter()
            .filter(|c| aliases.contains(&c.alias))
            .cloned()
            .collect())
    }

    async fn get_or_create_tags(&self, aliases: &[String]) -> Result<Vec<Tag>> {
        let mut state = self.state.lock().await;
        let mut tags = Vec::with_capacity(aliases.len());
        for alias in aliases {
            let tag = match state.tags.iter().find(|t| &t.alias == alias) {
                Some(tag) => tag.clone(),
                None => {
                    let tag = Tag {
                        id: Uuid::new_v4(),
                        alias: alias.clone(),
                        name: alias.clone(),
                        description: String::new(),
                    };
                    state.tags.push(tag.clone());
                    tag
                }
            };
            tags.push(tag);
        }
        Ok(tags)
    }
}

#[async_trait]
impl ReactionStore for MemoryStore {
    async fn toggle(
        &self,
        account_id: Uuid,
        target: ContentRef,
        symbol: &str,
        attitude: Attitude,
    ) -> Result<(bool, Reaction)> {
        let mut state = self.state.lock().await;
        state.live_mut(&target)?;

        let existing = state.reactions.iter().position(|r| {
            r.account_id == account_id
                && r.target == target
                && r.symbol == symbol
                && r.attitude == attitude
        });

        let (created, reaction, delta) = match existing {
            Some(index) => (false, state.reactions.remove(index), -1),
            None => {
                let reaction = Reaction {
                    id: Uuid::new_v4(),
                    symbol: symbol.to_string(),
                    attitude,
                    account_id,
                    target,
                    created_at: Utc::now(),
                };
                state.reactions.push(reaction.clone());
                (true, reaction, 1)
            }
        };

        let item = state.live_mut(&target)?;
        match attitude {
            Attitude::Positive => item.total_upvote = (item.total_upvote + delta).max(0),
            Attitude::Negative => item.total_downvote = (item.total_downvote + delta).max(0),
            Attitude::Neutral => {}
        }
        Ok((created, reaction))
    }

    async fn tally(&self, kind: ContentKind, ids: &[Uuid]) -> Result<ReactionTally> {
        let state = self.state.lock().await;
        let mut tally = ReactionTally::new();
        for reaction in &state.reactions {
            if reaction.target.kind == kind && ids.contains(&reaction.target.id) {
                *tally
                    .entry(reaction.target.id)
                    .or_default()
                    .entry(reaction.symbol.clone())
                    .or_insert(0) += 1;
            }
        }
        Ok(tally)
    }
}

#[async_trait]
impl SubscriptionStore for MemoryStore {
    async fn find(
        &self,
        follower_id: Uuid,
        target: SubscriptionTarget,
    ) -> Result<Option<Subscription>> {
        let state = self.state.lock().await;
        Ok(state
            .subscriptions
            .iter()
            .find(|s| s.follower_id == follower_id && s.target == target)
            .cloned())
    }

    async fn insert(&self, follower_id: Uuid, target: SubscriptionTarget) -> Result<Subscription> {
        let mut state = self.state.lock().await;
        if state
            .subscriptions
            .iter()
            .any(|s| s.follower_id == follower_id && s.target == target)
        {
            return Err(AppError::Conflict("subscription already exists".to_string()));
        }
        let subscription = Subscription {
            id: Uuid::new_v4(),
            follower_id,
            target,
            created_at: Utc::now(),
        };
        state.subscriptions.push(subscription.clone());
        Ok(subscription)
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let mut state = self.state.lock().await;
        let before = state.subscriptions.len();
        state.subscriptions.retain(|s| s.id != id);
        if state.subscriptions.len() == before {
            return Err(AppError::NotFound(format!("subscription {}", id)));
        }
        Ok(())
    }

    async fn followers_of(&self, targets: &[SubscriptionTarget]) -> Result<Vec<Uuid>> {
        let state = self.state.lock().await;
        let mut seen = HashSet::new();
        Ok(state
            .subscriptions
            .iter()
            .filter(|s| targets.contains(&s.target))
            .map(|s| s.follower_id)
            .filter(|id| seen.insert(*id))
            .collect())
    }

    async fn purge_target(&self, target: SubscriptionTarget) -> Result<u64> {
        let mut state = self.state.lock().await;
        let before = state.subscriptions.len();
        state.subscriptions.retain(|s| s.target != target);
        Ok((before - state.subscriptions.len()) as u64)
    }
}

#[async_trait]
impl RealmStore for MemoryStore {
    async fn upsert(&self, realm: Realm) -> Result<Realm> {
        let mut state = self.state.lock().await;
        state.realms.insert(realm.id, realm.clone());
        Ok(realm)
    }

    async fn get_by_alias(&self, alias: &str) -> Result<Option<Realm>> {
        let state = self.state.lock().await;
        Ok(state.realms.values().find(|r| r.alias == alias).cloned())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Realm>> {
        let state = self.state.lock().await;
        Ok(state.realms.get(&id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{sample_item, VisibilityTier};

    #[tokio::test]
    async fn toggle_twice_restores_counters() {
        let store = MemoryStore::new();
        let item = sample_item(ContentKind::Post, Uuid::new_v4());
        let target = item.content_ref();
        store.put(item).await;
        let account = Uuid::new_v4();

        let (created, _) = store
            .toggle(account, target, "thumb_up", Attitude::Positive)
            .await
            .unwrap();
        assert!(created);
        assert_eq!(ContentStore::get(&store, target).await.unwrap().unwrap().total_upvote, 1);

        let (created, _) = store
            .toggle(account, target, "thumb_up", Attitude::Positive)
            .await
            .unwrap();
        assert!(!created);
        assert_eq!(ContentStore::get(&store, target).await.unwrap().unwrap().total_upvote, 0);
        assert_eq!(store.reaction_count(target).await, 0);
    }

    #[tokio::test]
    async fn offset_beyond_results_is_empty() {
        let store = MemoryStore::new();
        store
            .put(sample_item(ContentKind::Post, Uuid::new_v4()))
            .await;
        let query = ContentQuery::new(ContentKind::Post);
        let page = store
            .list(&query, Page::new(10, 50), ContentOrder::Published)
            .await
            .unwrap();
        assert!(page.is_empty());
        assert_eq!(store.count(&query).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn soft_deleted_items_disappear() {
        let store = MemoryStore::new();
        let mut item = sample_item(ContentKind::Article, Uuid::new_v4());
        item.visibility = VisibilityTier::All;
        let target = item.content_ref();
        store.put(item).await;

        store.soft_delete(target).await.unwrap();
        assert!(ContentStore::get(&store, target).await.unwrap().is_none());
        assert_eq!(
            store
                .count(&ContentQuery::new(ContentKind::Article))
                .await
                .unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn tags_are_created_once() {
        let store = MemoryStore::new();
        let first = store
            .get_or_create_tags(&["rust".to_string()])
            .await
            .unwrap();
        let second = store
            .get_or_create_tags(&["rust".to_string(), "go".to_string()])
            .await
            .unwrap();
        assert_eq!(first[0].id, second[0].id);
        assert_eq!(second.len(), 2);
    }
}
