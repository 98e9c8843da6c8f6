//! Shared fixtures for the integration tests: every service wired over one
//! `MemoryStore` with stub collaborators.
#![allow(dead_code)]

pub mod stubs;

use chrono::{DateTime, Duration, Utc};
use content_service::db::MemoryStore;
use content_service::models::{
    Actor, ArticleBody, ContentDraft, ContentItem, ContentKind, ContentPayload, PostBody,
    VisibilityTier,
};
use content_service::notifications::{NotificationDispatcher, NotificationFanout};
use content_service::services::{
    ContentService, FeedComposer, ReactionLedger, RealmDirectory, SocialContextLoader,
    SubscriptionService, ViewerContext,
};
use std::sync::Arc;
use stubs::{Delivery, RecordingSink, StubAttachments, StubIdentity};
use tokio::task::JoinHandle;
use uuid::Uuid;

pub const TRUNCATE_THRESHOLD: usize = 160;
pub const PREVIEW_LENGTH: usize = 80;

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub identity: Arc<StubIdentity>,
    pub sink: Arc<RecordingSink>,
    pub attachments: Arc<StubAttachments>,
    pub ledger: ReactionLedger,
    pub feed: FeedComposer,
    pub content: ContentService,
    pub subscriptions: SubscriptionService,
    pub social: SocialContextLoader,
    worker: JoinHandle<()>,
}

impl Harness {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let identity = Arc::new(StubIdentity::default());
        let sink = Arc::new(RecordingSink::default());
        let attachments = Arc::new(StubAttachments::default());
        let timeout = std::time::Duration::from_secs(1);

        let (dispatcher, worker) = NotificationDispatcher::spawn(NotificationFanout::new(
            sink.clone(),
            store.clone(),
            PREVIEW_LENGTH,
        ));
        let ledger = ReactionLedger::new(store.clone(), store.clone());
        let realms = RealmDirectory::new(identity.clone(), store.clone(), timeout);

        Self {
            feed: FeedComposer::new(store.clone(), ledger.clone(), TRUNCATE_THRESHOLD),
            content: ContentService::new(
                store.clone(),
                store.clone(),
                ledger.clone(),
                realms,
                attachments.clone(),
                dispatcher,
            ),
            subscriptions: SubscriptionService::new(store.clone()),
            social: SocialContextLoader::new(identity.clone(), timeout),
            ledger,
            store,
            identity,
            sink,
            attachments,
            worker,
        }
    }

    /// Viewer context as a request handler would build it.
    pub async fn viewer(&self, account_id: Uuid) -> ViewerContext {
        self.social.load(Some(account_id)).await
    }

    /// Drops the dispatcher, waits for the worker to drain its queue and
    /// returns everything delivered.
    pub async fn finish(self) -> Vec<Delivery> {
        let Harness {
            content,
            worker,
            sink,
            ..
        } = self;
        drop(content);
        worker.await.expect("notification worker panicked");
        sink.deliveries()
    }
}

pub fn actor(name: &str) -> Actor {
    Actor {
        id: Uuid::new_v4(),
        name: name.to_string(),
        nick: capitalized(name),
    }
}

fn capitalized(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

pub fn post_draft(content: &str) -> ContentDraft {
    draft(ContentPayload::Post(PostBody {
        content: content.to_string(),
        attachments: vec![],
    }))
}

pub fn article_draft(title: &str, content: &str) -> ContentDraft {
    draft(ContentPayload::Article(ArticleBody {
        title: title.to_string(),
        description: String::new(),
        content: content.to_string(),
        attachments: vec![],
    }))
}

fn draft(payload: ContentPayload) -> ContentDraft {
    ContentDraft {
        payload,
        alias: None,
        realm_alias: None,
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
    }
}

/// Public, published item created `age` ago.
pub fn item(kind: ContentKind, author_id: Uuid, age: Duration) -> ContentItem {
    let created_at: DateTime<Utc> = Utc::now() - age;
    let body = match kind {
        ContentKind::Post => serde_json::json!({ "content": "hello", "attachments": [] }),
        ContentKind::Article => serde_json::json!({
            "title": "Title",
            "description": "",
            "content": "hello",
            "attachments": []
        }),
    };
    ContentItem {
        id: Uuid::new_v4(),
        kind,
        author_id,
        realm_id: None,
        alias: None,
        area_alias: None,
        body,
        tags: vec![],
        categories: vec![],
        reply_to_id: None,
        repost_to_id: None,
        visibility: VisibilityTier::All,
        visible_account_ids: vec![],
        invisible_account_ids: vec![],
        is_draft: false,
        published_at: Some(created_at),
        published_until: None,
        edited_at: None,
        pinned_at: None,
        locked_at: None,
        total_upvote: 0,
        total_downvote: 0,
        created_at,
        updated_at: created_at,
        metric: None,
    }
}
