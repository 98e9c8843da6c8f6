//! PostgreSQL repository tests
//!
//! Run against a disposable database:
//! `DATABASE_URL=postgres://... cargo test --test pg_repository_test -- --ignored`

use chrono::{Duration, Utc};
use content_service::db::{
    ChildRelation, ContentOrder, ContentQuery, ContentStore, Page, PgContentRepository,
    PgReactionRepository, PgSubscriptionRepository, PgTaxonomyRepository, ReactionStore,
    SubscriptionStore, TaxonomyStore, MIGRATOR,
};
use content_service::models::{
    Attitude, ContentKind, NewContent, SubscriptionTarget, VisibilityTier,
};
use content_service::services::{SocialContext, ViewerContext};
use content_service::AppError;
use futures::future::join_all;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

async fn create_test_pool() -> PgPool {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = PgPoolOptions::new()
        .max_connections(8)
        .connect(&url)
        .await
        .expect("Failed to create test pool");
    MIGRATOR.run(&pool).await.expect("Failed to run migrations");
    pool
}

fn new_content(kind: ContentKind, author_id: Uuid) -> NewContent {
    NewContent {
        kind,
        author_id,
        realm_id: None,
        alias: None,
        area_alias: Some(author_id.to_string()),
        body: serde_json::json!({ "content": "from postgres" }),
        tag_ids: vec![],
        category_ids: vec![],
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

#[tokio::test]
#[ignore] // Requires database setup
async fn insert_list_and_soft_delete() {
    let pool = create_test_pool().await;
    let repo = PgContentRepository::new(pool.clone());
    let taxonomy = PgTaxonomyRepository::new(pool);
    let author = Uuid::new_v4();

    let tag_alias = format!("tag-{}", Uuid::new_v4().simple());
    let tags = taxonomy
        .get_or_create_tags(&[tag_alias.clone()])
        .await
        .unwrap();

    let mut new = new_content(ContentKind::Article, author);
    new.tag_ids = tags.iter().map(|t| t.id).collect();
    let created = repo.insert(new).await.unwrap();
    assert_eq!(created.tags.len(), 1);

    let query = ContentQuery::new(ContentKind::Article)
        .by_author(author)
        .with_tag(tag_alias)
        .visible_to(ViewerContext::anonymous())
        .published(Utc::now());
    assert_eq!(repo.count(&query).await.unwrap(), 1);
    let listed = repo
        .list(&query, Page::default(), ContentOrder::Published)
        .await
        .unwrap();
    assert_eq!(listed[0].id, created.id);

    repo.soft_delete(created.content_ref()).await.unwrap();
    assert_eq!(repo.count(&query).await.unwrap(), 0);
    assert!(repo.get(created.content_ref()).await.unwrap().is_none());
}

#[tokio::test]
#[ignore] // Requires database setup
async fn visibility_and_draft_box_in_sql() {
    let pool = create_test_pool().await;
    let repo = PgContentRepository::new(pool);
    let author = Uuid::new_v4();
    let friend = Uuid::new_v4();

    let mut friends_only = new_content(ContentKind::Post, author);
    friends_only.visibility = VisibilityTier::FriendsOnly;
    let friends_only = repo.insert(friends_only).await.unwrap();

    let mut scheduled = new_content(ContentKind::Post, author);
    scheduled.published_at = Some(Utc::now() + Duration::hours(1));
    let scheduled = repo.insert(scheduled).await.unwrap();

    let now = Utc::now();
    let friend_view = ViewerContext::new(friend, SocialContext::new(vec![author], vec![]));
    let public_feed = ContentQuery::new(ContentKind::Post)
        .by_author(author)
        .visible_to(friend_view)
        .published(now);
    let ids: Vec<Uuid> = repo
        .list(&public_feed, Page::default(), ContentOrder::Published)
        .await
        .unwrap()
        .into_iter()
        .map(|i| i.id)
        .collect();
    assert_eq!(ids, vec![friends_only.id]);

    let blocked_view =
        ViewerContext::new(friend, SocialContext::new(vec![author], vec![author]));
    let blocked_feed = ContentQuery::new(ContentKind::Post)
        .by_author(author)
        .visible_to(blocked_view)
        .published(now);
    assert_eq!(repo.count(&blocked_feed).await.unwrap(), 0);

    let drafts = ContentQuery::new(ContentKind::Post).draft_box(author, now);
    let ids: Vec<Uuid> = repo
        .list(&drafts, Page::default(), ContentOrder::Newest)
        .await
        .unwrap()
        .into_iter()
        .map(|i| i.id)
        .collect();
    assert_eq!(ids, vec![scheduled.id]);
}

#[tokio::test]
#[ignore] // Requires database setup
async fn concurrent_toggles_keep_counters_consistent() {
    let pool = create_test_pool().await;
    let content = PgContentRepository::new(pool.clone());
    let reactions = Arc::new(PgReactionRepository::new(pool));

    let post = content
        .insert(new_content(ContentKind::Post, Uuid::new_v4()))
        .await
        .unwrap();
    let target = post.content_ref();

    let accounts: Vec<Uuid> = (0..16).map(|_| Uuid::new_v4()).collect();
    let toggles = accounts.iter().map(|account| {
        let reactions = reactions.clone();
        let account = *account;
        tokio::spawn(async move {
            reactions
                .toggle(account, target, "heart", Attitude::Positive)
                .await
        })
    });
    for result in join_all(toggles).await {
        assert!(result.unwrap().unwrap().0);
    }

    let stored = content.get(target).await.unwrap().unwrap();
    assert_eq!(stored.total_upvote, 16);
    let tally = reactions
        .tally(ContentKind::Post, &[target.id])
        .await
        .unwrap();
    assert_eq!(tally[&target.id]["heart"], 16);

    // Toggle one off again.
    let (created, _) = reactions
        .toggle(accounts[0], target, "heart", Attitude::Positive)
        .await
        .unwrap();
    assert!(!created);
    let stored = content.get(target).await.unwrap().unwrap();
    assert_eq!(stored.total_upvote, 15);
}

#[tokio::test]
#[ignore] // Requires database setup
async fn reply_counts_are_grouped() {
    let pool = create_test_pool().await;
    let repo = PgContentRepository::new(pool);
    let parent = repo
        .insert(new_content(ContentKind::Post, Uuid::new_v4()))
        .await
        .unwrap();
    for _ in 0..3 {
        let mut reply = new_content(ContentKind::Post, Uuid::new_v4());
        reply.reply_to_id = Some(parent.id);
        repo.insert(reply).await.unwrap();
    }

    let counts = repo
        .count_children(ContentKind::Post, &[parent.id], ChildRelation::Reply)
        .await
        .unwrap();
    assert_eq!(counts.get(&parent.id), Some(&3));
}

#[tokio::test]
#[ignore] // Requires database setup
async fn subscriptions_are_unique_and_purgeable() {
    let pool = create_test_pool().await;
    let store = PgSubscriptionRepository::new(pool);
    let follower = Uuid::new_v4();
    let target = SubscriptionTarget::Account(Uuid::new_v4());

    store.insert(follower, target).await.unwrap();
    assert!(matches!(
        store.insert(follower, target).await,
        Err(AppError::Conflict(_))
    ));
    store.insert(Uuid::new_v4(), target).await.unwrap();

    let followers = store.followers_of(&[target]).await.unwrap();
    assert_eq!(followers.len(), 2);
    assert_eq!(store.purge_target(target).await.unwrap(), 2);
    assert!(store.find(follower, target).await.unwrap().is_none());
}
