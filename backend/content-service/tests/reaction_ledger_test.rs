//! Integration Tests: Reaction Ledger
//!
//! Coverage:
//! - Toggle semantics and vote counters
//! - Concurrent toggles from many accounts
//! - Reacting requires being able to see the item

mod common;

use chrono::Duration;
use common::{actor, item, Harness};
use content_service::db::ContentStore;
use content_service::models::{Attitude, ContentKind, VisibilityTier};
use content_service::AppError;
use futures::future::join_all;
use uuid::Uuid;

#[tokio::test]
async fn toggling_twice_restores_the_original_state() {
    let h = Harness::new();
    let post = item(ContentKind::Post, Uuid::new_v4(), Duration::minutes(1));
    let target = post.content_ref();
    h.store.put(post).await;
    let bob = actor("bob");
    let viewer = h.viewer(bob.id).await;

    let (created, reaction) = h
        .content
        .react(&bob, &viewer, target, "thumb_up", Attitude::Positive)
        .await
        .unwrap();
    assert!(created);
    assert_eq!(reaction.symbol, "thumb_up");
    let after_add = ContentStore::get(h.store.as_ref(), target)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(after_add.total_upvote, 1);

    let (created, _) = h
        .content
        .react(&bob, &viewer, target, "thumb_up", Attitude::Positive)
        .await
        .unwrap();
    assert!(!created);
    let after_remove = ContentStore::get(h.store.as_ref(), target)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(after_remove.total_upvote, 0);
    assert_eq!(h.store.reaction_count(target).await, 0);
}

#[tokio::test]
async fn neutral_reactions_leave_vote_counters_alone() {
    let h = Harness::new();
    let post = item(ContentKind::Article, Uuid::new_v4(), Duration::minutes(1));
    let target = post.content_ref();
    h.store.put(post).await;

    h.ledger
        .toggle(Uuid::new_v4(), target, "thinking", Attitude::Neutral)
        .await
        .unwrap();
    h.ledger
        .toggle(Uuid::new_v4(), target, "thumb_down", Attitude::Negative)
        .await
        .unwrap();

    let stored = ContentStore::get(h.store.as_ref(), target)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.total_upvote, 0);
    assert_eq!(stored.total_downvote, 1);

    let tally = h
        .ledger
        .tally(ContentKind::Article, &[target.id])
        .await
        .unwrap();
    assert_eq!(tally[&target.id].get("thinking"), Some(&1));
    assert_eq!(tally[&target.id].get("thumb_down"), Some(&1));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_toggles_from_many_accounts_are_all_counted() {
    let h = Harness::new();
    let post = item(ContentKind::Post, Uuid::new_v4(), Duration::minutes(1));
    let target = post.content_ref();
    h.store.put(post).await;

    let accounts: Vec<Uuid> = (0..32).map(|_| Uuid::new_v4()).collect();
    let handles = accounts.iter().map(|account| {
        let ledger = h.ledger.clone();
        let account = *account;
        tokio::spawn(async move {
            ledger
                .toggle(account, target, "heart", Attitude::Positive)
                .await
        })
    });

    for result in join_all(handles).await {
        let (created, _) = result.expect("toggle task panicked").unwrap();
        assert!(created);
    }

    let stored = ContentStore::get(h.store.as_ref(), target)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.total_upvote, 32);
    assert_eq!(h.store.reaction_count(target).await, 32);
}

#[tokio::test]
async fn same_account_racing_itself_ends_consistent() {
    let h = Harness::new();
    let post = item(ContentKind::Post, Uuid::new_v4(), Duration::minutes(1));
    let target = post.content_ref();
    h.store.put(post).await;
    let account = Uuid::new_v4();

    let toggles = (0..4).map(|_| {
        h.ledger
            .toggle(account, target, "heart", Attitude::Positive)
    });
    for result in join_all(toggles).await {
        result.unwrap();
    }

    // An even number of toggles always lands back on "no reaction".
    let stored = ContentStore::get(h.store.as_ref(), target)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.total_upvote, 0);
    assert_eq!(h.store.reaction_count(target).await, 0);
}

#[tokio::test]
async fn reacting_to_an_invisible_item_is_not_found() {
    let h = Harness::new();
    let mut private = item(ContentKind::Post, Uuid::new_v4(), Duration::minutes(1));
    private.visibility = VisibilityTier::None;
    let target = private.content_ref();
    h.store.put(private).await;
    let bob = actor("bob");

    let result = h
        .content
        .react(
            &bob,
            &h.viewer(bob.id).await,
            target,
            "heart",
            Attitude::Positive,
        )
        .await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
    assert_eq!(h.store.reaction_count(target).await, 0);
}

#[tokio::test]
async fn feed_items_carry_reaction_tallies() {
    let h = Harness::new();
    let post = item(ContentKind::Post, Uuid::new_v4(), Duration::minutes(1));
    let target = post.content_ref();
    h.store.put(post).await;
    for symbol in ["heart", "heart", "clap"] {
        h.ledger
            .toggle(Uuid::new_v4(), target, symbol, Attitude::Positive)
            .await
            .unwrap();
    }

    let viewer = h.viewer(Uuid::new_v4()).await;
    let fetched = h.content.get(&viewer, target).await.unwrap();
    let metric = fetched.metric.unwrap();
    assert_eq!(metric.reaction_count, 3);
    assert_eq!(metric.reaction_list.get("heart"), Some(&2));
    assert_eq!(metric.reaction_list.get("clap"), Some(&1));
    assert_eq!(fetched.total_upvote, 3);
}
