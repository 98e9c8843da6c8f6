//! Publication window rules.
//!
//! An item is public only when it is not a draft, its `published_at` is not in
//! the future and its `published_until` has not passed. The draft box is the
//! complement, restricted to the author's own items.

use crate::models::ContentItem;
use chrono::{DateTime, Utc};
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

pub fn is_currently_published(item: &ContentItem, now: DateTime<Utc>) -> bool {
    if item.is_draft {
        return false;
    }
    if matches!(item.published_at, Some(at) if at > now) {
        return false;
    }
    if matches!(item.published_until, Some(until) if until <= now) {
        return false;
    }
    true
}

/// Author's own items that are not currently public: drafts, scheduled
/// items and expired items.
pub fn in_draft_box(item: &ContentItem, author_id: Uuid, now: DateTime<Utc>) -> bool {
    item.author_id == author_id && !is_currently_published(item, now)
}

pub fn push_published_sql(qb: &mut QueryBuilder<'_, Postgres>, now: DateTime<Utc>) {
    qb.push("(is_draft = FALSE AND (published_at IS NULL OR published_at <= ")
        .push_bind(now)
        .push(") AND (published_until IS NULL OR published_until > ")
        .push_bind(now)
        .push("))");
}

pub fn push_draft_box_sql(
    qb: &mut QueryBuilder<'_, Postgres>,
    author_id: Uuid,
    now: DateTime<Utc>,
) {
    qb.push("(author_id = ")
        .push_bind(author_id)
        .push(" AND (is_draft = TRUE OR published_at > ")
        .push_bind(now)
        .push(" OR published_until <= ")
        .push_bind(now)
        .push("))");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{sample_item, ContentKind};
    use chrono::Duration;

    fn item(author: Uuid) -> ContentItem {
        sample_item(ContentKind::Article, author)
    }

    #[test]
    fn unscheduled_item_is_published() {
        assert!(is_currently_published(&item(Uuid::new_v4()), Utc::now()));
    }

    #[test]
    fn draft_is_never_published() {
        let mut draft = item(Uuid::new_v4());
        draft.is_draft = true;
        assert!(!is_currently_published(&draft, Utc::now()));
    }

    #[test]
    fn window_bounds_are_respected() {
        let now = Utc::now();
        let mut scheduled = item(Uuid::new_v4());
        scheduled.published_at = Some(now + Duration::hours(1));
        assert!(!is_currently_published(&scheduled, now));

        let mut expired = item(Uuid::new_v4());
        expired.published_until = Some(now);
        assert!(!is_currently_published(&expired, now));

        let mut live = item(Uuid::new_v4());
        live.published_at = Some(now - Duration::hours(1));
        live.published_until = Some(now + Duration::hours(1));
        assert!(is_currently_published(&live, now));
    }

    #[test]
    fn draft_box_holds_only_own_unpublished_items() {
        let now = Utc::now();
        let author = Uuid::new_v4();
        let mut scheduled = item(author);
        scheduled.published_at = Some(now + Duration::hours(1));

        assert!(in_draft_box(&scheduled, author, now));
        assert!(!in_draft_box(&scheduled, Uuid::new_v4(), now));
        assert!(!in_draft_box(&item(author), author, now));
    }
}
