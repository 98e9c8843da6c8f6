//! Visibility evaluation.
//!
//! One rule set, two renderings: [`is_visible`] decides for a loaded item,
//! [`push_visibility_sql`] emits the same rule as a boolean SQL expression so
//! list endpoints can filter inside the database.

use crate::models::{ContentItem, VisibilityTier};
use serde::Serialize;
use sqlx::{Postgres, QueryBuilder};
use std::collections::HashSet;
use uuid::Uuid;

/// The viewer's relations as reported by the identity provider.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SocialContext {
    pub friends: HashSet<Uuid>,
    pub blocked: HashSet<Uuid>,
}

impl SocialContext {
    pub fn new(
        friends: impl IntoIterator<Item = Uuid>,
        blocked: impl IntoIterator<Item = Uuid>,
    ) -> Self {
        Self {
            friends: friends.into_iter().collect(),
            blocked: blocked.into_iter().collect(),
        }
    }

    /// Friend and not blocked; a block always wins.
    pub fn is_trusted(&self, account_id: &Uuid) -> bool {
        self.friends.contains(account_id) && !self.blocked.contains(account_id)
    }
}

/// Who is looking. `account_id == None` is an anonymous viewer.
#[derive(Debug, Clone, Default)]
pub struct ViewerContext {
    pub account_id: Option<Uuid>,
    pub social: SocialContext,
}

impl ViewerContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn new(account_id: Uuid, social: SocialContext) -> Self {
        Self {
            account_id: Some(account_id),
            social,
        }
    }

    pub fn is_anonymous(&self) -> bool {
        self.account_id.is_none()
    }
}

pub fn is_visible(item: &ContentItem, viewer: &ViewerContext) -> bool {
    let Some(viewer_id) = viewer.account_id else {
        return item.visibility == VisibilityTier::All;
    };

    if item.author_id == viewer_id {
        return true;
    }

    match item.visibility {
        VisibilityTier::None => false,
        VisibilityTier::FriendsOnly => viewer.social.is_trusted(&item.author_id),
        VisibilityTier::Selected => item.visible_account_ids.contains(&viewer_id),
        VisibilityTier::Filtered => !item.invisible_account_ids.contains(&viewer_id),
        VisibilityTier::All => true,
    }
}

/// Appends a parenthesized boolean expression over the unqualified content
/// columns (`author_id`, `visibility`, `visible_account_ids`,
/// `invisible_account_ids`).
pub fn push_visibility_sql(qb: &mut QueryBuilder<'_, Postgres>, viewer: &ViewerContext) {
    let Some(viewer_id) = viewer.account_id else {
        qb.push("(visibility = ")
            .push_bind(VisibilityTier::All.as_i16())
            .push(")");
        return;
    };

    let friends: Vec<Uuid> = viewer.social.friends.iter().copied().collect();
    let blocked: Vec<Uuid> = viewer.social.blocked.iter().copied().collect();

    qb.push("(author_id = ")
        .push_bind(viewer_id)
        .push(" OR visibility = ")
        .push_bind(VisibilityTier::All.as_i16())
        .push(" OR (visibility = ")
        .push_bind(VisibilityTier::FriendsOnly.as_i16())
        .push(" AND author_id = ANY(")
        .push_bind(friends)
        .push(") AND NOT (author_id = ANY(")
        .push_bind(blocked)
        .push(")))")
        .push(" OR (visibility = ")
        .push_bind(VisibilityTier::Selected.as_i16())
        .push(" AND ")
        .push_bind(viewer_id)
        .push(" = ANY(visible_account_ids))")
        .push(" OR (visibility = ")
        .push_bind(VisibilityTier::Filtered.as_i16())
        .push(" AND NOT (")
        .push_bind(viewer_id)
        .push(" = ANY(invisible_account_ids))))");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{sample_item, ContentKind};

    fn item(author: Uuid, visibility: VisibilityTier) -> ContentItem {
        let mut item = sample_item(ContentKind::Post, author);
        item.visibility = visibility;
        item
    }

    #[test]
    fn anonymous_sees_only_public_items() {
        let author = Uuid::new_v4();
        let viewer = ViewerContext::anonymous();
        assert!(is_visible(&item(author, VisibilityTier::All), &viewer));
        assert!(!is_visible(&item(author, VisibilityTier::Filtered), &viewer));
        assert!(!is_visible(&item(author, VisibilityTier::FriendsOnly), &viewer));
    }

    #[test]
    fn author_always_sees_own_item() {
        let author = Uuid::new_v4();
        let viewer = ViewerContext::new(author, SocialContext::default());
        assert!(is_visible(&item(author, VisibilityTier::None), &viewer));
        assert!(is_visible(&item(author, VisibilityTier::Selected), &viewer));
    }

    #[test]
    fn friends_only_block_wins_over_friendship() {
        let author = Uuid::new_v4();
        let viewer_id = Uuid::new_v4();
        let post = item(author, VisibilityTier::FriendsOnly);

        let friend = ViewerContext::new(viewer_id, SocialContext::new([author], []));
        assert!(is_visible(&post, &friend));

        let both = ViewerContext::new(viewer_id, SocialContext::new([author], [author]));
        assert!(!is_visible(&post, &both));

        let stranger = ViewerContext::new(viewer_id, SocialContext::default());
        assert!(!is_visible(&post, &stranger));
    }

    #[test]
    fn selected_uses_allow_list() {
        let author = Uuid::new_v4();
        let seven = Uuid::new_v4();
        let eight = Uuid::new_v4();
        let mut post = item(author, VisibilityTier::Selected);
        post.visible_account_ids = vec![seven];

        assert!(is_visible(&post, &ViewerContext::new(seven, SocialContext::default())));
        assert!(!is_visible(&post, &ViewerContext::new(eight, SocialContext::default())));
        assert!(is_visible(&post, &ViewerContext::new(author, SocialContext::default())));
    }

    #[test]
    fn filtered_uses_block_list() {
        let author = Uuid::new_v4();
        let hidden = Uuid::new_v4();
        let other = Uuid::new_v4();
        let mut post = item(author, VisibilityTier::Filtered);
        post.invisible_account_ids = vec![hidden];

        assert!(!is_visible(&post, &ViewerContext::new(hidden, SocialContext::default())));
        assert!(is_visible(&post, &ViewerContext::new(other, SocialContext::default())));
    }

    #[test]
    fn none_hides_from_everyone_but_author() {
        let author = Uuid::new_v4();
        let viewer = ViewerContext::new(Uuid::new_v4(), SocialContext::new([author], []));
        assert!(!is_visible(&item(author, VisibilityTier::None), &viewer));
    }

    // An item carrying both lists only consults the one its tier names; no
    // precedence between the lists is defined.
    #[test]
    fn mixed_lists_consult_only_the_tier_list() {
        let author = Uuid::new_v4();
        let viewer_id = Uuid::new_v4();
        let viewer = ViewerContext::new(viewer_id, SocialContext::default());

        let mut selected = item(author, VisibilityTier::Selected);
        selected.visible_account_ids = vec![viewer_id];
        selected.invisible_account_ids = vec![viewer_id];
        assert!(is_visible(&selected, &viewer));

        let mut filtered = item(author, VisibilityTier::Filtered);
        filtered.visible_account_ids = vec![viewer_id];
        filtered.invisible_account_ids = vec![viewer_id];
        assert!(!is_visible(&filtered, &viewer));
    }

    #[test]
    fn sql_form_for_anonymous_is_public_only() {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT 1 FROM posts WHERE ");
        push_visibility_sql(&mut qb, &ViewerContext::anonymous());
        assert_eq!(qb.sql(), "SELECT 1 FROM posts WHERE (visibility = $1)");
    }

    #[test]
    fn sql_form_covers_every_tier() {
        let mut qb = QueryBuilder::<Postgres>::new("");
        let viewer = ViewerContext::new(Uuid::new_v4(), SocialContext::default());
        push_visibility_sql(&mut qb, &viewer);
        let sql = qb.sql();
        assert!(sql.contains("author_id = $1"));
        assert!(sql.contains("NOT (author_id = ANY($5))"));
        assert!(sql.contains("= ANY(visible_account_ids)"));
        assert!(sql.contains("= ANY(invisible_account_ids)"));
        assert_eq!(sql.matches('(').count(), sql.matches(')').count());
    }
}
