use crate::error::AppError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What a follower is subscribed to. Exactly one target per subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum SubscriptionTarget {
    Account(Uuid),
    Tag(Uuid),
    Category(Uuid),
    Realm(Uuid),
}

impl SubscriptionTarget {
    pub fn column(&self) -> &'static str {
        match self {
            SubscriptionTarget::Account(_) => "account_id",
            SubscriptionTarget::Tag(_) => "tag_id",
            SubscriptionTarget::Category(_) => "category_id",
            SubscriptionTarget::Realm(_) => "realm_id",
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            SubscriptionTarget::Account(id)
            | SubscriptionTarget::Tag(id)
            | SubscriptionTarget::Category(id)
            | SubscriptionTarget::Realm(id) => *id,
        }
    }

    /// Rebuilds a target from the four nullable storage columns.
    pub fn from_columns(
        account_id: Option<Uuid>,
        tag_id: Option<Uuid>,
        category_id: Option<Uuid>,
        realm_id: Option<Uuid>,
    ) -> Result<Self, AppError> {
        match (account_id, tag_id, category_id, realm_id) {
            (Some(id), None, None, None) => Ok(SubscriptionTarget::Account(id)),
            (None, Some(id), None, None) => Ok(SubscriptionTarget::Tag(id)),
            (None, None, Some(id), None) => Ok(SubscriptionTarget::Category(id)),
            (None, None, None, Some(id)) => Ok(SubscriptionTarget::Realm(id)),
            _ => Err(AppError::Internal(
                "subscription row must reference exactly one target".to_string(),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: Uuid,
    pub follower_id: Uuid,
    pub target: SubscriptionTarget,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exactly_one_target_is_required() {
        let id = Uuid::new_v4();
        assert_eq!(
            SubscriptionTarget::from_columns(None, Some(id), None, None).unwrap(),
            SubscriptionTarget::Tag(id)
        );
        assert!(SubscriptionTarget::from_columns(None, None, None, None).is_err());
        assert!(SubscriptionTarget::from_columns(Some(id), Some(id), None, None).is_err());
    }
}
