use crate::error::AppError;
use crate::models::ContentRef;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Sentiment of a reaction. Only non-neutral attitudes move vote counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Attitude {
    #[default]
    Neutral,
    Positive,
    Negative,
}

impl Attitude {
    pub fn as_i16(&self) -> i16 {
        match self {
            Attitude::Neutral => 0,
            Attitude::Positive => 1,
            Attitude::Negative => 2,
        }
    }

    /// Column on the content tables this attitude counts into.
    pub fn counter_column(&self) -> Option<&'static str> {
        match self {
            Attitude::Neutral => None,
            Attitude::Positive => Some("total_upvote"),
            Attitude::Negative => Some("total_downvote"),
        }
    }
}

impl TryFrom<i16> for Attitude {
    type Error = AppError;
    fn try_from(v: i16) -> std::result::Result<Self, Self::Error> {
        match v {
            0 => Ok(Attitude::Neutral),
            1 => Ok(Attitude::Positive),
            2 => Ok(Attitude::Negative),
            other => Err(AppError::ValidationError(format!(
                "invalid attitude: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reaction {
    pub id: Uuid,
    pub symbol: String,
    pub attitude: Attitude,
    pub account_id: Uuid,
    pub target: ContentRef,
    pub created_at: DateTime<Utc>,
}

/// Per-item, per-symbol reaction counts.
pub type ReactionTally = HashMap<Uuid, HashMap<String, i64>>;
