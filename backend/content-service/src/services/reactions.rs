use crate::db::{ChildRelation, ContentStore, ReactionStore};
use crate::error::{AppError, Result};
use crate::metrics::REACTION_TOGGLE_TOTAL;
use crate::models::{Attitude, ContentItem, ContentKind, ContentMetric, ContentRef, Reaction, ReactionTally};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

pub const MAX_SYMBOL_LENGTH: usize = 64;

/// Reaction toggling and batch aggregation.
#[derive(Clone)]
pub struct ReactionLedger {
    reactions: Arc<dyn ReactionStore>,
    content: Arc<dyn ContentStore>,
}

impl ReactionLedger {
    pub fn new(reactions: Arc<dyn ReactionStore>, content: Arc<dyn ContentStore>) -> Self {
        Self { reactions, content }
    }

    /// Adds the reaction if absent, removes it if present. Counter and row
    /// change together.
    pub async fn toggle(
        &self,
        account_id: Uuid,
        target: ContentRef,
        symbol: &str,
        attitude: Attitude,
    ) -> Result<(bool, Reaction)> {
        let symbol = symbol.trim();
        if symbol.is_empty() || symbol.chars().count() > MAX_SYMBOL_LENGTH {
            return Err(AppError::ValidationError(format!(
                "reaction symbol must be 1-{} characters",
                MAX_SYMBOL_LENGTH
            )));
        }

        match self
            .reactions
            .toggle(account_id, target, symbol, attitude)
            .await
        {
            Ok((created, reaction)) => {
                let result = if created { "created" } else { "removed" };
                REACTION_TOGGLE_TOTAL.with_label_values(&[result]).inc();
                debug!(
                    kind = %target.kind,
                    item_id = %target.id,
                    %account_id,
                    symbol,
                    result,
                    "reaction toggled"
                );
                Ok((created, reaction))
            }
            Err(err) => {
                REACTION_TOGGLE_TOTAL.with_label_values(&["error"]).inc();
                Err(err)
            }
        }
    }

    pub async fn tally(&self, kind: ContentKind, ids: &[Uuid]) -> Result<ReactionTally> {
        self.reactions.tally(kind, ids).await
    }

    /// Attaches reaction tallies plus reply and repost counts to every item,
    /// with one grouped query per aggregate.
    pub async fn attach_metrics(&self, kind: ContentKind, items: &mut [ContentItem]) -> Result<()> {
        if items.is_empty() {
            return Ok(());
        }
        let ids: Vec<Uuid> = items.iter().map(|i| i.id).collect();

        let (mut tally, mut replies, mut reposts) = tokio::try_join!(
            self.reactions.tally(kind, &ids),
            self.content
                .count_children(kind, &ids, ChildRelation::Reply),
            self.content
                .count_children(kind, &ids, ChildRelation::Repost),
        )?;

        for item in items.iter_mut() {
            let reaction_list = tally.remove(&item.id).unwrap_or_default();
            item.metric = Some(ContentMetric {
                reply_count: replies.remove(&item.id).unwrap_or(0),
                repost_count: reposts.remove(&item.id).unwrap_or(0),
                reaction_count: reaction_list.values().sum(),
                reaction_list,
            });
        }
        Ok(())
    }
}
