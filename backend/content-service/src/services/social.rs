use crate::clients::{with_timeout, IdentityProvider};
use crate::metrics::SOCIAL_CONTEXT_DEGRADED_TOTAL;
use crate::services::visibility::{SocialContext, ViewerContext};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;
use uuid::Uuid;

/// Builds the per-request [`ViewerContext`] from the identity provider.
#[derive(Clone)]
pub struct SocialContextLoader {
    identity: Arc<dyn IdentityProvider>,
    timeout: Duration,
}

impl SocialContextLoader {
    pub fn new(identity: Arc<dyn IdentityProvider>, timeout: Duration) -> Self {
        Self { identity, timeout }
    }

    /// Friends and blocks are fetched concurrently under one deadline. Any
    /// failure serves the viewer as anonymous.
    pub async fn load(&self, viewer_id: Option<Uuid>) -> ViewerContext {
        let Some(account_id) = viewer_id else {
            return ViewerContext::anonymous();
        };

        let identity = &self.identity;
        let fetched = with_timeout(self.timeout, async {
            tokio::try_join!(
                identity.list_friends(account_id),
                identity.list_blocked(account_id)
            )
        })
        .await;

        match fetched {
            Ok((friends, blocked)) => {
                ViewerContext::new(account_id, SocialContext::new(friends, blocked))
            }
            Err(err) => {
                warn!(
                    %account_id,
                    error = %err,
                    "social context unavailable, serving viewer as anonymous"
                );
                SOCIAL_CONTEXT_DEGRADED_TOTAL.inc();
                ViewerContext::anonymous()
            }
        }
    }
}
