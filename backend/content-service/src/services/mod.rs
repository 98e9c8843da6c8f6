/// Business logic layer for content-service
///
/// - `visibility` / `publication`: the rules deciding who sees what, and when
/// - `feed`: multi-kind feed composition
/// - `posts`: content writes and single-item reads
/// - `reactions`: reaction toggling and aggregation
/// - `social` / `realms`: identity-provider backed context
/// - `subscriptions`: follow/unfollow of accounts, tags, categories and realms
pub mod feed;
pub mod posts;
pub mod publication;
pub mod reactions;
pub mod realms;
pub mod social;
pub mod subscriptions;
pub mod visibility;

pub use feed::{FeedComposer, FeedFilter, FeedMode, FeedOptions};
pub use posts::ContentService;
pub use reactions::ReactionLedger;
pub use realms::RealmDirectory;
pub use social::SocialContextLoader;
pub use subscriptions::SubscriptionService;
pub use visibility::{SocialContext, ViewerContext};
