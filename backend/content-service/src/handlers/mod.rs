/// HTTP handlers for content-service
///
/// - `feed`: merged feed, draft box and per-kind listings
/// - `posts`: create, read, edit, delete, react, pin and lock for every kind
/// - `subscriptions`: follow and unfollow accounts, tags, categories and realms
pub mod feed;
pub mod posts;
pub mod subscriptions;

use actix_web::web;

use crate::config::FeedConfig;
use crate::services::{
    ContentService, FeedComposer, RealmDirectory, SocialContextLoader, SubscriptionService,
};

/// Shared handler state, registered once as `web::Data<AppState>`.
pub struct AppState {
    pub feed: FeedComposer,
    pub content: ContentService,
    pub subscriptions: SubscriptionService,
    pub social: SocialContextLoader,
    pub realms: RealmDirectory,
    pub feed_config: FeedConfig,
}

/// Mounts every content route; the caller wraps the scope with middleware.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/feed", web::get().to(feed::get_feed))
        .route("/drafts", web::get().to(feed::get_drafts))
        .service(
            web::resource("/subscriptions/{target_type}/{target_id}")
                .route(web::get().to(subscriptions::get_subscription))
                .route(web::post().to(subscriptions::subscribe))
                .route(web::delete().to(subscriptions::unsubscribe)),
        )
        .route(
            "/subscriptions/{target_type}/{target_id}/all",
            web::delete().to(subscriptions::purge_target),
        )
        .service(
            web::resource("/{kind}")
                .route(web::get().to(feed::list_kind))
                .route(web::post().to(posts::create_content)),
        )
        .service(
            web::resource("/{kind}/{id}")
                .route(web::get().to(posts::get_content))
                .route(web::put().to(posts::edit_content))
                .route(web::delete().to(posts::delete_content)),
        )
        .route("/{kind}/{id}/react", web::post().to(posts::react))
        .route("/{kind}/{id}/pin", web::post().to(posts::toggle_pin))
        .route("/{kind}/{id}/lock", web::post().to(posts::toggle_lock))
        .route(
            "/{kind}/alias/{area}/{alias}",
            web::get().to(posts::get_content_by_alias),
        );
}
