use actix_web::{web, App, HttpResponse, HttpServer};
use anyhow::Context;
use content_service::clients::{HttpAttachmentChecker, HttpIdentityClient, HttpNotificationSink};
use content_service::db::{
    PgContentRepository, PgReactionRepository, PgRealmRepository, PgSubscriptionRepository,
    PgTaxonomyRepository, MIGRATOR,
};
use content_service::handlers::{self, AppState};
use content_service::middleware::{GatewayIdentity, MetricsMiddleware};
use content_service::notifications::{NotificationDispatcher, NotificationFanout};
use content_service::services::{
    ContentService, FeedComposer, ReactionLedger, RealmDirectory, SocialContextLoader,
    SubscriptionService,
};
use content_service::Config;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

async fn health_summary(pool: web::Data<PgPool>) -> HttpResponse {
    match sqlx::query("SELECT 1").fetch_one(pool.get_ref()).await {
        Ok(_) => HttpResponse::Ok().json(serde_json::json!({
            "status": "ok",
            "service": "content-service",
            "version": env!("CARGO_PKG_VERSION")
        })),
        Err(e) => HttpResponse::ServiceUnavailable().json(serde_json::json!({
            "status": "unhealthy",
            "error": format!("PostgreSQL connection failed: {}", e),
            "service": "content-service"
        })),
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = terminate.recv() => {},
                }
            }
            Err(e) => {
                tracing::warn!("SIGTERM handler unavailable ({}), waiting for Ctrl+C", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,actix_web=info,sqlx=warn".into());
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

/// Content Service
///
/// Serves visibility-aware feeds of posts and articles, reactions and
/// subscriptions.
///
/// # Routes
///
/// - `/api/v1/feed`, `/api/v1/drafts` - merged feeds
/// - `/api/v1/{posts|articles}/*` - per-kind listing, CRUD, react, pin, lock
/// - `/api/v1/subscriptions/*` - follow accounts, tags, categories and realms
/// - `/api/v1/health`, `/metrics`
#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!("Configuration loading failed: {}", e);
            eprintln!("ERROR: Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    tracing::info!("Starting content-service v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Environment: {}", config.app.env);
    tracing::debug!(database = ?config.database, "database configuration");

    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&config.database.url)
        .await
        .context("failed to connect to PostgreSQL")?;
    MIGRATOR
        .run(&pool)
        .await
        .context("failed to run database migrations")?;
    tracing::info!("Database ready");

    let identity = Arc::new(
        HttpIdentityClient::new(&config.identity).context("failed to build identity client")?,
    );
    let notifier = Arc::new(
        HttpNotificationSink::new(&config.notifier).context("failed to build notifier client")?,
    );
    let attachments = Arc::new(
        HttpAttachmentChecker::new(&config.attachments)
            .context("failed to build attachment client")?,
    );

    let content_store = Arc::new(PgContentRepository::new(pool.clone()));
    let reaction_store = Arc::new(PgReactionRepository::new(pool.clone()));
    let subscription_store = Arc::new(PgSubscriptionRepository::new(pool.clone()));
    let taxonomy_store = Arc::new(PgTaxonomyRepository::new(pool.clone()));
    let realm_store = Arc::new(PgRealmRepository::new(pool.clone()));

    let (dispatcher, notification_worker) = NotificationDispatcher::spawn(NotificationFanout::new(
        notifier,
        subscription_store.clone(),
        config.feed.notification_preview_length,
    ));

    let ledger = ReactionLedger::new(reaction_store, content_store.clone());
    let realms = RealmDirectory::new(identity.clone(), realm_store, config.identity.timeout());
    let state = web::Data::new(AppState {
        feed: FeedComposer::new(
            content_store.clone(),
            ledger.clone(),
            config.feed.truncate_threshold,
        ),
        content: ContentService::new(
            content_store,
            taxonomy_store,
            ledger,
            realms.clone(),
            attachments,
            dispatcher,
        ),
        subscriptions: SubscriptionService::new(subscription_store),
        social: SocialContextLoader::new(identity, config.identity.timeout()),
        realms,
        feed_config: config.feed.clone(),
    });
    let pool_data = web::Data::new(pool);

    let bind_address = format!("{}:{}", config.app.host, config.app.port);
    tracing::info!("Starting HTTP server at {}", bind_address);

    let server = HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .app_data(pool_data.clone())
            .wrap(tracing_actix_web::TracingLogger::default())
            .route(
                "/metrics",
                web::get().to(content_service::metrics::serve_metrics),
            )
            .route("/api/v1/health", web::get().to(health_summary))
            .service(
                web::scope("/api/v1")
                    .wrap(GatewayIdentity)
                    .wrap(MetricsMiddleware)
                    .configure(handlers::configure),
            )
    })
    .bind(&bind_address)
    .with_context(|| format!("failed to bind {}", bind_address))?
    .run();

    let server_handle = server.handle();
    let server_task = tokio::spawn(server);

    shutdown_signal().await;
    tracing::info!("Shutdown signal received");
    server_handle.stop(true).await;

    server_task
        .await
        .context("HTTP server task panicked")?
        .context("HTTP server failed")?;

    // The server's app factories own the last dispatcher clones; once they
    // are gone the worker drains its queue and exits.
    if tokio::time::timeout(Duration::from_secs(10), notification_worker)
        .await
        .is_err()
    {
        tracing::warn!("Notification worker did not drain within 10s");
    }

    tracing::info!("Content-service shutting down");
    Ok(())
}
