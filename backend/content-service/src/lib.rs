/// Content Service Library
///
/// Composes visibility-aware feeds over several content kinds (posts and
/// articles), aggregates reactions, and fans out notifications to authors and
/// subscribers.
///
/// # Modules
///
/// - `handlers`: HTTP request handlers
/// - `models`: Content items, reactions, subscriptions, realms, feed records
/// - `services`: Visibility and publication rules, feed composition, writes
/// - `db`: Storage traits with PostgreSQL and in-memory implementations
/// - `clients`: Identity provider, notifier and attachment HTTP clients
/// - `notifications`: Background notification fan-out
/// - `middleware`: Gateway identity extraction and request metrics
/// - `error`: Error types and handling
/// - `config`: Configuration management
/// - `metrics`: Observability and metrics collection
pub mod clients;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod notifications;
pub mod services;

pub use config::Config;
pub use error::{AppError, Result};
