use actix_web::{web, HttpResponse};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::handlers::AppState;
use crate::middleware::AuthenticatedActor;
use crate::models::SubscriptionTarget;

fn parse_target(target_type: &str, target_id: Uuid) -> Result<SubscriptionTarget> {
    match target_type {
        "account" | "accounts" => Ok(SubscriptionTarget::Account(target_id)),
        "tag" | "tags" => Ok(SubscriptionTarget::Tag(target_id)),
        "category" | "categories" => Ok(SubscriptionTarget::Category(target_id)),
        "realm" | "realms" => Ok(SubscriptionTarget::Realm(target_id)),
        other => Err(AppError::ValidationError(format!(
            "unknown subscription target: {}",
            other
        ))),
    }
}

pub async fn get_subscription(
    path: web::Path<(String, Uuid)>,
    actor: AuthenticatedActor,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let (target_type, target_id) = path.into_inner();
    let target = parse_target(&target_type, target_id)?;
    let subscription = state.subscriptions.get(actor.0.id, target).await?;
    Ok(HttpResponse::Ok().json(subscription))
}

pub async fn subscribe(
    path: web::Path<(String, Uuid)>,
    actor: AuthenticatedActor,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let (target_type, target_id) = path.into_inner();
    let target = parse_target(&target_type, target_id)?;
    let subscription = state.subscriptions.subscribe(actor.0.id, target).await?;
    Ok(HttpResponse::Created().json(subscription))
}

pub async fn unsubscribe(
    path: web::Path<(String, Uuid)>,
    actor: AuthenticatedActor,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let (target_type, target_id) = path.into_inner();
    let target = parse_target(&target_type, target_id)?;
    state.subscriptions.unsubscribe(actor.0.id, target).await?;
    Ok(HttpResponse::NoContent().finish())
}

#[derive(Debug, Serialize)]
pub struct PurgeResponse {
    pub removed: u64,
}

/// Removes every subscription to a target that has gone away. Called by the
/// owning service once the account, tag, category or realm is deleted.
pub async fn purge_target(
    path: web::Path<(String, Uuid)>,
    _actor: AuthenticatedActor,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let (target_type, target_id) = path.into_inner();
    let target = parse_target(&target_type, target_id)?;
    let removed = state.subscriptions.purge_target(target).await?;
    Ok(HttpResponse::Ok().json(PurgeResponse { removed }))
}
