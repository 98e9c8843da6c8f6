/// Content handlers - HTTP endpoints shared by every content kind
use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::handlers::AppState;
use crate::middleware::{AuthenticatedActor, ViewerId};
use crate::models::{Attitude, ContentDraft, ContentKind, ContentRef};

fn content_ref(kind: &str, id: Uuid) -> Result<ContentRef> {
    Ok(ContentRef::new(ContentKind::try_from(kind)?, id))
}

/// Create a new item; the payload kind must match the path.
pub async fn create_content(
    path: web::Path<String>,
    actor: AuthenticatedActor,
    state: web::Data<AppState>,
    req: web::Json<ContentDraft>,
) -> Result<HttpResponse> {
    let kind = ContentKind::try_from(path.as_str())?;
    let draft = req.into_inner();
    if draft.payload.kind() != kind {
        return Err(AppError::ValidationError(format!(
            "expected a {} payload",
            kind
        )));
    }

    let item = state.content.create(&actor.0, draft).await?;
    Ok(HttpResponse::Created().json(item))
}

/// Get an item by id
pub async fn get_content(
    path: web::Path<(String, Uuid)>,
    viewer: ViewerId,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let (kind, id) = path.into_inner();
    let target = content_ref(&kind, id)?;
    let context = state.social.load(viewer.0).await;
    let item = state.content.get(&context, target).await?;
    Ok(HttpResponse::Ok().json(item))
}

/// Get an item by `area:alias`
pub async fn get_content_by_alias(
    path: web::Path<(String, String, String)>,
    viewer: ViewerId,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let (kind, area, alias) = path.into_inner();
    let kind = ContentKind::try_from(kind.as_str())?;
    let context = state.social.load(viewer.0).await;
    let item = state
        .content
        .get_by_alias(&context, kind, &area, &alias)
        .await?;
    Ok(HttpResponse::Ok().json(item))
}

pub async fn edit_content(
    path: web::Path<(String, Uuid)>,
    actor: AuthenticatedActor,
    state: web::Data<AppState>,
    req: web::Json<ContentDraft>,
) -> Result<HttpResponse> {
    let (kind, id) = path.into_inner();
    let target = content_ref(&kind, id)?;
    let item = state.content.edit(&actor.0, target, req.into_inner()).await?;
    Ok(HttpResponse::Ok().json(item))
}

pub async fn delete_content(
    path: web::Path<(String, Uuid)>,
    actor: AuthenticatedActor,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let (kind, id) = path.into_inner();
    state
        .content
        .delete(&actor.0, content_ref(&kind, id)?)
        .await?;
    Ok(HttpResponse::NoContent().finish())
}

#[derive(Debug, Deserialize)]
pub struct ReactRequest {
    pub symbol: String,
    #[serde(default)]
    pub attitude: Attitude,
}

#[derive(Debug, Serialize)]
pub struct ToggleResponse {
    pub active: bool,
}

/// Toggle a reaction. 201 when it was added, 204 when it was removed.
pub async fn react(
    path: web::Path<(String, Uuid)>,
    actor: AuthenticatedActor,
    state: web::Data<AppState>,
    req: web::Json<ReactRequest>,
) -> Result<HttpResponse> {
    let (kind, id) = path.into_inner();
    let target = content_ref(&kind, id)?;
    let context = state.social.load(Some(actor.0.id)).await;

    let (created, reaction) = state
        .content
        .react(&actor.0, &context, target, &req.symbol, req.attitude)
        .await?;

    if created {
        Ok(HttpResponse::Created().json(reaction))
    } else {
        Ok(HttpResponse::NoContent().finish())
    }
}

pub async fn toggle_pin(
    path: web::Path<(String, Uuid)>,
    actor: AuthenticatedActor,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let (kind, id) = path.into_inner();
    let active = state
        .content
        .toggle_pin(&actor.0, content_ref(&kind, id)?)
        .await?;
    Ok(HttpResponse::Ok().json(ToggleResponse { active }))
}

pub async fn toggle_lock(
    path: web::Path<(String, Uuid)>,
    actor: AuthenticatedActor,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let (kind, id) = path.into_inner();
    let active = state
        .content
        .toggle_lock(&actor.0, content_ref(&kind, id)?)
        .await?;
    Ok(HttpResponse::Ok().json(ToggleResponse { active }))
}
