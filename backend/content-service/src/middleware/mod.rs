/// HTTP middleware utilities for content-service
///
/// Authentication happens at the gateway, which forwards the caller as
/// `x-user-id`, `x-user-name` and `x-user-nick`. [`GatewayIdentity`] turns
/// those headers into an [`Actor`] in the request extensions; handlers pick it
/// up through [`AuthenticatedActor`] (required) or [`ViewerId`] (optional).
use actix_web::dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::{Error, FromRequest, HttpMessage, HttpRequest};
use futures::future::LocalBoxFuture;
use std::future::{ready, Ready};
use std::rc::Rc;
use std::time::Instant;
use uuid::Uuid;

use crate::error::AppError;
use crate::metrics::HTTP_REQUEST_DURATION_SECONDS;
use crate::models::Actor;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_NAME_HEADER: &str = "x-user-name";
pub const USER_NICK_HEADER: &str = "x-user-nick";

// =====================================================================
// Gateway identity
// =====================================================================

/// Reads the forwarded caller headers. Anonymous requests pass through; a
/// malformed id is rejected.
pub struct GatewayIdentity;

impl<S, B> Transform<S, ServiceRequest> for GatewayIdentity
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = GatewayIdentityService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(GatewayIdentityService {
            service: Rc::new(service),
        }))
    }
}

pub struct GatewayIdentityService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for GatewayIdentityService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();

        Box::pin(async move {
            if let Some(actor) = actor_from_headers(req.request())? {
                req.extensions_mut().insert(actor);
            }
            service.call(req).await
        })
    }
}

fn header<'a>(req: &'a HttpRequest, name: &str) -> Option<&'a str> {
    req.headers()
        .get(name)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// `None` when no id header is present. Name and nick fall back to the id.
pub fn actor_from_headers(req: &HttpRequest) -> Result<Option<Actor>, AppError> {
    let Some(raw_id) = header(req, USER_ID_HEADER) else {
        return Ok(None);
    };
    let id = Uuid::parse_str(raw_id)
        .map_err(|_| AppError::Unauthorized(format!("invalid {} header", USER_ID_HEADER)))?;
    let name = header(req, USER_NAME_HEADER)
        .map(str::to_string)
        .unwrap_or_else(|| id.to_string());
    let nick = header(req, USER_NICK_HEADER)
        .map(str::to_string)
        .unwrap_or_else(|| name.clone());
    Ok(Some(Actor { id, name, nick }))
}

/// The signed-in caller; rejects anonymous requests.
#[derive(Debug, Clone)]
pub struct AuthenticatedActor(pub Actor);

impl FromRequest for AuthenticatedActor {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut actix_web::dev::Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<Actor>()
                .cloned()
                .map(AuthenticatedActor)
                .ok_or_else(|| AppError::Unauthorized("sign in required".to_string())),
        )
    }
}

/// The caller's account id, if any.
#[derive(Debug, Clone, Copy)]
pub struct ViewerId(pub Option<Uuid>);

impl FromRequest for ViewerId {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut actix_web::dev::Payload) -> Self::Future {
        ready(Ok(ViewerId(req.extensions().get::<Actor>().map(|a| a.id))))
    }
}

// =====================================================================
// Metrics middleware
// =====================================================================

pub struct MetricsMiddleware;

impl<S, B> Transform<S, ServiceRequest> for MetricsMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = MetricsMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(MetricsMiddlewareService {
            service: Rc::new(service),
        }))
    }
}

pub struct MetricsMiddlewareService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for MetricsMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        // Route patterns keep label cardinality bounded.
        let route = req
            .match_pattern()
            .unwrap_or_else(|| "unmatched".to_string());
        let method = req.method().to_string();
        let start = Instant::now();

        Box::pin(async move {
            let res = service.call(req).await;
            let status = match &res {
                Ok(response) => response.status().as_u16().to_string(),
                Err(err) => err.as_response_error().status_code().as_u16().to_string(),
            };
            let elapsed = start.elapsed();
            HTTP_REQUEST_DURATION_SECONDS
                .with_label_values(&[&method, &route, &status])
                .observe(elapsed.as_secs_f64());
            tracing::debug!(%method, %route, %status, elapsed_ms = elapsed.as_millis() as u64, "request completed");
            res
        })
    }
}
