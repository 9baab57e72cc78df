use std::sync::Arc;

use axum::body::Body;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Extension, Path, Query, Request, State};
use axum::http::{HeaderName, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;

use crate::authz::engine::Enforcer;
use crate::authz::errors::AuthzError;
use crate::authz::types::*;

pub const DEFAULT_SUBJECT_HEADER: &str = "x-user-id";

#[derive(Clone)]
pub struct AclState {
    pub enforcer: Arc<Enforcer>,
    /// Header the upstream gateway sets after validating the caller's token
    pub subject_header: HeaderName,
}

impl AclState {
    pub fn new(enforcer: Arc<Enforcer>, subject_header: HeaderName) -> Self {
        Self {
            enforcer,
            subject_header,
        }
    }
}

/// Identity of the caller, attached to the request by `subject_from_header`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedSubject(pub String);

/// ACL routes plus an ungated `/healthz`. `/acl/check` takes a POST with a
/// JSON `{sub, obj, act, attr?, entity?}` body rather than query parameters.
pub fn router(state: AclState) -> Router {
    let acl = Router::new()
        .route("/acl/check", post(handle_check))
        .route("/acl/permissions", get(handle_snapshot))
        .route("/acl/permissions/by_subject", get(handle_by_subject))
        .route("/acl/roles", get(handle_roles))
        .route("/acl/user_roles", get(handle_user_roles))
        .route(
            "/acl/policies",
            post(handle_create_policy).delete(handle_remove_policy),
        )
        .route("/acl/policies/{sub}/permissions", get(handle_subject_tree))
        .route("/acl/me/permissions", get(handle_my_tree))
        .route(
            "/acl/policy_group",
            post(handle_add_grouping).delete(handle_remove_grouping),
        )
        // Outermost layer runs first: identify, then enforce
        .route_layer(middleware::from_fn_with_state(state.clone(), enforce_access))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            subject_from_header,
        ));

    Router::new()
        .route("/healthz", get(health))
        .merge(acl)
        .with_state(state)
}

/// Copy the trusted subject header into an `AuthenticatedSubject` extension.
pub async fn subject_from_header(
    State(state): State<AclState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let subject = request
        .headers()
        .get(&state.subject_header)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    if let Some(subject) = subject {
        request
            .extensions_mut()
            .insert(AuthenticatedSubject(subject));
    }
    next.run(request).await
}

/// Gate a route on `enforce(subject, path, method)`. Errors never fall
/// through to the handler.
pub async fn enforce_access(
    State(state): State<AclState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let Some(AuthenticatedSubject(subject)) =
        request.extensions().get::<AuthenticatedSubject>().cloned()
    else {
        return AuthzError::Unauthenticated.into_response();
    };
    let object = request.uri().path().to_string();
    let action = request.method().as_str().to_string();

    match state.enforcer.enforce(&subject, &object, &action).await {
        Ok(true) => next.run(request).await,
        Ok(false) => {
            tracing::info!(%subject, %object, %action, "access denied");
            AuthzError::AccessDenied { object, action }.into_response()
        }
        Err(e) => {
            tracing::error!(%subject, %object, %action, error = %e, "enforcement failed");
            e.into_response()
        }
    }
}

async fn handle_check(
    State(state): State<AclState>,
    payload: Result<Json<CheckRequest>, JsonRejection>,
) -> Result<Json<CheckResponse>, AuthzError> {
    let Json(req) = payload?;
    let req = EnforceRequest::from(req);
    if req.subject.is_empty() || req.object.is_empty() || req.action.is_empty() {
        return Err(AuthzError::MalformedRule(
            "`sub`, `obj` and `act` are required".into(),
        ));
    }
    let allowed = state.enforcer.enforce_request(&req).await?;
    Ok(Json(CheckResponse { allowed }))
}

async fn handle_snapshot(State(state): State<AclState>) -> Result<Json<AclSnapshot>, AuthzError> {
    Ok(Json(state.enforcer.snapshot().await?))
}

async fn handle_by_subject(
    State(state): State<AclState>,
) -> Result<Json<Vec<SubjectPermissions>>, AuthzError> {
    Ok(Json(state.enforcer.permissions_by_subject().await?))
}

async fn handle_roles(State(state): State<AclState>) -> Result<Json<RolesResponse>, AuthzError> {
    let roles = state.enforcer.list_roles().await?;
    Ok(Json(RolesResponse { roles }))
}

async fn handle_user_roles(
    State(state): State<AclState>,
    query: Result<Query<UidQuery>, QueryRejection>,
) -> Result<Json<RolesResponse>, AuthzError> {
    let Query(q) = query?;
    let roles = state.enforcer.get_roles_for_user(&q.uid).await?;
    Ok(Json(RolesResponse { roles }))
}

async fn handle_create_policy(
    State(state): State<AclState>,
    payload: Result<Json<PolicyRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AuthzError> {
    let Json(req) = payload?;
    let rule = PolicyRule::try_from(req)?;
    if !state.enforcer.grant_permission(&rule).await? {
        return Err(AuthzError::AlreadyExists(format!("policy `{rule}`")));
    }
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "policy created", "policy": rule })),
    ))
}

async fn handle_remove_policy(
    State(state): State<AclState>,
    payload: Result<Json<PolicyRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AuthzError> {
    let Json(req) = payload?;
    let rule = PolicyRule::try_from(req)?;
    if !state.enforcer.revoke_permission(&rule).await? {
        return Err(AuthzError::PolicyNotFound(format!("policy `{rule}`")));
    }
    Ok(Json(json!({ "message": "policy removed" })))
}

async fn handle_subject_tree(
    State(state): State<AclState>,
    Path(sub): Path<String>,
) -> Result<impl IntoResponse, AuthzError> {
    Ok(Json(state.enforcer.get_user_permission_tree(&sub).await?))
}

async fn handle_my_tree(
    State(state): State<AclState>,
    Extension(AuthenticatedSubject(subject)): Extension<AuthenticatedSubject>,
) -> Result<impl IntoResponse, AuthzError> {
    Ok(Json(state.enforcer.get_user_permission_tree(&subject).await?))
}

async fn handle_add_grouping(
    State(state): State<AclState>,
    payload: Result<Json<GroupingRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AuthzError> {
    let Json(req) = payload?;
    if !state.enforcer.add_grouping(&req.parent, &req.child).await? {
        return Err(AuthzError::AlreadyExists(format!(
            "grouping {} -> {}",
            req.child, req.parent
        )));
    }
    Ok(Json(json!({ "message": "grouping added" })))
}

async fn handle_remove_grouping(
    State(state): State<AclState>,
    payload: Result<Json<GroupingRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AuthzError> {
    let Json(req) = payload?;
    if !state.enforcer.remove_grouping(&req.parent, &req.child).await? {
        return Err(AuthzError::PolicyNotFound(format!(
            "grouping {} -> {}",
            req.child, req.parent
        )));
    }
    Ok(Json(json!({ "message": "grouping removed" })))
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}
