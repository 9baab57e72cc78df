use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use miette::Diagnostic;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum AuthzError {
    #[error("Policy store unavailable: {0}")]
    #[diagnostic(
        code(quizgate::authz::store_unavailable),
        help("Check the database connection; access is denied while the store is unreachable")
    )]
    StoreUnavailable(String),

    #[error("Policy not found: {0}")]
    #[diagnostic(code(quizgate::authz::not_found))]
    PolicyNotFound(String),

    #[error("Already exists: {0}")]
    #[diagnostic(code(quizgate::authz::already_exists))]
    AlreadyExists(String),

    #[error("Malformed rule: {0}")]
    #[diagnostic(
        code(quizgate::authz::malformed_rule),
        help("Rules need a non-empty `sub`, `obj` and `act`, and `allow_or_deny` must be \"allow\" or \"deny\"")
    )]
    MalformedRule(String),

    #[error("Cyclic role grouping detected: {0}")]
    #[diagnostic(
        code(quizgate::authz::cyclic_grouping),
        help("The parent already inherits from the child; remove the existing edge first")
    )]
    CyclicGrouping(String),

    #[error("Authentication required")]
    #[diagnostic(code(quizgate::authz::unauthenticated))]
    Unauthenticated,

    #[error("Access denied: {action} {object}")]
    #[diagnostic(code(quizgate::authz::access_denied))]
    AccessDenied { object: String, action: String },
}

impl From<JsonRejection> for AuthzError {
    fn from(value: JsonRejection) -> Self {
        AuthzError::MalformedRule(value.body_text())
    }
}

impl From<QueryRejection> for AuthzError {
    fn from(value: QueryRejection) -> Self {
        AuthzError::MalformedRule(value.body_text())
    }
}

impl From<sea_orm::DbErr> for AuthzError {
    fn from(value: sea_orm::DbErr) -> Self {
        AuthzError::StoreUnavailable(value.to_string())
    }
}

impl AuthzError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthzError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AuthzError::PolicyNotFound(_) => StatusCode::NOT_FOUND,
            AuthzError::AlreadyExists(_) => StatusCode::CONFLICT,
            AuthzError::MalformedRule(_) | AuthzError::CyclicGrouping(_) => {
                StatusCode::BAD_REQUEST
            }
            AuthzError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AuthzError::AccessDenied { .. } => StatusCode::FORBIDDEN,
        }
    }
}

impl IntoResponse for AuthzError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = json!({ "error": self.to_string() });
        (status, Json(body)).into_response()
    }
}
