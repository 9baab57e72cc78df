//! HTTP server setup. The ACL routes themselves live in `authz::web`.
use crate::authz::web::{router as acl_router, AclState};
use crate::authz::Enforcer;
use crate::errors::QuizgateError;
use crate::settings::Settings;
use axum::body::Body;
use axum::http::{HeaderName, HeaderValue, Request};
use axum::middleware::{self, Next};
use axum::response::IntoResponse;
use axum::Router;
use miette::IntoDiagnostic;
use std::net::SocketAddr;
use std::sync::Arc;

// Security headers middleware
async fn security_headers(request: Request<Body>, next: Next) -> impl IntoResponse {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    // X-Content-Type-Options: Prevent MIME sniffing
    headers.insert(
        HeaderName::from_static("x-content-type-options"),
        HeaderValue::from_static("nosniff"),
    );

    // Permission trees are per-caller
    headers.insert(
        HeaderName::from_static("cache-control"),
        HeaderValue::from_static("no-store"),
    );

    headers.insert(
        HeaderName::from_static("x-frame-options"),
        HeaderValue::from_static("DENY"),
    );

    response
}

/// Full application router: ACL routes plus response hardening.
pub fn app(settings: &Settings, enforcer: Arc<Enforcer>) -> Result<Router, QuizgateError> {
    let name = &settings.authz.subject_header;
    let subject_header = HeaderName::from_bytes(name.to_ascii_lowercase().as_bytes())
        .map_err(|_| QuizgateError::InvalidSubjectHeader(name.clone()))?;
    let state = AclState::new(enforcer, subject_header);

    Ok(acl_router(state).layer(middleware::from_fn(security_headers)))
}

pub async fn serve(settings: Settings, enforcer: Arc<Enforcer>) -> miette::Result<()> {
    let router = app(&settings, enforcer)?;

    let addr: SocketAddr = format!("{}:{}", settings.server.host, settings.server.port)
        .parse()
        .into_diagnostic()?;
    tracing::info!(%addr, "Starting ACL server");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .into_diagnostic()?;
    axum::serve(listener, router).await.into_diagnostic()?;
    Ok(())
}
