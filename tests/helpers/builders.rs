use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use quizgate::authz::seed::ensure_default_policies;
use quizgate::authz::types::{Effect, PolicyRule};
use quizgate::authz::{Enforcer, EnforcerOptions};
use quizgate::settings::Settings;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use super::db::TestDb;

/// Subject that holds `super_admin` in every `TestApp`
pub const ROOT: &str = "root";

/// Builder for test rules and their HTTP request bodies
pub struct RuleBuilder {
    subject: String,
    object: String,
    action: String,
    attribute: String,
    effect: Effect,
    entity: String,
}

impl RuleBuilder {
    pub fn new(subject: &str, object: &str, action: &str) -> Self {
        Self {
            subject: subject.to_string(),
            object: object.to_string(),
            action: action.to_string(),
            attribute: String::new(),
            effect: Effect::Allow,
            entity: String::new(),
        }
    }

    pub fn deny(mut self) -> Self {
        self.effect = Effect::Deny;
        self
    }

    pub fn with_attribute(mut self, attribute: &str) -> Self {
        self.attribute = attribute.to_string();
        self
    }

    pub fn with_entity(mut self, entity: &str) -> Self {
        self.entity = entity.to_string();
        self
    }

    pub fn build(self) -> PolicyRule {
        PolicyRule::new(self.subject, self.object, self.action, self.effect)
            .with_attribute(self.attribute)
            .with_entity(self.entity)
    }

    /// Body accepted by `POST /acl/policies` and `DELETE /acl/policies`
    pub fn body(&self) -> Value {
        json!({
            "sub": self.subject,
            "obj": self.object,
            "act": self.action,
            "attr": self.attribute,
            "allow_or_deny": self.effect.as_str(),
            "entity": self.entity,
        })
    }
}

/// Full router over a migrated temp database with default policies seeded
pub struct TestApp {
    pub db: TestDb,
    pub enforcer: Arc<Enforcer>,
    router: Router,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_options(EnforcerOptions::default()).await
    }

    pub async fn with_options(options: EnforcerOptions) -> Self {
        let db = TestDb::new().await;
        let enforcer = Arc::new(Enforcer::new(Arc::new(db.store()), options));
        ensure_default_policies(&enforcer, Some(ROOT))
            .await
            .expect("Failed to seed default policies");

        let router = quizgate::web::app(&Settings::default(), enforcer.clone())
            .expect("Failed to build router");

        Self {
            db,
            enforcer,
            router,
        }
    }

    /// Send a request, returning the status and the JSON body (or the raw
    /// text as a JSON string when the body is not JSON).
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        subject: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(subject) = subject {
            builder = builder.header("x-user-id", subject);
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("Failed to build request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Router failed");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Failed to read body");
        let value = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
        (status, value)
    }

    pub async fn get(&self, uri: &str, subject: &str) -> (StatusCode, Value) {
        self.request(Method::GET, uri, Some(subject), None).await
    }

    pub async fn post(&self, uri: &str, subject: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, Some(subject), Some(body))
            .await
    }

    pub async fn delete(&self, uri: &str, subject: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::DELETE, uri, Some(subject), Some(body))
            .await
    }
}
