use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::authz::errors::AuthzError;

/// Path segment reserved for the action map in serialized permission trees.
pub const ACTIONS_KEY: &str = "actions";

/// Wildcard accepted for actions and qualifiers.
pub const WILDCARD: &str = "*";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effect {
    Allow,
    Deny,
}

impl Effect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Effect::Allow => "allow",
            Effect::Deny => "deny",
        }
    }
}

impl FromStr for Effect {
    type Err = AuthzError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "allow" => Ok(Effect::Allow),
            "deny" => Ok(Effect::Deny),
            other => Err(AuthzError::MalformedRule(format!(
                "unknown effect `{other}` (expected \"allow\" or \"deny\")"
            ))),
        }
    }
}

impl std::fmt::Display for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single `p` rule: `subject` may perform `action` on `object`.
///
/// `attribute` and `entity` are optional qualifiers; the empty string means
/// the rule is unqualified.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PolicyRule {
    pub subject: String,
    pub object: String,
    pub action: String,
    #[serde(default)]
    pub attribute: String,
    pub effect: Effect,
    #[serde(default)]
    pub entity: String,
}

impl PolicyRule {
    pub fn new(
        subject: impl Into<String>,
        object: impl Into<String>,
        action: impl Into<String>,
        effect: Effect,
    ) -> Self {
        Self {
            subject: subject.into(),
            object: object.into(),
            action: action.into(),
            attribute: String::new(),
            effect,
            entity: String::new(),
        }
    }

    pub fn allow(
        subject: impl Into<String>,
        object: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self::new(subject, object, action, Effect::Allow)
    }

    pub fn deny(
        subject: impl Into<String>,
        object: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self::new(subject, object, action, Effect::Deny)
    }

    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = attribute.into();
        self
    }

    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = entity.into();
        self
    }

    /// Key the store enforces uniqueness on. The effect is not part of it.
    pub fn identity(&self) -> (&str, &str, &str, &str, &str) {
        (
            &self.subject,
            &self.object,
            &self.action,
            &self.attribute,
            &self.entity,
        )
    }

    /// Path segments of `object` with leading and trailing slashes trimmed.
    /// The root object yields a single empty segment.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.object.trim_matches('/').split('/')
    }

    /// Reject rules that must never reach the store.
    pub fn validate(&self) -> Result<(), AuthzError> {
        if self.subject.trim().is_empty() {
            return Err(AuthzError::MalformedRule("rule subject is empty".into()));
        }
        if self.object.trim().is_empty() {
            return Err(AuthzError::MalformedRule(format!(
                "rule for `{}` has an empty object",
                self.subject
            )));
        }
        if self.action.trim().is_empty() {
            return Err(AuthzError::MalformedRule(format!(
                "rule `{}` on `{}` has an empty action",
                self.subject, self.object
            )));
        }
        if self.segments().any(|s| s == ACTIONS_KEY) {
            return Err(AuthzError::MalformedRule(format!(
                "object `{}` uses the reserved segment `{ACTIONS_KEY}`",
                self.object
            )));
        }
        Ok(())
    }
}

impl std::fmt::Display for PolicyRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}, {}, {}, {}",
            self.subject, self.object, self.action, self.effect
        )?;
        if !self.attribute.is_empty() {
            write!(f, " [attr={}]", self.attribute)?;
        }
        if !self.entity.is_empty() {
            write!(f, " [entity={}]", self.entity)?;
        }
        Ok(())
    }
}

/// A `g` edge: `child` has role `parent` and inherits its grants.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupingEdge {
    pub child: String,
    pub parent: String,
}

impl GroupingEdge {
    pub fn new(child: impl Into<String>, parent: impl Into<String>) -> Self {
        Self {
            child: child.into(),
            parent: parent.into(),
        }
    }

    pub fn validate(&self) -> Result<(), AuthzError> {
        if self.child.trim().is_empty() || self.parent.trim().is_empty() {
            return Err(AuthzError::MalformedRule(
                "grouping requires both `parent` and `child`".into(),
            ));
        }
        if self.child == self.parent {
            return Err(AuthzError::MalformedRule(format!(
                "`{}` cannot be granted to itself",
                self.child
            )));
        }
        Ok(())
    }
}

/// Input to a single enforcement decision.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnforceRequest {
    pub subject: String,
    pub object: String,
    pub action: String,
    pub attribute: Option<String>,
    pub entity: Option<String>,
}

impl EnforceRequest {
    pub fn new(
        subject: impl Into<String>,
        object: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            object: object.into(),
            action: action.into(),
            attribute: None,
            entity: None,
        }
    }
}

// ---------- API request/response types ----------

#[derive(Debug, Deserialize)]
pub struct CheckRequest {
    /// Role name or user id
    pub sub: String,
    /// e.g. "/quizzes/42"
    pub obj: String,
    /// e.g. "GET"
    pub act: String,
    #[serde(default)]
    pub attr: Option<String>,
    #[serde(default)]
    pub entity: Option<String>,
}

impl From<CheckRequest> for EnforceRequest {
    fn from(req: CheckRequest) -> Self {
        Self {
            subject: req.sub,
            object: req.obj,
            action: req.act,
            attribute: req.attr,
            entity: req.entity,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CheckResponse {
    pub allowed: bool,
}

#[derive(Debug, Deserialize)]
pub struct PolicyRequest {
    pub sub: String,
    pub obj: String,
    pub act: String,
    #[serde(default)]
    pub attr: String,
    pub allow_or_deny: String,
    #[serde(default)]
    pub entity: String,
}

impl TryFrom<PolicyRequest> for PolicyRule {
    type Error = AuthzError;

    fn try_from(req: PolicyRequest) -> Result<Self, Self::Error> {
        let rule = PolicyRule {
            subject: req.sub,
            object: req.obj,
            action: req.act,
            attribute: req.attr,
            effect: req.allow_or_deny.parse()?,
            entity: req.entity,
        };
        rule.validate()?;
        Ok(rule)
    }
}

#[derive(Debug, Deserialize)]
pub struct GroupingRequest {
    pub parent: String,
    pub child: String,
}

impl From<GroupingRequest> for GroupingEdge {
    fn from(req: GroupingRequest) -> Self {
        GroupingEdge::new(req.child, req.parent)
    }
}

#[derive(Debug, Deserialize)]
pub struct UidQuery {
    pub uid: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RolesResponse {
    pub roles: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub object: String,
    pub action: String,
    pub effect: Effect,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectPermissions {
    pub subject: String,
    pub permissions: Vec<Permission>,
}

/// Every stored rule and grouping edge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AclSnapshot {
    pub policies: Vec<PolicyRule>,
    pub grouping_policies: Vec<GroupingEdge>,
}
