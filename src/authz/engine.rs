use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use crate::authz::errors::AuthzError;
use crate::authz::matcher::{self, Decision};
use crate::authz::roles::{self, RoleResolution, RoleResolver, DEFAULT_MAX_ROLE_DEPTH};
use crate::authz::store::PolicyStore;
use crate::authz::tree::{self, PermissionNode};
use crate::authz::types::*;

const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy)]
pub struct EnforcerOptions {
    pub role_resolution: RoleResolution,
    pub max_role_depth: usize,
    /// Upper bound for any single store call
    pub store_timeout: Duration,
}

impl Default for EnforcerOptions {
    fn default() -> Self {
        Self {
            role_resolution: RoleResolution::Direct,
            max_role_depth: DEFAULT_MAX_ROLE_DEPTH,
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }
}

/// Authorization decisions and policy administration over a `PolicyStore`.
///
/// Built once at startup and shared behind an `Arc`; it holds no mutable
/// state of its own.
pub struct Enforcer {
    store: Arc<dyn PolicyStore>,
    roles: RoleResolver,
    options: EnforcerOptions,
    /// Held across the cycle check and the insert of a grouping edge
    grouping_lock: Mutex<()>,
}

impl Enforcer {
    pub fn new(store: Arc<dyn PolicyStore>, options: EnforcerOptions) -> Self {
        let roles = RoleResolver::new(
            store.clone(),
            options.role_resolution,
            options.max_role_depth,
        );
        Self {
            store,
            roles,
            options,
            grouping_lock: Mutex::new(()),
        }
    }

    async fn guarded<T, F>(&self, op: &'static str, fut: F) -> Result<T, AuthzError>
    where
        F: Future<Output = Result<T, AuthzError>>,
    {
        match tokio::time::timeout(self.options.store_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                if matches!(e, AuthzError::StoreUnavailable(_)) {
                    tracing::error!(op, error = %e, "policy store call failed");
                }
                Err(e)
            }
            Err(_) => {
                tracing::error!(
                    op,
                    timeout_ms = self.options.store_timeout.as_millis() as u64,
                    "policy store call timed out"
                );
                Err(AuthzError::StoreUnavailable(format!("{op} timed out")))
            }
        }
    }

    // ---------- decisions ----------

    pub async fn enforce(
        &self,
        subject: &str,
        object: &str,
        action: &str,
    ) -> Result<bool, AuthzError> {
        self.enforce_request(&EnforceRequest::new(subject, object, action))
            .await
    }

    /// Deny overrides allow across the subject and all of its roles.
    pub async fn enforce_request(&self, req: &EnforceRequest) -> Result<bool, AuthzError> {
        let subjects = self.subject_set(&req.subject).await?;
        let rules = self
            .guarded("policies_for_subjects", self.store.policies_for_subjects(&subjects))
            .await?;
        let decision = matcher::evaluate(&rules, &subjects, req);

        tracing::debug!(
            subject = %req.subject,
            object = %req.object,
            action = %req.action,
            ?decision,
            candidates = rules.len(),
            "enforce"
        );
        Ok(decision == Decision::Allow)
    }

    /// The subject followed by its roles.
    async fn subject_set(&self, subject: &str) -> Result<Vec<String>, AuthzError> {
        let mut subjects = vec![subject.to_string()];
        subjects.extend(self.get_roles_for_user(subject).await?);
        Ok(subjects)
    }

    pub async fn get_roles_for_user(&self, subject: &str) -> Result<Vec<String>, AuthzError> {
        self.guarded("get_roles_for_user", self.roles.get_roles_for_user(subject))
            .await
    }

    pub async fn get_permissions_by_subjects(
        &self,
        subjects: &[String],
    ) -> Result<Vec<PolicyRule>, AuthzError> {
        self.guarded("policies_for_subjects", self.store.policies_for_subjects(subjects))
            .await
    }

    /// Merged permission tree for `subject`: one tree per role that has
    /// rules, in role order, then the subject's own rules on top.
    pub async fn get_user_permission_tree(
        &self,
        subject: &str,
    ) -> Result<PermissionNode, AuthzError> {
        let roles = self.get_roles_for_user(subject).await?;
        let mut subjects = roles.clone();
        subjects.push(subject.to_string());

        let rules = self.get_permissions_by_subjects(&subjects).await?;
        let mut grouped: HashMap<&str, Vec<&PolicyRule>> = HashMap::new();
        for rule in &rules {
            grouped.entry(rule.subject.as_str()).or_default().push(rule);
        }

        let role_trees: Vec<PermissionNode> = roles
            .iter()
            .filter_map(|role| grouped.get(role.as_str()))
            .map(|perms| tree::build_tree(perms.iter().copied()))
            .collect();
        let user_tree = grouped
            .get(subject)
            .map(|perms| tree::build_tree(perms.iter().copied()))
            .unwrap_or_default();

        Ok(tree::merge_with_user_priority(&role_trees, &user_tree))
    }

    // ---------- mutations ----------

    /// `Ok(false)` when a rule with the same identity already exists.
    pub async fn grant_permission(&self, rule: &PolicyRule) -> Result<bool, AuthzError> {
        rule.validate()?;
        let added = self.guarded("add_policy", self.store.add_policy(rule)).await?;
        if added {
            tracing::info!(rule = %rule, "granted permission");
        }
        Ok(added)
    }

    /// `Ok(false)` when no such rule exists.
    pub async fn revoke_permission(&self, rule: &PolicyRule) -> Result<bool, AuthzError> {
        let removed = self
            .guarded("remove_policy", self.store.remove_policy(rule))
            .await?;
        if removed {
            tracing::info!(rule = %rule, "revoked permission");
        }
        Ok(removed)
    }

    /// Give `child` the role `parent`. Rejects self-loops and edges that
    /// would close a cycle; `Ok(false)` when the edge already exists.
    pub async fn add_grouping(&self, parent: &str, child: &str) -> Result<bool, AuthzError> {
        let edge = GroupingEdge::new(child, parent);
        edge.validate()?;

        let _guard = self.grouping_lock.lock().await;
        let edges = self.guarded("groupings", self.store.groupings()).await?;
        if edges.contains(&edge) {
            return Ok(false);
        }
        if roles::would_create_cycle(&edges, &edge) {
            return Err(AuthzError::CyclicGrouping(format!(
                "{child} -> {parent} (`{parent}` already inherits from `{child}`)"
            )));
        }

        let added = self
            .guarded("add_grouping", self.store.add_grouping(&edge))
            .await?;
        if added {
            tracing::info!(child, parent, "added grouping");
        }
        Ok(added)
    }

    pub async fn remove_grouping(&self, parent: &str, child: &str) -> Result<bool, AuthzError> {
        let edge = GroupingEdge::new(child, parent);
        let _guard = self.grouping_lock.lock().await;
        let removed = self
            .guarded("remove_grouping", self.store.remove_grouping(&edge))
            .await?;
        if removed {
            tracing::info!(child, parent, "removed grouping");
        }
        Ok(removed)
    }

    // ---------- administrative views ----------

    pub async fn list_policies(&self) -> Result<Vec<PolicyRule>, AuthzError> {
        self.guarded("policies", self.store.policies()).await
    }

    pub async fn list_groupings(&self) -> Result<Vec<GroupingEdge>, AuthzError> {
        self.guarded("groupings", self.store.groupings()).await
    }

    pub async fn snapshot(&self) -> Result<AclSnapshot, AuthzError> {
        Ok(AclSnapshot {
            policies: self.list_policies().await?,
            grouping_policies: self.list_groupings().await?,
        })
    }

    /// Distinct rule subjects that are role names rather than user ids.
    pub async fn list_roles(&self) -> Result<Vec<String>, AuthzError> {
        let roles: BTreeSet<String> = self
            .list_policies()
            .await?
            .into_iter()
            .map(|r| r.subject)
            .filter(|s| !is_object_id(s))
            .collect();
        Ok(roles.into_iter().collect())
    }

    pub async fn permissions_by_subject(&self) -> Result<Vec<SubjectPermissions>, AuthzError> {
        let mut grouped: BTreeMap<String, Vec<Permission>> = BTreeMap::new();
        for rule in self.list_policies().await? {
            grouped.entry(rule.subject).or_default().push(Permission {
                object: rule.object,
                action: rule.action,
                effect: rule.effect,
            });
        }
        Ok(grouped
            .into_iter()
            .map(|(subject, permissions)| SubjectPermissions {
                subject,
                permissions,
            })
            .collect())
    }
}

/// User ids are 24-character hex object ids.
pub fn is_object_id(s: &str) -> bool {
    s.len() == 24 && s.bytes().all(|b| b.is_ascii_hexdigit())
}
