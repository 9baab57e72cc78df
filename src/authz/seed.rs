use crate::authz::engine::Enforcer;
use crate::authz::errors::AuthzError;
use crate::authz::types::PolicyRule;

pub const ROLE_SUPER_ADMIN: &str = "super_admin";
pub const ROLE_USER: &str = "user";

pub const DEFAULT_ROLES: [&str; 2] = [ROLE_SUPER_ADMIN, ROLE_USER];

/// Permissions every deployment starts with.
pub fn default_permissions() -> Vec<PolicyRule> {
    vec![
        PolicyRule::allow(ROLE_USER, "/users/me", "GET"),
        PolicyRule::allow(ROLE_USER, "/acl/me/permissions", "GET"),
        PolicyRule::allow(ROLE_SUPER_ADMIN, "*", "*"),
    ]
}

/// Install default permissions and, if given, make `super_admin` hold the
/// super admin role. Safe to run on every boot.
pub async fn ensure_default_policies(
    enforcer: &Enforcer,
    super_admin: Option<&str>,
) -> Result<usize, AuthzError> {
    let mut added = 0;
    for rule in default_permissions() {
        if enforcer.grant_permission(&rule).await? {
            added += 1;
        }
    }
    if let Some(subject) = super_admin {
        if enforcer.add_grouping(ROLE_SUPER_ADMIN, subject).await? {
            tracing::info!(subject, role = ROLE_SUPER_ADMIN, "granted role");
            added += 1;
        }
    }
    if added > 0 {
        tracing::info!(added, "seeded default policies");
    }
    Ok(added)
}
