use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::authz::errors::AuthzError;
use crate::authz::store::PolicyStore;
use crate::authz::types::GroupingEdge;

pub const DEFAULT_MAX_ROLE_DEPTH: usize = 10;

/// How far grouping edges are followed when resolving a subject's roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoleResolution {
    /// Only roles granted directly to the subject.
    #[default]
    Direct,
    /// Roles of roles, up to `max_role_depth` hops.
    Transitive,
}

#[derive(Clone)]
pub struct RoleResolver {
    store: Arc<dyn PolicyStore>,
    mode: RoleResolution,
    max_depth: usize,
}

impl RoleResolver {
    pub fn new(store: Arc<dyn PolicyStore>, mode: RoleResolution, max_depth: usize) -> Self {
        Self {
            store,
            mode,
            max_depth: max_depth.max(1),
        }
    }

    /// Roles held by `subject`, in grant order, without duplicates.
    /// The subject itself is never included.
    pub async fn get_roles_for_user(&self, subject: &str) -> Result<Vec<String>, AuthzError> {
        let direct = self.store.parents_of(subject).await?;
        if self.mode == RoleResolution::Direct {
            return Ok(direct);
        }

        let mut seen: HashSet<String> = HashSet::new();
        seen.insert(subject.to_string());
        let mut roles = Vec::new();
        let mut frontier = Vec::new();
        for role in direct {
            if seen.insert(role.clone()) {
                roles.push(role.clone());
                frontier.push(role);
            }
        }

        // Breadth-first; each layer is one more hop away from the subject
        let mut depth = 1;
        while !frontier.is_empty() && depth < self.max_depth {
            let mut next = Vec::new();
            for role in &frontier {
                for parent in self.store.parents_of(role).await? {
                    if seen.insert(parent.clone()) {
                        roles.push(parent.clone());
                        next.push(parent);
                    }
                }
            }
            frontier = next;
            depth += 1;
        }

        if !frontier.is_empty() {
            tracing::warn!(
                subject,
                max_depth = self.max_depth,
                "role hierarchy deeper than max depth; truncating"
            );
        }

        Ok(roles)
    }
}

/// Check whether adding `edge` would close a cycle: true when `edge.child`
/// is already reachable from `edge.parent` by following child -> parent edges.
pub fn would_create_cycle(edges: &[GroupingEdge], edge: &GroupingEdge) -> bool {
    let mut visited = HashSet::new();
    dfs_reaches(&edge.parent, &edge.child, edges, &mut visited)
}

fn dfs_reaches<'a>(
    from: &'a str,
    target: &str,
    edges: &'a [GroupingEdge],
    visited: &mut HashSet<&'a str>,
) -> bool {
    if from == target {
        return true;
    }
    if !visited.insert(from) {
        return false;
    }
    edges
        .iter()
        .filter(|e| e.child == from)
        .any(|e| dfs_reaches(&e.parent, target, edges, visited))
}
