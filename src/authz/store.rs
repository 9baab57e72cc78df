//! Narrow interface the engine uses to reach durable policy state.
//!
//! `storage::SqlPolicyStore` is the production implementation; the in-memory
//! store here backs fixtures and tests.
use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::authz::errors::AuthzError;
use crate::authz::types::{GroupingEdge, PolicyRule};

#[async_trait]
pub trait PolicyStore: Send + Sync {
    /// Insert a rule. `Ok(false)` when a rule with the same identity exists.
    async fn add_policy(&self, rule: &PolicyRule) -> Result<bool, AuthzError>;

    /// Remove an exactly matching rule. `Ok(false)` when there was none.
    async fn remove_policy(&self, rule: &PolicyRule) -> Result<bool, AuthzError>;

    async fn policies(&self) -> Result<Vec<PolicyRule>, AuthzError>;

    /// All rules whose subject is in `subjects`, in a single query.
    async fn policies_for_subjects(
        &self,
        subjects: &[String],
    ) -> Result<Vec<PolicyRule>, AuthzError>;

    async fn add_grouping(&self, edge: &GroupingEdge) -> Result<bool, AuthzError>;

    async fn remove_grouping(&self, edge: &GroupingEdge) -> Result<bool, AuthzError>;

    async fn groupings(&self) -> Result<Vec<GroupingEdge>, AuthzError>;

    /// Direct parents of `child`, in grant order.
    async fn parents_of(&self, child: &str) -> Result<Vec<String>, AuthzError>;
}

#[derive(Debug, Default)]
struct MemoryState {
    rules: Vec<PolicyRule>,
    edges: Vec<GroupingEdge>,
}

/// Insertion-ordered in-memory store.
#[derive(Debug, Default)]
pub struct MemoryPolicyStore {
    state: RwLock<MemoryState>,
}

impl MemoryPolicyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store pre-populated with `rules` and `edges`. Duplicates are
    /// dropped the same way `add_policy` would drop them.
    pub fn with(rules: Vec<PolicyRule>, edges: Vec<GroupingEdge>) -> Self {
        let mut state = MemoryState::default();
        for rule in rules {
            if !state.rules.iter().any(|r| r.identity() == rule.identity()) {
                state.rules.push(rule);
            }
        }
        for edge in edges {
            if !state.edges.contains(&edge) {
                state.edges.push(edge);
            }
        }
        Self {
            state: RwLock::new(state),
        }
    }
}

#[async_trait]
impl PolicyStore for MemoryPolicyStore {
    async fn add_policy(&self, rule: &PolicyRule) -> Result<bool, AuthzError> {
        let mut state = self.state.write().await;
        if state.rules.iter().any(|r| r.identity() == rule.identity()) {
            return Ok(false);
        }
        state.rules.push(rule.clone());
        Ok(true)
    }

    async fn remove_policy(&self, rule: &PolicyRule) -> Result<bool, AuthzError> {
        let mut state = self.state.write().await;
        let before = state.rules.len();
        state.rules.retain(|r| r != rule);
        Ok(state.rules.len() != before)
    }

    async fn policies(&self) -> Result<Vec<PolicyRule>, AuthzError> {
        Ok(self.state.read().await.rules.clone())
    }

    async fn policies_for_subjects(
        &self,
        subjects: &[String],
    ) -> Result<Vec<PolicyRule>, AuthzError> {
        let state = self.state.read().await;
        Ok(state
            .rules
            .iter()
            .filter(|r| subjects.iter().any(|s| *s == r.subject))
            .cloned()
            .collect())
    }

    async fn add_grouping(&self, edge: &GroupingEdge) -> Result<bool, AuthzError> {
        let mut state = self.state.write().await;
        if state.edges.contains(edge) {
            return Ok(false);
        }
        state.edges.push(edge.clone());
        Ok(true)
    }

    async fn remove_grouping(&self, edge: &GroupingEdge) -> Result<bool, AuthzError> {
        let mut state = self.state.write().await;
        let before = state.edges.len();
        state.edges.retain(|e| e != edge);
        Ok(state.edges.len() != before)
    }

    async fn groupings(&self) -> Result<Vec<GroupingEdge>, AuthzError> {
        Ok(self.state.read().await.edges.clone())
    }

    async fn parents_of(&self, child: &str) -> Result<Vec<String>, AuthzError> {
        let state = self.state.read().await;
        Ok(state
            .edges
            .iter()
            .filter(|e| e.child == child)
            .map(|e| e.parent.clone())
            .collect())
    }
}
