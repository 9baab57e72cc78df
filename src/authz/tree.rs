//! Hierarchical permission view keyed by object path segments.
//!
//! Serialized as nested JSON objects; the reserved `actions` key holds the
//! action -> effect map of a node:
//!
//! ```json
//! { "quizzes": { "actions": { "GET": "allow" }, ":id": { "actions": { "PUT": "deny" } } } }
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::authz::types::{Effect, PolicyRule, ACTIONS_KEY};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionNode {
    pub children: BTreeMap<String, PermissionNode>,
    pub actions: Option<BTreeMap<String, Effect>>,
}

impl PermissionNode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty() && self.actions.is_none()
    }

    /// Node at `path`, split the same way rule objects are.
    pub fn get(&self, path: &str) -> Option<&PermissionNode> {
        path.trim_matches('/')
            .split('/')
            .try_fold(self, |node, seg| node.children.get(seg))
    }

    /// Effect recorded for `action` at `path`.
    pub fn effect_at(&self, path: &str, action: &str) -> Option<Effect> {
        self.get(path)?.actions.as_ref()?.get(action).copied()
    }

    /// Every `(path, action, effect)` leaf, paths joined with `/`.
    pub fn leaves(&self) -> Vec<(String, String, Effect)> {
        let mut out = Vec::new();
        self.collect_leaves(&mut Vec::new(), &mut out);
        out
    }

    fn collect_leaves<'a>(
        &'a self,
        prefix: &mut Vec<&'a str>,
        out: &mut Vec<(String, String, Effect)>,
    ) {
        if let Some(actions) = &self.actions {
            let path = prefix.join("/");
            for (act, eft) in actions {
                out.push((path.clone(), act.clone(), *eft));
            }
        }
        for (seg, child) in &self.children {
            prefix.push(seg);
            child.collect_leaves(prefix, out);
            prefix.pop();
        }
    }
}

/// Build one subject's tree from its rules. Within a single rule set the
/// last rule for a given (path, action) wins.
pub fn build_tree<'a, I>(rules: I) -> PermissionNode
where
    I: IntoIterator<Item = &'a PolicyRule>,
{
    let mut root = PermissionNode::new();
    for rule in rules {
        let node = rule.segments().fold(&mut root, |node, seg| {
            node.children.entry(seg.to_string()).or_default()
        });
        node.actions
            .get_or_insert_with(BTreeMap::new)
            .insert(rule.action.clone(), rule.effect);
    }
    root
}

/// Merge role trees and the user's own tree into one.
///
/// Role trees only fill action keys that are still absent, so among roles the
/// first tree to set a key keeps it. The user tree is applied last and always
/// replaces.
pub fn merge_with_user_priority(
    role_trees: &[PermissionNode],
    user_tree: &PermissionNode,
) -> PermissionNode {
    let mut merged = PermissionNode::new();
    for role_tree in role_trees {
        merge_into(&mut merged, role_tree, false);
    }
    merge_into(&mut merged, user_tree, true);
    merged
}

fn merge_into(dst: &mut PermissionNode, src: &PermissionNode, can_override: bool) {
    if let Some(src_actions) = &src.actions {
        let dst_actions = dst.actions.get_or_insert_with(BTreeMap::new);
        for (act, eft) in src_actions {
            if can_override || !dst_actions.contains_key(act) {
                dst_actions.insert(act.clone(), *eft);
            }
        }
    }
    for (seg, src_child) in &src.children {
        let dst_child = dst.children.entry(seg.clone()).or_default();
        merge_into(dst_child, src_child, can_override);
    }
}

impl Serialize for PermissionNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = self.children.len() + usize::from(self.actions.is_some());
        let mut map = serializer.serialize_map(Some(len))?;
        if let Some(actions) = &self.actions {
            map.serialize_entry(ACTIONS_KEY, actions)?;
        }
        for (seg, child) in &self.children {
            map.serialize_entry(seg, child)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for PermissionNode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct NodeVisitor;

        impl<'de> Visitor<'de> for NodeVisitor {
            type Value = PermissionNode;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a permission tree object")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut node = PermissionNode::new();
                while let Some(key) = access.next_key::<String>()? {
                    if key == ACTIONS_KEY {
                        node.actions = Some(access.next_value()?);
                    } else {
                        let child: PermissionNode = access.next_value()?;
                        node.children.insert(key, child);
                    }
                }
                Ok(node)
            }
        }

        deserializer.deserialize_map(NodeVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_build_tree_nested_paths() {
        let rules = vec![
            PolicyRule::allow("user", "/quizzes", "GET"),
            PolicyRule::allow("user", "/quizzes/:id", "GET"),
            PolicyRule::deny("user", "/quizzes/:id", "DELETE"),
        ];
        let tree = build_tree(&rules);
        assert_eq!(tree.effect_at("/quizzes", "GET"), Some(Effect::Allow));
        assert_eq!(tree.effect_at("/quizzes/:id", "GET"), Some(Effect::Allow));
        assert_eq!(tree.effect_at("/quizzes/:id", "DELETE"), Some(Effect::Deny));
        assert_eq!(tree.effect_at("/quizzes", "DELETE"), None);
    }

    #[test]
    fn test_build_tree_root_object_kept() {
        let rules = vec![PolicyRule::allow("user", "/", "GET")];
        let tree = build_tree(&rules);
        let root = tree.children.get("").expect("empty segment");
        assert_eq!(
            root.actions.as_ref().unwrap().get("GET"),
            Some(&Effect::Allow)
        );
        assert_eq!(tree.effect_at("/", "GET"), Some(Effect::Allow));
    }

    #[test]
    fn test_build_tree_last_write_wins_within_subject() {
        let rules = vec![
            PolicyRule::allow("user", "/quizzes", "GET"),
            PolicyRule::deny("user", "/quizzes/", "GET"),
        ];
        let tree = build_tree(&rules);
        assert_eq!(tree.effect_at("/quizzes", "GET"), Some(Effect::Deny));
    }

    #[test]
    fn test_intermediate_nodes_have_no_actions() {
        let rules = vec![PolicyRule::allow("user", "/a/b/c", "GET")];
        let tree = build_tree(&rules);
        assert!(tree.get("/a").unwrap().actions.is_none());
        assert!(tree.get("/a/b").unwrap().actions.is_none());
        assert!(tree.get("/a/b/c").unwrap().actions.is_some());
    }

    #[test]
    fn test_merge_user_overrides_role() {
        let role = build_tree(&[PolicyRule::allow("user", "/quizzes", "GET")]);
        let user = build_tree(&[PolicyRule::deny("u123", "/quizzes", "GET")]);
        let merged = merge_with_user_priority(&[role], &user);
        assert_eq!(merged.effect_at("/quizzes", "GET"), Some(Effect::Deny));
    }

    #[test]
    fn test_merge_structural_union() {
        let role_a = build_tree(&[PolicyRule::allow("a", "/quizzes", "GET")]);
        let role_b = build_tree(&[
            PolicyRule::allow("b", "/quizzes", "POST"),
            PolicyRule::allow("b", "/comments", "GET"),
        ]);
        let user = build_tree(&[PolicyRule::allow("u1", "/users/me", "GET")]);
        let merged = merge_with_user_priority(&[role_a, role_b], &user);

        let mut leaves = merged.leaves();
        leaves.sort();
        assert_eq!(
            leaves,
            vec![
                ("comments".to_string(), "GET".to_string(), Effect::Allow),
                ("quizzes".to_string(), "GET".to_string(), Effect::Allow),
                ("quizzes".to_string(), "POST".to_string(), Effect::Allow),
                ("users/me".to_string(), "GET".to_string(), Effect::Allow),
            ]
        );
    }

    #[test]
    fn test_merge_first_role_wins_role_collision() {
        let first = build_tree(&[PolicyRule::deny("a", "/quizzes", "GET")]);
        let second = build_tree(&[PolicyRule::allow("b", "/quizzes", "GET")]);
        let merged = merge_with_user_priority(&[first, second], &PermissionNode::new());
        assert_eq!(merged.effect_at("/quizzes", "GET"), Some(Effect::Deny));
    }

    #[test]
    fn test_merge_identity() {
        let merged = merge_with_user_priority(&[], &PermissionNode::new());
        assert!(merged.is_empty());
        assert_eq!(serde_json::to_value(&merged).unwrap(), json!({}));
    }

    #[test]
    fn test_merge_does_not_mutate_inputs() {
        let role = build_tree(&[PolicyRule::allow("user", "/quizzes", "GET")]);
        let user = build_tree(&[PolicyRule::deny("u1", "/quizzes", "GET")]);
        let role_before = role.clone();
        let _ = merge_with_user_priority(std::slice::from_ref(&role), &user);
        assert_eq!(role, role_before);
    }

    #[test]
    fn test_serialize_shape() {
        let tree = build_tree(&[
            PolicyRule::allow("user", "/quizzes", "GET"),
            PolicyRule::deny("user", "/quizzes/:id", "DELETE"),
        ]);
        let value = serde_json::to_value(&tree).unwrap();
        assert_eq!(
            value,
            json!({
                "quizzes": {
                    "actions": { "GET": "allow" },
                    ":id": { "actions": { "DELETE": "deny" } }
                }
            })
        );
    }

    #[test]
    fn test_deserialize_roundtrips_shape() {
        let value = json!({
            "users": { "me": { "actions": { "GET": "allow" } } },
            "": { "actions": { "*": "deny" } }
        });
        let tree: PermissionNode = serde_json::from_value(value.clone()).unwrap();
        assert_eq!(tree.effect_at("/users/me", "GET"), Some(Effect::Allow));
        assert_eq!(tree.effect_at("/", "*"), Some(Effect::Deny));
        assert_eq!(serde_json::to_value(&tree).unwrap(), value);
    }
}
