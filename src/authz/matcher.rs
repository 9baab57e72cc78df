//! Rule matching and effect evaluation.
//!
//! Object patterns support:
//! - `*` - any run of characters, including `/`
//! - `:name` - exactly one non-empty path segment
//!
//! Everything else matches literally and the whole path must be consumed.

use crate::authz::types::{EnforceRequest, Effect, PolicyRule, WILDCARD};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token<'a> {
    Literal(&'a str),
    Star,
    Param,
}

fn tokenize(pattern: &str) -> Vec<Token<'_>> {
    let bytes = pattern.as_bytes();
    let mut tokens = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        let at_segment_start = i == 0 || bytes[i - 1] == b'/';
        match bytes[i] {
            b'*' => {
                if start < i {
                    tokens.push(Token::Literal(&pattern[start..i]));
                }
                // `**` behaves like `*`
                if tokens.last() != Some(&Token::Star) {
                    tokens.push(Token::Star);
                }
                i += 1;
                start = i;
            }
            b':' if at_segment_start => {
                if start < i {
                    tokens.push(Token::Literal(&pattern[start..i]));
                }
                while i < bytes.len() && bytes[i] != b'/' {
                    i += 1;
                }
                tokens.push(Token::Param);
                start = i;
            }
            _ => i += 1,
        }
    }
    if start < bytes.len() {
        tokens.push(Token::Literal(&pattern[start..]));
    }
    tokens
}

/// Match a request path against an object pattern.
///
/// Dynamic programming over (token, byte offset) so that patterns with many
/// `*` stay O(tokens * path).
pub fn key_match(path: &str, pattern: &str) -> bool {
    if pattern == WILDCARD {
        return true;
    }
    let tokens = tokenize(pattern);
    let path = path.as_bytes();
    let n = path.len();

    // next[j]: tokens[i + 1..] match path[j..]
    let mut next = vec![false; n + 1];
    next[n] = true;

    for token in tokens.iter().rev() {
        let mut cur = vec![false; n + 1];
        for j in (0..=n).rev() {
            cur[j] = match token {
                Token::Literal(lit) => {
                    let lit = lit.as_bytes();
                    path[j..].starts_with(lit) && next[j + lit.len()]
                }
                Token::Star => next[j] || (j < n && cur[j + 1]),
                Token::Param => {
                    let end = path[j..]
                        .iter()
                        .position(|&b| b == b'/')
                        .map(|p| j + p)
                        .unwrap_or(n);
                    (j + 1..=end).any(|k| next[k])
                }
            };
        }
        next = cur;
    }
    next[0]
}

fn qualifier_matches(rule_value: &str, requested: Option<&str>) -> bool {
    if rule_value.is_empty() || rule_value == WILDCARD {
        return true;
    }
    requested == Some(rule_value)
}

/// Whether `rule` applies to `req` for a caller holding `subjects`.
pub fn rule_matches(rule: &PolicyRule, subjects: &[String], req: &EnforceRequest) -> bool {
    subjects.iter().any(|s| *s == rule.subject)
        && (rule.action == WILDCARD || rule.action == req.action)
        && key_match(&req.object, &rule.object)
        && qualifier_matches(&rule.attribute, req.attribute.as_deref())
        && qualifier_matches(&rule.entity, req.entity.as_deref())
}

/// Outcome of evaluating a request against a rule set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    /// At least one matching rule denied
    Deny,
    /// No rule matched
    NoMatch,
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

/// Deny overrides: allowed iff some matching rule allows and none denies.
pub fn evaluate<'a, I>(rules: I, subjects: &[String], req: &EnforceRequest) -> Decision
where
    I: IntoIterator<Item = &'a PolicyRule>,
{
    let mut allowed = false;
    for rule in rules {
        if !rule_matches(rule, subjects, req) {
            continue;
        }
        match rule.effect {
            Effect::Deny => {
                tracing::trace!(rule = %rule, "deny rule matched");
                return Decision::Deny;
            }
            Effect::Allow => allowed = true,
        }
    }
    if allowed {
        Decision::Allow
    } else {
        Decision::NoMatch
    }
}
