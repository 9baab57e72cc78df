pub mod grouping_edge;
pub mod policy_rule;
