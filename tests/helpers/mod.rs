#![allow(dead_code)]

pub mod builders;
pub mod db;

pub use builders::{RuleBuilder, TestApp};
pub use db::TestDb;
