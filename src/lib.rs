//! Quizgate - access control service for the quiz platform
//!
//! The binary wires these modules together; they are public so the
//! integration tests can drive the router and stores directly.

pub mod authz;
pub mod entities;
pub mod errors;
pub mod settings;
pub mod storage;
pub mod web;
