//! Database access layer.
//!
//! Repositories own all SQL for their entity. Mutations that feed security
//! decisions (failed-login counters, suspension flips, inheritance
//! activation) are single-statement read-modify-writes so concurrent
//! requests cannot lose updates.

pub mod inheritance_repository;
pub mod login_attempt_repository;
pub mod token_repository;
pub mod user_repository;
