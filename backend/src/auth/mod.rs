//! Authentication and authorization subsystem.
//!
//! Credential verification with brute-force lockout, session/API token
//! issuance, time-boxed role inheritance, and admin impersonation.

pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod service;
