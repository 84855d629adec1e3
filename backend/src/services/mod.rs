//! Business logic services built on top of the repositories.

pub mod impersonation_service;
pub mod role_service;
pub mod token_service;
