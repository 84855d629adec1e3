//! Defines the HTTP routes for authentication and account administration.
//!
//! Signup and login are public; everything else sits behind the bearer
//! authenticator. The admin router additionally requires an admin-tier
//! effective role. These are designed to be integrated into the main
//! Axum router.

use crate::auth::handlers::*;
use crate::auth::middleware::{require_admin, require_auth};
use axum::{
    Router, middleware,
    routing::{delete, get, post},
};

/// Creates the authentication router with all auth-related routes
pub fn auth_router() -> Router {
    let protected = Router::new()
        .route("/logout", post(logout))
        .route("/me", get(me))
        .route("/tokens", get(list_tokens).post(create_token))
        .route("/tokens/{token_id}", delete(revoke_token))
        .route("/switch-role", post(switch_role))
        .route("/return-role", post(return_role))
        .route("/role-status", get(role_status))
        .route("/impersonate", post(impersonate))
        .route("/stop-impersonation", post(stop_impersonation))
        .route("/impersonation-status", get(impersonation_status))
        .layer(middleware::from_fn(require_auth));

    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .merge(protected)
}

/// Creates the admin router. Layers run bottom-up, so authentication
/// happens before the admin-tier check.
pub fn admin_router() -> Router {
    Router::new()
        .route("/unlock/{user_id}", post(unlock_account))
        .route("/suspended", get(list_suspended))
        .layer(middleware::from_fn(require_admin))
        .layer(middleware::from_fn(require_auth))
}
