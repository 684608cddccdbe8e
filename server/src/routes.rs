use axum::{middleware, routing, Router};
use tower_http::services::ServeDir;

use crate::accounts;
use crate::auth::middleware::{inject_token_secret, regenerate_token};
use crate::roles;
use crate::sessions;
use crate::state::AppState;
use crate::ws::handler as ws_handler;

/// Build the full axum Router with all routes and middleware.
pub fn build_router(state: AppState, storage_dir: &str) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/auth", routing::post(sessions::login))
        .route("/register", routing::post(accounts::register))
        .route("/health", routing::get(health_check));

    // Logout ends the session for good: it must never pass through the
    // regenerate layer, or the fresh session would undo the logout.
    let logout_route = Router::new().route("/logout", routing::post(sessions::logout));

    // Authenticated routes (bearer token required — the AuthContext
    // extractor validates it). The regenerate layer refreshes aging tokens
    // into a `regenerated_token` response header.
    let authenticated_routes = Router::new()
        .route("/selfUserData", routing::get(accounts::self_user_data))
        .route("/userData", routing::get(accounts::user_data))
        .route("/users", routing::get(accounts::list_users))
        .route("/roles", routing::get(roles::get_roles))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            regenerate_token,
        ));

    // WebSocket channel (auth via the "authenticate" event, not headers)
    let ws_routes = Router::new().route("/main", routing::get(ws_handler::ws_upgrade));

    // Uploaded content, served read-only
    let storage = ServeDir::new(storage_dir);

    Router::new()
        .merge(public_routes)
        .merge(logout_route)
        .merge(authenticated_routes)
        .merge(ws_routes)
        .nest_service("/storage", storage)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            inject_token_secret,
        ))
        .with_state(state)
}

/// Basic health check endpoint
async fn health_check() -> &'static str {
    "ok"
}
