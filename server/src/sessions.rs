//! Session records and the login/logout surface.
//!
//! A session row is written for every issued token and removed on logout.
//! The WebSocket handshake reads sessions by token before trusting the
//! token's own claims.

use axum::{extract::State, Json};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::middleware::AuthContext;
use crate::auth::{password, token};
use crate::db::models::Session;
use crate::error::ApiError;
use crate::state::AppState;

pub fn create_session(conn: &Connection, token: &str, user_id: &str) -> rusqlite::Result<Session> {
    let id = Uuid::now_v7().to_string();
    let now = Utc::now().to_rfc3339();

    conn.execute(
        "INSERT INTO sessions (id, token, user_id, created_at) VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![id, token, user_id, now],
    )?;

    Ok(Session {
        id,
        token: token.to_string(),
        user_id: user_id.to_string(),
        created_at: now,
    })
}

pub fn find_by_token(conn: &Connection, token: &str) -> rusqlite::Result<Option<Session>> {
    conn.query_row(
        "SELECT id, token, user_id, created_at FROM sessions WHERE token = ?1",
        [token],
        Session::from_row,
    )
    .optional()
}

/// Delete the session matching (token, user_id). Idempotent: deleting an
/// absent session is not an error, it just deletes zero rows.
pub fn delete_session(conn: &Connection, token: &str, user_id: &str) -> rusqlite::Result<usize> {
    conn.execute(
        "DELETE FROM sessions WHERE token = ?1 AND user_id = ?2",
        rusqlite::params![token, user_id],
    )
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
}

/// POST /auth
/// Credential login: verify username/password, mint a token, persist the
/// session. Bad credentials respond 401 with no hint of which part failed.
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    if req.username.is_empty() || req.password.is_empty() {
        return Err(ApiError::Validation(
            "username and password are required".to_string(),
        ));
    }

    let db = state.db.clone();
    let secret = state.jwt_secret.clone();
    let lifetime = state.token_lifetime_secs;

    let token = tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|e| ApiError::Database(format!("DB lock: {e}")))?;

        let user = password::check_credentials(&conn, &req.username, &req.password)?;

        let token = token::issue_token(&secret, &user.id, &user.username, lifetime)
            .map_err(|e| ApiError::Internal(format!("token issuance: {e}")))?;
        create_session(&conn, &token, &user.id)?;

        tracing::info!(username = %user.username, user_id = %user.id, "login");
        Ok::<_, ApiError>(token)
    })
    .await??;

    Ok(Json(LoginResponse { token }))
}

#[derive(Debug, Serialize)]
pub struct LogoutResponse {
    pub deleted: bool,
}

/// POST /logout
/// Deletes the session matching the presented bearer token. The pair
/// (token, user_id) comes from the verified token, never the body.
/// Calling logout twice is a no-op, not an error.
pub async fn logout(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<LogoutResponse>, ApiError> {
    let db = state.db.clone();
    let token = auth.token.clone();
    let user_id = auth.claims.sub.clone();

    let deleted = tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|e| ApiError::Database(format!("DB lock: {e}")))?;
        delete_session(&conn, &token, &user_id).map_err(ApiError::from)
    })
    .await??;

    if deleted > 0 {
        tracing::info!(user_id = %auth.claims.sub, "logout");
    }

    Ok(Json(LogoutResponse {
        deleted: deleted > 0,
    }))
}
