//! Role storage and listing.
//!
//! Roles are referenced by name from `users.roles`. The administrative
//! mutation surface lives elsewhere; this server only stores, seeds and
//! lists them.

use axum::{extract::State, Json};
use chrono::Utc;
use rusqlite::Connection;
use uuid::Uuid;

use crate::auth::middleware::AuthContext;
use crate::db::models::Role;
use crate::error::ApiError;
use crate::state::AppState;

/// Role assigned to every newly registered user.
pub const DEFAULT_ROLE: &str = "user";

/// Default roles created by the setup gate: (name, permissions).
const DEFAULT_ROLES: &[(&str, &[&str])] = &[
    ("user", &[]),
    ("admin", &["manage_users", "manage_roles"]),
];

/// Insert the default roles if absent. Idempotent, safe to re-run.
pub fn seed_default_roles(conn: &Connection) -> rusqlite::Result<()> {
    let now = Utc::now().to_rfc3339();

    for (name, permissions) in DEFAULT_ROLES {
        let permissions_json =
            serde_json::to_string(permissions).unwrap_or_else(|_| "[]".to_string());
        let id = Uuid::now_v7().to_string();
        conn.execute(
            "INSERT OR IGNORE INTO roles (id, name, permissions, created_at) VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![id, name, permissions_json, now],
        )?;
    }

    Ok(())
}

pub fn list_roles(conn: &Connection) -> rusqlite::Result<Vec<Role>> {
    let mut stmt =
        conn.prepare("SELECT id, name, permissions, created_at FROM roles ORDER BY name")?;
    let rows = stmt.query_map([], Role::from_row)?;
    rows.collect()
}

/// GET /roles — all stored roles with their permission sets.
pub async fn get_roles(
    State(state): State<AppState>,
    _auth: AuthContext,
) -> Result<Json<Vec<Role>>, ApiError> {
    let db = state.db.clone();
    let roles = tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|e| ApiError::Database(format!("DB lock: {e}")))?;
        list_roles(&conn).map_err(ApiError::from)
    })
    .await??;

    Ok(Json(roles))
}
