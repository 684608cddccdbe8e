pub mod query;
pub mod store;

use std::collections::HashMap;

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;

use crate::auth::middleware::AuthContext;
use crate::auth::password;
use crate::db::models::UserProfile;
use crate::error::{is_unique_violation, ApiError};
use crate::roles::DEFAULT_ROLE;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(rename = "fullName", alias = "full_name", default)]
    pub full_name: Option<String>,
}

/// POST /register
/// Create a new account. Username must be unique; new users get the
/// default role. Responds with the created user, password excluded.
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<UserProfile>, ApiError> {
    for (field, value) in [
        ("username", &req.username),
        ("email", &req.email),
        ("password", &req.password),
    ] {
        if value.trim().is_empty() {
            return Err(ApiError::Validation(format!("{field} is required")));
        }
    }

    let db = state.db.clone();
    let user = tokio::task::spawn_blocking(move || {
        // bcrypt is deliberately slow — keep it off the async workers
        let password_hash = password::hash_password(&req.password)?;

        let conn = db
            .lock()
            .map_err(|e| ApiError::Database(format!("DB lock: {e}")))?;

        store::create_user(
            &conn,
            store::NewUser {
                username: req.username,
                email: req.email,
                password_hash,
                full_name: req.full_name,
                roles: vec![DEFAULT_ROLE.to_string()],
            },
        )
        .map_err(|e| {
            if is_unique_violation(&e) {
                ApiError::Conflict("Username already taken".to_string())
            } else {
                ApiError::from(e)
            }
        })
    })
    .await??;

    tracing::info!(username = %user.username, user_id = %user.id, "user registered");

    Ok(Json(user.profile()))
}

/// GET /selfUserData
/// Profile of the authenticated user.
pub async fn self_user_data(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<UserProfile>, ApiError> {
    let db = state.db.clone();
    let user_id = auth.claims.sub.clone();

    let user = tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|e| ApiError::Database(format!("DB lock: {e}")))?;
        store::find_by_id(&conn, &user_id).map_err(ApiError::from)
    })
    .await??
    .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    Ok(Json(user.profile()))
}

#[derive(Debug, Deserialize)]
pub struct UserDataQuery {
    #[serde(rename = "_id")]
    pub id: Option<String>,
    pub username: Option<String>,
}

/// GET /userData?_id=... | ?username=...
/// Single-user lookup by id or exact username.
pub async fn user_data(
    State(state): State<AppState>,
    _auth: AuthContext,
    Query(q): Query<UserDataQuery>,
) -> Result<Json<UserProfile>, ApiError> {
    if q.id.is_none() && q.username.is_none() {
        return Err(ApiError::Validation(
            "_id or username is required".to_string(),
        ));
    }

    let db = state.db.clone();
    let user = tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|e| ApiError::Database(format!("DB lock: {e}")))?;
        let found = match (&q.id, &q.username) {
            (Some(id), _) => store::find_by_id(&conn, id)?,
            (None, Some(username)) => store::find_by_username(&conn, username)?,
            (None, None) => None,
        };
        Ok::<_, ApiError>(found)
    })
    .await??
    .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    Ok(Json(user.profile()))
}

/// GET /users
/// Multi-user lookup: `_id` (single or comma list) narrows the candidate
/// set, remaining query fields and the `select` JSON object filter it.
/// Always responds 200 with an array, possibly empty.
pub async fn list_users(
    State(state): State<AppState>,
    _auth: AuthContext,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Vec<UserProfile>>, ApiError> {
    let filter = query::UserFilter::parse(&params)?;

    let db = state.db.clone();
    let users = tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|e| ApiError::Database(format!("DB lock: {e}")))?;
        let candidates = match &filter.ids {
            Some(ids) => store::list_by_ids(&conn, ids)?,
            None => store::list_all(&conn)?,
        };
        Ok::<_, ApiError>(filter.apply(candidates))
    })
    .await??;

    Ok(Json(users.iter().map(|u| u.profile()).collect()))
}
