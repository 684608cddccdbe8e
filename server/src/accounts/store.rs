//! User persistence. All functions take a borrowed connection so handlers
//! can run them inside spawn_blocking with the pool lock held, and tests
//! can run them against an in-memory database.

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};
use uuid::Uuid;

use crate::db::models::User;

pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub full_name: Option<String>,
    pub roles: Vec<String>,
}

/// Insert a new user row. Duplicate usernames surface as a UNIQUE
/// constraint violation from SQLite.
pub fn create_user(conn: &Connection, new: NewUser) -> rusqlite::Result<User> {
    let id = Uuid::now_v7().to_string();
    let now = Utc::now().to_rfc3339();
    let roles_json = serde_json::to_string(&new.roles).unwrap_or_else(|_| "[]".to_string());

    conn.execute(
        "INSERT INTO users (id, username, email, password_hash, full_name, avatar, roles, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, NULL, ?6, ?7, ?7)",
        rusqlite::params![id, new.username, new.email, new.password_hash, new.full_name, roles_json, now],
    )?;

    Ok(User {
        id,
        username: new.username,
        email: new.email,
        password_hash: new.password_hash,
        full_name: new.full_name,
        avatar: None,
        roles: new.roles,
        created_at: now.clone(),
        updated_at: now,
    })
}

/// Exact, case-sensitive username lookup.
pub fn find_by_username(conn: &Connection, username: &str) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        &format!(
            "SELECT {} FROM users WHERE username = ?1",
            User::COLUMNS
        ),
        [username],
        User::from_row,
    )
    .optional()
}

pub fn find_by_id(conn: &Connection, id: &str) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {} FROM users WHERE id = ?1", User::COLUMNS),
        [id],
        User::from_row,
    )
    .optional()
}

/// Fetch users by id list, preserving only existing ids (unknown ids are
/// silently skipped — lookups never error on absence).
pub fn list_by_ids(conn: &Connection, ids: &[String]) -> rusqlite::Result<Vec<User>> {
    let mut users = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(user) = find_by_id(conn, id)? {
            users.push(user);
        }
    }
    Ok(users)
}

pub fn list_all(conn: &Connection) -> rusqlite::Result<Vec<User>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM users ORDER BY created_at",
        User::COLUMNS
    ))?;
    let rows = stmt.query_map([], User::from_row)?;
    rows.collect()
}
