//! Database row types. These correspond 1:1 to the SQLite schema
//! defined in migrations.rs.

use rusqlite::Row;
use serde::{Deserialize, Serialize};

/// User record in the users table. The password hash never leaves this type:
/// API responses go through [`UserProfile`].
#[derive(Debug, Clone)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub full_name: Option<String>,
    pub avatar: Option<String>,
    /// Role names, stored as a JSON array column (document-style).
    pub roles: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl User {
    /// Column list matching [`User::from_row`]. Keep the two in sync.
    pub const COLUMNS: &'static str =
        "id, username, email, password_hash, full_name, avatar, roles, created_at, updated_at";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let roles_json: String = row.get(6)?;
        let roles = serde_json::from_str(&roles_json).unwrap_or_default();
        Ok(Self {
            id: row.get(0)?,
            username: row.get(1)?,
            email: row.get(2)?,
            password_hash: row.get(3)?,
            full_name: row.get(4)?,
            avatar: row.get(5)?,
            roles,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }

    /// Public view of the user, safe to serialize into responses and
    /// WebSocket events.
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id.clone(),
            username: self.username.clone(),
            email: self.email.clone(),
            full_name: self.full_name.clone(),
            avatar: self.avatar.clone(),
            roles: self.roles.clone(),
            created_at: self.created_at.clone(),
        }
    }
}

/// User representation returned by the API. No password material.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserProfile {
    #[serde(rename = "_id")]
    pub id: String,
    pub username: String,
    pub email: String,
    #[serde(rename = "fullName", skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    pub roles: Vec<String>,
    pub created_at: String,
}

/// Session record: one row per issued token, deleted on logout.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub token: String,
    pub user_id: String,
    pub created_at: String,
}

impl Session {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            token: row.get(1)?,
            user_id: row.get(2)?,
            created_at: row.get(3)?,
        })
    }
}

/// Role with a JSON list of permission strings.
#[derive(Debug, Clone, Serialize)]
pub struct Role {
    pub id: String,
    pub name: String,
    pub permissions: Vec<String>,
    pub created_at: String,
}

impl Role {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let permissions_json: String = row.get(2)?;
        let permissions = serde_json::from_str(&permissions_json).unwrap_or_default();
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            permissions,
            created_at: row.get(3)?,
        })
    }
}
