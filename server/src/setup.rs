//! One-time setup gate.
//!
//! A config document with key "server" holds `{"setup": bool}`. The flag is
//! checked once at boot: when false, the setup steps run in order and any
//! failure is fatal (the caller exits non-zero, no partial-completion
//! recovery). The flag is persisted before any traffic is served and the
//! transition is one-way.

use rusqlite::{Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::db::DbPool;
use crate::roles;

const CONFIG_KEY: &str = "server";

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct ServerConfigDoc {
    pub setup: bool,
}

/// Create the "server" config document with `setup=false` when missing.
pub fn ensure_config_doc(conn: &Connection) -> Result<(), Box<dyn std::error::Error>> {
    let existing: Option<String> = conn
        .query_row(
            "SELECT value FROM server_config WHERE key = ?1",
            [CONFIG_KEY],
            |row| row.get(0),
        )
        .optional()?;

    if existing.is_none() {
        let doc = serde_json::to_string(&ServerConfigDoc { setup: false })?;
        conn.execute(
            "INSERT INTO server_config (key, value) VALUES (?1, ?2)",
            rusqlite::params![CONFIG_KEY, doc],
        )?;
    }

    Ok(())
}

pub fn is_setup_complete(conn: &Connection) -> Result<bool, Box<dyn std::error::Error>> {
    let value: Option<String> = conn
        .query_row(
            "SELECT value FROM server_config WHERE key = ?1",
            [CONFIG_KEY],
            |row| row.get(0),
        )
        .optional()?;

    let Some(value) = value else {
        return Ok(false);
    };
    let doc: ServerConfigDoc = serde_json::from_str(&value).unwrap_or_default();
    Ok(doc.setup)
}

pub fn mark_setup_complete(conn: &Connection) -> Result<(), Box<dyn std::error::Error>> {
    let doc = serde_json::to_string(&ServerConfigDoc { setup: true })?;
    conn.execute(
        "INSERT OR REPLACE INTO server_config (key, value) VALUES (?1, ?2)",
        rusqlite::params![CONFIG_KEY, doc],
    )?;
    Ok(())
}

/// Run the setup gate. Returns Err when a setup step fails; the caller
/// terminates the process in that case.
pub fn check_setup(db: &DbPool, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let conn = db.lock().map_err(|e| format!("DB lock error: {e}"))?;

    ensure_config_doc(&conn)?;

    if is_setup_complete(&conn)? {
        tracing::debug!("setup already complete");
        return Ok(());
    }

    tracing::info!("Server setup is not complete, running setup process");

    // Setup steps, in order. Each one must succeed.
    roles::seed_default_roles(&conn)?;
    std::fs::create_dir_all(&config.storage_dir)?;

    mark_setup_complete(&conn)?;
    tracing::info!("Server setup complete");

    Ok(())
}
