pub mod migrations;
pub mod models;

use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Type alias for the shared database connection.
/// rusqlite is synchronous — we wrap in Arc<Mutex> for thread safety
/// with tokio::task::spawn_blocking for DB operations.
pub type DbPool = Arc<Mutex<Connection>>;

/// Open (or create) the database file, enable WAL mode, and run migrations.
pub fn init_db(data_dir: &str) -> Result<DbPool, Box<dyn std::error::Error>> {
    // Ensure data directory exists
    std::fs::create_dir_all(data_dir)?;

    let db_path = Path::new(data_dir).join("atrium.db");
    let mut conn = Connection::open(&db_path)?;

    // Enable WAL mode for better concurrent read performance
    conn.pragma_update(None, "journal_mode", "WAL")?;
    // Enable foreign key enforcement
    conn.pragma_update(None, "foreign_keys", "ON")?;

    // Run migrations
    let migrations = migrations::migrations();
    migrations.to_latest(&mut conn)?;

    tracing::info!("Database initialized at {}", db_path.display());

    Ok(Arc::new(Mutex::new(conn)))
}

/// Connect to the database, retrying forever with a fixed delay.
///
/// A failed attempt is never fatal to the process — it only blocks startup
/// progression. Each attempt is logged. Once open, the connection lives for
/// the rest of the process.
pub async fn connect_with_retry(data_dir: &str, retry_interval: Duration) -> DbPool {
    let mut attempt: u64 = 0;

    loop {
        attempt += 1;
        tracing::info!(attempt, "Trying to connect to DB");

        match init_db(data_dir) {
            Ok(pool) => {
                tracing::info!("Connected to DB");
                return pool;
            }
            Err(err) => {
                tracing::warn!(
                    attempt,
                    error = %err,
                    "Failed to connect to DB, retrying in {:?}",
                    retry_interval
                );
                tokio::time::sleep(retry_interval).await;
            }
        }
    }
}

/// In-memory database with the full schema applied.
/// Used by unit and integration tests.
pub fn init_memory_db() -> DbPool {
    let mut conn = Connection::open_in_memory().expect("open in-memory db");
    conn.pragma_update(None, "foreign_keys", "ON")
        .expect("enable foreign keys");
    migrations::migrations()
        .to_latest(&mut conn)
        .expect("apply migrations");
    Arc::new(Mutex::new(conn))
}
