use crate::db::DbPool;
use crate::ws::ClientRegistry;

/// Shared application state passed to all handlers via axum State extractor.
#[derive(Clone)]
pub struct AppState {
    /// SQLite connection wrapped in Arc<Mutex>
    pub db: DbPool,
    /// Token signing secret (256-bit random key)
    pub jwt_secret: Vec<u8>,
    /// Session token lifetime in seconds
    pub token_lifetime_secs: i64,
    /// Registry of authenticated WebSocket clients
    pub clients: ClientRegistry,
}
