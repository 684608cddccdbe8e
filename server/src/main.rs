mod accounts;
mod auth;
mod config;
mod db;
mod error;
mod roles;
mod routes;
mod sessions;
mod setup;
mod state;
mod ws;

use std::net::SocketAddr;
use std::time::Duration;

use config::{generate_config_template, Config};
use state::AppState;
use ws::ClientRegistry;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load config with layered precedence: defaults < TOML < env < CLI
    let config = Config::load()?;

    // Handle --generate-config: print template and exit
    if config.generate_config {
        print!("{}", generate_config_template());
        return Ok(());
    }

    // Initialize tracing/logging
    if config.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "atrium_server=info".parse().unwrap()),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .pretty()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "atrium_server=info".parse().unwrap()),
            )
            .init();
    }

    tracing::info!("atrium-server v{} starting", env!("CARGO_PKG_VERSION"));

    // Connect to the database: infinite retries with a fixed delay, never
    // fatal, only blocks startup progression.
    let retry_interval = Duration::from_secs(config.db_retry_interval_secs);
    let db = db::connect_with_retry(&config.data_dir, retry_interval).await;

    // One-time setup gate: a failing setup step is fatal.
    if let Err(err) = setup::check_setup(&db, &config) {
        tracing::error!(error = %err, "Server setup failed");
        std::process::exit(1);
    }

    // Load or generate the token signing key
    let jwt_secret = auth::token::load_or_generate_secret(&config.data_dir)?;

    let state = AppState {
        db,
        jwt_secret,
        token_lifetime_secs: config.token_lifetime_secs,
        clients: ClientRegistry::new(),
    };

    let app = routes::build_router(state, &config.storage_dir);

    let addr: SocketAddr = format!("{}:{}", config.bind_address, config.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
