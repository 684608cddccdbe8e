use clap::Parser;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Atrium account & presence API server
#[derive(Parser, Serialize, Deserialize, Clone, Debug)]
#[command(name = "atrium-server", version, about = "Account & presence API server")]
pub struct Config {
    /// Port to listen on
    #[arg(long, env = "ATRIUM_PORT", default_value = "3000")]
    pub port: u16,

    /// Bind address
    #[arg(long, env = "ATRIUM_BIND_ADDRESS", default_value = "0.0.0.0")]
    pub bind_address: String,

    /// Path to TOML config file
    #[arg(long, default_value = "./atrium.toml")]
    pub config: String,

    /// Enable structured JSON logging (for Docker/production)
    #[arg(long, env = "ATRIUM_JSON_LOGS")]
    pub json_logs: bool,

    /// Output a commented TOML config template and exit
    #[arg(long)]
    pub generate_config: bool,

    /// Data directory for persistent state (DB, signing key)
    #[arg(long, env = "ATRIUM_DATA_DIR", default_value = "./data")]
    pub data_dir: String,

    /// Directory served read-only at /storage (uploaded content)
    #[arg(long, env = "ATRIUM_STORAGE_DIR", default_value = "./uploads")]
    pub storage_dir: String,

    /// Seconds between database connection attempts (fixed delay, no backoff)
    #[arg(long, env = "ATRIUM_DB_RETRY_INTERVAL", default_value = "1")]
    pub db_retry_interval_secs: u64,

    /// Session token lifetime in seconds
    #[arg(long, env = "ATRIUM_TOKEN_LIFETIME", default_value = "3600")]
    pub token_lifetime_secs: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            bind_address: "0.0.0.0".to_string(),
            config: "./atrium.toml".to_string(),
            json_logs: false,
            generate_config: false,
            data_dir: "./data".to_string(),
            storage_dir: "./uploads".to_string(),
            db_retry_interval_secs: 1,
            token_lifetime_secs: 3600,
        }
    }
}

impl Config {
    /// Load config with layered precedence:
    /// built-in defaults < TOML file < env vars (ATRIUM_*) < CLI args
    pub fn load() -> Result<Self, figment::Error> {
        let cli = Config::parse();
        let config_path = cli.config.clone();

        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_path))
            .merge(Env::prefixed("ATRIUM_"))
            .merge(Serialized::defaults(cli))
            .extract()
    }
}

/// Generate a commented TOML config template
pub fn generate_config_template() -> String {
    r#"# Atrium API Server Configuration
# Place this file at ./atrium.toml or specify with --config <path>
# All settings can be overridden via environment variables (ATRIUM_PORT, etc.)
# or CLI flags (--port, etc.)

# Server port (default: 3000)
# port = 3000

# Bind address (default: 0.0.0.0 — all interfaces)
# bind_address = "0.0.0.0"

# Enable structured JSON logging for Docker/production
# json_logs = false

# Data directory for the SQLite database and token signing key
# data_dir = "./data"

# Directory served read-only at /storage
# storage_dir = "./uploads"

# Fixed delay between database connection attempts, in seconds
# db_retry_interval_secs = 1

# Session token lifetime in seconds (default: 3600 = 1 hour)
# token_lifetime_secs = 3600
"#
    .to_string()
}
