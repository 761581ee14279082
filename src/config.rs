// =============================================================================
// Process Configuration — environment-variable driven
// =============================================================================
//
// Every tunable the core needs lives here, read once at startup and fixed
// for the lifetime of the process — there is no notion of reconfiguring a
// running ingest/persistence worker without a restart.
// =============================================================================

use anyhow::{Context, Result};

/// Full process configuration, assembled from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // ── Database ──────────────────────────────────────────────────────
    pub db_host: String,
    pub db_port: u16,
    pub db_name: String,
    pub db_user: String,
    pub db_password: String,

    // ── Redis ─────────────────────────────────────────────────────────
    pub redis_host: String,
    pub redis_port: u16,
    pub redis_stream_maxlen: usize,

    // ── Kafka ─────────────────────────────────────────────────────────
    pub kafka_bootstrap_servers: String,

    // ── Alpaca (upstream feed) ────────────────────────────────────────
    pub alpaca_api_key: String,
    pub alpaca_secret_key: String,
    pub alpaca_base_url: String,
    pub symbols: Vec<String>,

    // ── EOD vendor ───────────────────────────────────────────────
    pub eod_vendor_api_key: String,
    pub eod_vendor_base_url: String,

    // ── HTTP surface ──────────────────────────────────────────────────
    pub allowed_origins: Vec<String>,
    pub http_bind_addr: String,
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

impl Config {
    /// Load configuration from the environment (and a `.env` file, if
    /// present). Missing required values fail loudly; everything else falls
    /// back to a documented default.
    pub fn from_env() -> Result<Self> {
        let symbols = std::env::var("ALPACA_SYMBOLS")
            .unwrap_or_else(|_| "AAPL,MSFT,GOOGL".to_string())
            .split(',')
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Self {
            db_host: env_or("DB_HOST", "localhost"),
            db_port: env_or("DB_PORT", "5432")
                .parse()
                .context("DB_PORT must be a valid port number")?,
            db_name: env_or("DB_NAME", "market_data"),
            db_user: env_or("DB_USER", "postgres"),
            db_password: env_or("DB_PASSWORD", ""),

            redis_host: env_or("REDIS_HOST", "localhost"),
            redis_port: env_or("REDIS_PORT", "6379")
                .parse()
                .context("REDIS_PORT must be a valid port number")?,
            redis_stream_maxlen: env_or("REDIS_STREAM_MAXLEN", "20000")
                .parse()
                .context("REDIS_STREAM_MAXLEN must be a non-negative integer")?,

            kafka_bootstrap_servers: env_or("KAFKA_BOOTSTRAP_SERVERS", "localhost:9092"),

            alpaca_api_key: env_or("ALPACA_API_KEY", ""),
            alpaca_secret_key: env_or("ALPACA_SECRET_KEY", ""),
            alpaca_base_url: env_or("ALPACA_BASE_URL", "wss://stream.data.alpaca.markets/v2/iex"),
            symbols,

            eod_vendor_api_key: env_or("EOD_VENDOR_API_KEY", ""),
            eod_vendor_base_url: env_or("EOD_VENDOR_BASE_URL", "https://data.example-vendor.com"),

            allowed_origins: env_or("ALLOWED_ORIGINS", "*")
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            http_bind_addr: env_or("HTTP_BIND_ADDR", "0.0.0.0:8080"),
        })
    }

    pub fn database_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.db_user, self.db_password, self.db_host, self.db_port, self.db_name
        )
    }

    pub fn redis_url(&self) -> String {
        format!("redis://{}:{}", self.redis_host, self.redis_port)
    }
}
