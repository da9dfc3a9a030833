use std::env;

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address
    pub host: String,
    /// Server port
    pub port: u16,
    /// Database connection URL
    pub database_url: String,
    /// Auto-save batching
    pub autosave: AutosaveConfig,
}

#[derive(Debug, Clone)]
pub struct AutosaveConfig {
    pub enabled: bool,
    pub interval_ms: u64,
    pub batch_size: usize,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()?;
        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:gridbook.db".to_string());

        let autosave = AutosaveConfig {
            enabled: env::var("AUTOSAVE_ENABLED")
                .unwrap_or_else(|_| "true".to_string())
                .parse()?,
            interval_ms: env::var("AUTOSAVE_INTERVAL_MS")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?,
            batch_size: env::var("AUTOSAVE_BATCH_SIZE")
                .unwrap_or_else(|_| "100".to_string())
                .parse()?,
        };

        Ok(Self {
            host,
            port,
            database_url,
            autosave,
        })
    }
}
