//! Store configuration

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Store configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite connection URL, e.g. `sqlite:labels.db?mode=rwc`
    pub database_url: String,
    /// Environment: development | staging | production
    pub environment: String,
}

impl Config {
    /// Load configuration from environment variables (and `.env` if present)
    pub fn from_env() -> Result<Self, BoxError> {
        let _ = dotenvy::dotenv();

        Ok(Self {
            database_url: std::env::var("DATABASE_URL").map_err(|_| "DATABASE_URL must be set")?,
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into()),
        })
    }
}
