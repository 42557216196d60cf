//! Configuration for the parts of the system this crate actually owns:
//! the database connection and the log level. Everything else an MPI
//! deployment needs — HTTP listeners, CLI flags, config-file formats — is
//! a concern of the binary embedding this crate, not of the crate itself.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/mpi".to_string(),
            max_connections: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset. Reads a `.env` file first if present.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut config = Self::default();
        if let Ok(url) = std::env::var("DATABASE_URL") {
            config.database.url = url;
        }
        if let Ok(raw) = std::env::var("DATABASE_MAX_CONNECTIONS") {
            config.database.max_connections = raw
                .parse()
                .map_err(|_| Error::invalid_config("DATABASE_MAX_CONNECTIONS must be an integer"))?;
        }
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            config.observability.log_level = level;
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = Config::default();
        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.observability.log_level, "info");
    }
}
