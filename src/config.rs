use std::time::Duration;

use crate::authz::evaluator::DEFAULT_PLACEHOLDER_CATEGORY;
use crate::errors::AppError;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    /// Category attached to jokes created without a known category.
    pub placeholder_category: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let database_url =
            std::env::var("DATABASE_URL").map_err(|_| AppError::configuration("DATABASE_URL not set"))?;
        let max_connections = std::env::var("DB_MAX_CONNECTIONS")
            .map(|val| val.parse::<u32>())
            .unwrap_or(Ok(10))
            .map_err(|_| AppError::configuration("DB_MAX_CONNECTIONS must be a valid integer"))?;
        let acquire_timeout_secs = std::env::var("DB_ACQUIRE_TIMEOUT_SECS")
            .map(|val| val.parse::<u64>())
            .unwrap_or(Ok(10))
            .map_err(|_| AppError::configuration("DB_ACQUIRE_TIMEOUT_SECS must be a valid integer"))?;
        let placeholder_category = std::env::var("PLACEHOLDER_CATEGORY")
            .ok()
            .map(|val| val.trim().to_string())
            .filter(|val| !val.is_empty())
            .unwrap_or_else(|| DEFAULT_PLACEHOLDER_CATEGORY.to_string());

        if max_connections == 0 {
            return Err(AppError::configuration("DB_MAX_CONNECTIONS must be at least 1"));
        }

        Ok(Self {
            database_url,
            max_connections,
            acquire_timeout: Duration::from_secs(acquire_timeout_secs),
            placeholder_category,
        })
    }

    /// Defaults for everything but the database location.
    pub fn for_database(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            max_connections: 10,
            acquire_timeout: Duration::from_secs(10),
            placeholder_category: DEFAULT_PLACEHOLDER_CATEGORY.to_string(),
        }
    }
}
