use std::sync::Arc;

use sqlx::SqlitePool;

use crate::authz::DefaultPolicyEvaluator;
use crate::config::AppConfig;
use crate::db::{self, SqliteStore};

/// Everything a service call needs: the pool, the policy engine and the
/// loaded configuration.
#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub policy: Arc<DefaultPolicyEvaluator>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(pool: SqlitePool, config: AppConfig) -> Self {
        Self {
            pool,
            policy: Arc::new(DefaultPolicyEvaluator::new(config.placeholder_category.clone())),
            config: Arc::new(config),
        }
    }

    /// Connect, migrate and build the state.
    pub async fn connect(config: AppConfig) -> anyhow::Result<Self> {
        let pool = db::init(&config).await?;
        Ok(Self::new(pool, config))
    }

    pub fn store(&self) -> SqliteStore {
        SqliteStore::new(self.pool.clone())
    }
}
