use anyhow::Context;
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;

use crate::config::AppConfig;

pub mod categories;
pub mod jokes;
pub mod roles;
pub mod row_parsers;
pub mod sessions;
pub mod trash;
pub mod users;
pub mod votes;

pub use trash::{SoftDeleteTable, SqliteStore};

pub static MIGRATOR: Migrator = sqlx::migrate!();

/// Open the pool without touching the schema.
pub async fn connect(config: &AppConfig) -> anyhow::Result<SqlitePool> {
	let options = SqliteConnectOptions::from_str(&config.database_url)
		.context("invalid DATABASE_URL")?
		.create_if_missing(true)
		.foreign_keys(true);

	let pool = SqlitePoolOptions::new()
		.max_connections(config.max_connections)
		.min_connections(1)
		.acquire_timeout(config.acquire_timeout)
		.connect_with(options)
		.await
		.context("failed to connect to database")?;

	Ok(pool)
}

/// Open the pool and apply pending migrations.
pub async fn init(config: &AppConfig) -> anyhow::Result<SqlitePool> {
	let pool = connect(config).await?;

	MIGRATOR
		.run(&pool)
		.await
		.context("failed to run migrations")?;

	tracing::info!(max_connections = config.max_connections, "database ready");
	Ok(pool)
}

/// RFC 3339 text, the only timestamp format this crate writes.
pub(crate) fn timestamp(at: chrono::DateTime<chrono::Utc>) -> String {
	at.to_rfc3339()
}
