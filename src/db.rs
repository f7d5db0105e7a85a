use std::time::Duration;

use sqlx::postgres::PgPoolOptions;

use crate::config::AppConfig;

/// Build a lazily-connecting Postgres pool from configuration.
///
/// Returns `None` when `DATABASE_URL` is unset so the rest of the app can run
/// in a degraded catalog-only mode instead of refusing to boot.
pub fn build_pool(config: &AppConfig) -> Option<sqlx::PgPool> {
    let url = config.database_url.as_deref()?;

    match PgPoolOptions::new()
        .max_connections(config.db_pool_max_connections)
        .min_connections(config.db_pool_min_connections)
        .acquire_timeout(Duration::from_secs(config.db_pool_acquire_timeout_seconds))
        .idle_timeout(Duration::from_secs(config.db_pool_idle_timeout_seconds))
        .connect_lazy(url)
    {
        Ok(pool) => Some(pool),
        Err(error) => {
            tracing::warn!(error = %error, "DATABASE_URL is set but invalid, continuing without a database");
            None
        }
    }
}
