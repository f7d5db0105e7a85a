use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use tokio::sync::broadcast;

use crate::config::AppConfig;
use crate::db;
use crate::schemas::{Booking, ServiceDefinition};

/// Shared application state, cloned into every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db_pool: Option<sqlx::PgPool>,
    pub http_client: reqwest::Client,
    pub catalog_cache: Cache<String, Arc<Vec<ServiceDefinition>>>,
    /// Complete, timestamp-descending booking snapshots published by the
    /// feed watcher. Every subscriber receives every snapshot.
    pub feed_tx: broadcast::Sender<Arc<Vec<Booking>>>,
}

impl AppState {
    pub fn build(config: AppConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let http_client = reqwest::Client::builder()
            .user_agent(config.app_name.clone())
            .timeout(Duration::from_secs(30))
            .build()?;

        let catalog_cache = Cache::builder()
            .max_capacity(config.catalog_cache_max_entries)
            .time_to_live(Duration::from_secs(config.catalog_cache_ttl_seconds))
            .build();

        let db_pool = db::build_pool(&config);
        let (feed_tx, _) = broadcast::channel(32);

        Ok(Self {
            config: Arc::new(config),
            db_pool,
            http_client,
            catalog_cache,
            feed_tx,
        })
    }
}
