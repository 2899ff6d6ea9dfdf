// Ledger core
pub mod inventory;
pub mod invariants;
pub mod ledger;
pub mod movements;

// Reference data and reporting
pub mod catalog;
pub mod dashboard;

use std::sync::Arc;

use crate::{cache::InMemoryCache, config::CacheConfig, db::DbPool, events::EventSender};

/// Every dashboard cache key lives under this prefix; committed mutations
/// drop them all at once.
pub const DASHBOARD_CACHE_PATTERN: &str = "dashboard:*";

/// Service container holding all service instances
#[derive(Clone)]
pub struct ServiceContainer {
    pub movements: Arc<movements::MovementService>,
    pub stock: Arc<inventory::StockService>,
    pub catalog: Arc<catalog::CatalogService>,
    pub dashboard: Arc<dashboard::DashboardService>,
}

impl ServiceContainer {
    /// Builds every service over the same pool, cache and event channel.
    pub fn new(
        db_pool: Arc<DbPool>,
        cache: Arc<InMemoryCache>,
        event_sender: EventSender,
        cache_config: CacheConfig,
    ) -> Self {
        Self {
            movements: Arc::new(movements::MovementService::new(
                db_pool.clone(),
                cache.clone(),
                event_sender.clone(),
            )),
            stock: Arc::new(inventory::StockService::new(
                db_pool.clone(),
                cache.clone(),
                event_sender,
            )),
            catalog: Arc::new(catalog::CatalogService::new(db_pool.clone(), cache.clone())),
            dashboard: Arc::new(dashboard::DashboardService::new(
                db_pool,
                cache,
                cache_config,
            )),
        }
    }
}
