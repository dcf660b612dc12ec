//! Invalidation Module
//!
//! Translates domain mutations into cache invalidations.
//!
//! Cached query keys embed entity names (`"products:all"`, `"units:all"`,
//! `"stock:low"`), so clearing an entity means clearing every key containing
//! its pattern. Because listings denormalize related entities (product rows
//! carry unit and category names, stock and report views aggregate products),
//! mutating one entity must also stale its dependents. That dependency graph
//! is hand-maintained here as a single table rather than scattered `clear`
//! calls, so it can be audited and tested as data. A missing edge shows up as
//! stale data until TTL expiry, not as a runtime error.

use tracing::debug;

use crate::query::SharedCache;

// == Entity Table ==
/// Cacheable entities of the point-of-sale domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Products,
    Categories,
    Units,
    Customers,
    Suppliers,
    Transactions,
    Stock,
    Reports,
}

impl Entity {
    /// Key patterns to clear when this entity is mutated.
    ///
    /// The first pattern is always the entity's own; the rest are its
    /// dependents, whose cached queries embed this entity's data.
    pub fn invalidation_patterns(&self) -> &'static [&'static str] {
        match self {
            Entity::Products => &["products", "stock", "reports"],
            Entity::Categories => &["categories", "products"],
            Entity::Units => &["units", "products"],
            Entity::Customers => &["customers"],
            Entity::Suppliers => &["suppliers", "products"],
            Entity::Transactions => &["transactions", "stock", "reports"],
            Entity::Stock => &["stock", "reports"],
            Entity::Reports => &["reports"],
        }
    }
}

/// Clears every pattern the table lists for `entity`.
pub async fn invalidate_entity(cache: &SharedCache, entity: Entity) {
    let mut store = cache.write().await;
    for pattern in entity.invalidation_patterns() {
        debug!("Invalidating cache pattern '{}' for {:?}", pattern, entity);
        store.clear(Some(pattern));
    }
}

// == Invalidation Helpers ==
// One named helper per entity, callable from any mutation code path.
// Fire-and-forget: no parameters beyond the cache handle, no return value.

pub async fn invalidate_product_cache(cache: &SharedCache) {
    invalidate_entity(cache, Entity::Products).await;
}

pub async fn invalidate_category_cache(cache: &SharedCache) {
    invalidate_entity(cache, Entity::Categories).await;
}

pub async fn invalidate_unit_cache(cache: &SharedCache) {
    invalidate_entity(cache, Entity::Units).await;
}

pub async fn invalidate_customer_cache(cache: &SharedCache) {
    invalidate_entity(cache, Entity::Customers).await;
}

pub async fn invalidate_supplier_cache(cache: &SharedCache) {
    invalidate_entity(cache, Entity::Suppliers).await;
}

pub async fn invalidate_transaction_cache(cache: &SharedCache) {
    invalidate_entity(cache, Entity::Transactions).await;
}

pub async fn invalidate_stock_cache(cache: &SharedCache) {
    invalidate_entity(cache, Entity::Stock).await;
}

pub async fn invalidate_report_cache(cache: &SharedCache) {
    invalidate_entity(cache, Entity::Reports).await;
}
