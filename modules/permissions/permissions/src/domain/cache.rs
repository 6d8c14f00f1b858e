use std::future::Future;
use std::sync::Arc;

use dac_security::{PermissionType, Principal};
use dashmap::DashMap;
use permissions_sdk::{EffectivePermission, PermissionLayer};
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::error::DomainError;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub user_id: Uuid,
    pub entity_type: String,
    pub resource_id: Option<Uuid>,
    pub permission: PermissionType,
    pub tenant_id: Option<Uuid>,
    /// Layer the walk started from; authority checks start lower than
    /// plain checks and must not share entries with them.
    pub from_layer: PermissionLayer,
}

/// Request-scoped memo of resolver decisions.
///
/// Safe to share between sibling field resolutions running concurrently.
/// Concurrent lookups of the same key share one in-flight resolution; failed
/// resolutions are not stored, so a retry hits the store again.
#[derive(Debug, Default)]
pub struct PermissionCache {
    disabled: bool,
    entries: DashMap<CacheKey, Arc<OnceCell<EffectivePermission>>>,
}

impl PermissionCache {
    #[must_use]
    pub fn new(enabled: bool) -> Self {
        Self {
            disabled: !enabled,
            entries: DashMap::new(),
        }
    }

    /// Returns the memoized decision for `key` or runs `resolve` to produce it.
    ///
    /// # Errors
    /// Whatever `resolve` returns.
    pub async fn get_or_resolve<F, Fut>(
        &self,
        key: CacheKey,
        resolve: F,
    ) -> Result<EffectivePermission, DomainError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<EffectivePermission, DomainError>>,
    {
        if self.disabled {
            return resolve().await;
        }
        // Clone the cell out so the shard lock is released before awaiting.
        let cell = Arc::clone(&self.entries.entry(key).or_default());
        cell.get_or_try_init(resolve).await.copied()
    }

    /// Number of decisions memoized so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.value().initialized())
            .count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Everything one inbound request carries into the engine: the principal,
/// its decision cache and its cancellation signal.
#[derive(Debug)]
pub struct RequestScope {
    principal: Principal,
    cache: PermissionCache,
    cancel: CancellationToken,
}

impl RequestScope {
    #[must_use]
    pub fn new(principal: Principal, cache_enabled: bool, cancel: CancellationToken) -> Self {
        Self {
            principal,
            cache: PermissionCache::new(cache_enabled),
            cancel,
        }
    }

    #[must_use]
    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    #[must_use]
    pub fn cache(&self) -> &PermissionCache {
        &self.cache
    }

    #[must_use]
    pub fn cancel(&self) -> &CancellationToken {
        &self.cancel
    }
}
