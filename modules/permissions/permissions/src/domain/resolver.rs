use std::sync::Arc;

use dac_security::{PermissionSet, PermissionType, Principal};
use permissions_sdk::{EffectivePermission, GrantKey, GrantRecord, PermissionLayer, ResourceLocator};
use tracing::{debug, info, instrument};

use super::cache::{CacheKey, RequestScope};
use super::clock::Clock;
use super::error::DomainError;
use super::store::{PermissionStore, cancellable};

/// Merges the three grant layers and the administrator bypass into one
/// decision.
///
/// Resolution walks Resource → `ContentType` → Tenant and stops at the first
/// layer holding an active record (unexpired, non-empty): that record's bit
/// test is the answer even when it denies. Inactive records are skipped. A
/// global locator (no owning tenant) is allowed at the tenant layer.
pub struct PermissionResolver {
    store: Arc<dyn PermissionStore>,
    clock: Arc<dyn Clock>,
    admin_roles: Vec<String>,
}

impl PermissionResolver {
    #[must_use]
    pub fn new(
        store: Arc<dyn PermissionStore>,
        clock: Arc<dyn Clock>,
        admin_roles: Vec<String>,
    ) -> Self {
        Self {
            store,
            clock,
            admin_roles,
        }
    }

    #[must_use]
    pub fn is_administrator(&self, principal: &Principal) -> bool {
        principal.has_any_role(&self.admin_roles)
    }

    #[must_use]
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Resolve `permission` for the scope's principal on `locator`, starting
    /// at the most specific layer the locator addresses.
    ///
    /// # Errors
    /// `Validation` for a malformed locator, `StoreUnavailable` and
    /// `Cancelled` when no decision could be reached.
    pub async fn resolve(
        &self,
        scope: &RequestScope,
        permission: PermissionType,
        locator: &ResourceLocator,
    ) -> Result<EffectivePermission, DomainError> {
        let from = if locator.resource_id.is_some() {
            PermissionLayer::Resource
        } else {
            PermissionLayer::ContentType
        };
        self.resolve_from(scope, permission, locator, from).await
    }

    /// Like [`Self::resolve`] but ignores every layer more specific than
    /// `from`.
    ///
    /// # Errors
    /// Same as [`Self::resolve`].
    #[instrument(
        skip_all,
        fields(
            user_id = %scope.principal().user_id(),
            permission = %permission,
            entity_type = %locator.entity_type,
            from = from.as_str(),
        )
    )]
    pub async fn resolve_from(
        &self,
        scope: &RequestScope,
        permission: PermissionType,
        locator: &ResourceLocator,
        from: PermissionLayer,
    ) -> Result<EffectivePermission, DomainError> {
        // Tenant-level resolution does not look at the entity type.
        if from != PermissionLayer::Tenant {
            locator.validate()?;
        }
        if from == PermissionLayer::Resource && locator.resource_id.is_none() {
            return Err(DomainError::validation(
                "resource_id",
                "required for resource-level resolution",
            ));
        }

        let principal = scope.principal();
        if !principal.is_authenticated() {
            debug!("anonymous principal denied");
            return Ok(EffectivePermission::denied());
        }
        if self.is_administrator(principal) {
            info!(bypass = "administrator", "permission granted by administrative role");
            return Ok(EffectivePermission::administrator());
        }

        let key = CacheKey {
            user_id: principal.user_id(),
            entity_type: locator.entity_type.clone(),
            resource_id: locator.resource_id,
            permission,
            tenant_id: locator.tenant_id,
            from_layer: from,
        };
        scope
            .cache()
            .get_or_resolve(key, || self.walk(scope, permission, locator, from))
            .await
    }

    /// Every capability the principal holds on `locator`: the built-in
    /// types plus any custom bit carried by an active row on its path.
    ///
    /// # Errors
    /// Same as [`Self::resolve`].
    pub async fn effective_set(
        &self,
        scope: &RequestScope,
        locator: &ResourceLocator,
    ) -> Result<PermissionSet, DomainError> {
        let custom = self.custom_bits_on_path(scope, locator).await?;
        let candidates = PermissionSet::builtin().union(custom);
        let mut set = PermissionSet::empty();
        for permission in candidates.iter() {
            if self.resolve(scope, permission, locator).await?.granted {
                set.insert(permission);
            }
        }
        Ok(set)
    }

    async fn custom_bits_on_path(
        &self,
        scope: &RequestScope,
        locator: &ResourceLocator,
    ) -> Result<PermissionSet, DomainError> {
        let principal = scope.principal();
        let mut custom = PermissionSet::empty();
        if !principal.is_authenticated() || self.is_administrator(principal) {
            return Ok(custom);
        }
        let now = self.clock.now();
        for layer in [
            PermissionLayer::Resource,
            PermissionLayer::ContentType,
            PermissionLayer::Tenant,
        ] {
            let Some(key) = layer_key(principal, locator, layer) else {
                continue;
            };
            let active = self
                .fetch(scope, &key)
                .await?
                .filter(|record| record.is_active(now));
            if let Some(record) = active {
                custom = custom.union(record.permissions.difference(PermissionSet::builtin()));
            }
        }
        Ok(custom)
    }

    async fn walk(
        &self,
        scope: &RequestScope,
        permission: PermissionType,
        locator: &ResourceLocator,
        from: PermissionLayer,
    ) -> Result<EffectivePermission, DomainError> {
        let principal = scope.principal();
        let now = self.clock.now();

        for layer in [
            PermissionLayer::Resource,
            PermissionLayer::ContentType,
            PermissionLayer::Tenant,
        ] {
            if layer > from {
                continue;
            }
            if layer == PermissionLayer::Tenant && locator.is_global() {
                debug!("global resource allowed at tenant layer");
                return Ok(EffectivePermission::global_resource());
            }
            let Some(key) = layer_key(principal, locator, layer) else {
                continue;
            };

            let Some(record) = self.fetch(scope, &key).await? else {
                continue;
            };
            if !record.is_active(now) {
                debug!(layer = layer.as_str(), "inactive grant skipped");
                continue;
            }

            let granted = record.permissions.contains(permission);
            if granted {
                debug!(layer = layer.as_str(), "permission granted");
            } else {
                info!(layer = layer.as_str(), "permission denied by shadowing grant");
            }
            return Ok(EffectivePermission::from_grant(
                layer,
                granted,
                record.expires_at,
            ));
        }

        info!("permission denied: no active grant");
        Ok(EffectivePermission::denied())
    }

    async fn fetch(
        &self,
        scope: &RequestScope,
        key: &GrantKey,
    ) -> Result<Option<GrantRecord>, DomainError> {
        cancellable(scope.cancel(), self.store.get(key)).await
    }
}

/// The row consulted for `layer`, if the locator can address one.
fn layer_key(
    principal: &Principal,
    locator: &ResourceLocator,
    layer: PermissionLayer,
) -> Option<GrantKey> {
    let user_id = principal.user_id();
    match layer {
        PermissionLayer::Resource => locator.resource_id.map(|resource_id| GrantKey::Resource {
            user_id,
            entity_type: locator.entity_type.clone(),
            resource_id,
        }),
        // Global objects are looked up in the principal's home tenant.
        PermissionLayer::ContentType => {
            locator
                .tenant_id
                .or(principal.tenant_id())
                .map(|tenant_id| GrantKey::ContentType {
                    user_id,
                    tenant_id,
                    entity_type: locator.entity_type.clone(),
                })
        }
        PermissionLayer::Tenant => locator
            .tenant_id
            .map(|tenant_id| GrantKey::Tenant { user_id, tenant_id }),
    }
}
