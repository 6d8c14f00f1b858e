use std::sync::Arc;

use async_trait::async_trait;
use dac_security::{PermissionSet, PermissionType, Principal};
use permissions_sdk::{
    BulkGrantReport, BulkGrantRequest, EffectivePermission, GrantRecord, GrantRequest,
    PermissionsClient, PermissionsError, ResourceLocator, RevokeRequest,
};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::cache::RequestScope;
use super::requests::{
    BulkGrantCommand, CheckQuery, EffectiveQuery, GrantCommand, ListGrantsQuery, RevokeCommand,
};
use crate::module::AppServices;

/// Local implementation of [`PermissionsClient`].
///
/// Each call is its own request: a fresh scope (empty cache, no cancellation
/// source) around the principal, dispatched through the gate. `DomainError`
/// is converted into `PermissionsError` at this boundary.
#[derive(Clone)]
pub struct PermissionsLocalClient {
    services: Arc<AppServices>,
}

impl PermissionsLocalClient {
    #[must_use]
    pub(crate) fn new(services: Arc<AppServices>) -> Self {
        Self { services }
    }

    fn scope(&self, principal: &Principal) -> RequestScope {
        self.services
            .new_scope(principal.clone(), CancellationToken::new())
    }
}

#[async_trait]
impl PermissionsClient for PermissionsLocalClient {
    async fn check(
        &self,
        principal: &Principal,
        permission: PermissionType,
        locator: &ResourceLocator,
    ) -> Result<EffectivePermission, PermissionsError> {
        let query = CheckQuery {
            permission,
            locator: locator.clone(),
        };
        self.services
            .gate
            .dispatch(&self.scope(principal), &*self.services.resolver, query)
            .await
            .map_err(PermissionsError::from)
    }

    async fn effective_permissions(
        &self,
        principal: &Principal,
        locator: &ResourceLocator,
    ) -> Result<PermissionSet, PermissionsError> {
        let query = EffectiveQuery {
            locator: locator.clone(),
        };
        self.services
            .gate
            .dispatch(&self.scope(principal), &*self.services.resolver, query)
            .await
            .map_err(PermissionsError::from)
    }

    async fn grant(
        &self,
        granter: &Principal,
        request: GrantRequest,
    ) -> Result<GrantRecord, PermissionsError> {
        self.services
            .gate
            .dispatch(&self.scope(granter), &*self.services.mutations, GrantCommand(request))
            .await
            .map_err(PermissionsError::from)
    }

    async fn bulk_grant(
        &self,
        granter: &Principal,
        request: BulkGrantRequest,
    ) -> Result<BulkGrantReport, PermissionsError> {
        self.services
            .gate
            .dispatch(
                &self.scope(granter),
                &*self.services.mutations,
                BulkGrantCommand(request),
            )
            .await
            .map_err(PermissionsError::from)
    }

    async fn revoke(
        &self,
        revoker: &Principal,
        request: RevokeRequest,
    ) -> Result<Option<GrantRecord>, PermissionsError> {
        self.services
            .gate
            .dispatch(&self.scope(revoker), &*self.services.mutations, RevokeCommand(request))
            .await
            .map_err(PermissionsError::from)
    }

    async fn list_grants(
        &self,
        principal: &Principal,
        user_id: Uuid,
    ) -> Result<Vec<GrantRecord>, PermissionsError> {
        let query = ListGrantsQuery {
            user_id,
            admin_roles: Arc::clone(&self.services.admin_roles),
        };
        self.services
            .gate
            .dispatch(&self.scope(principal), &*self.services.mutations, query)
            .await
            .map_err(PermissionsError::from)
    }
}
