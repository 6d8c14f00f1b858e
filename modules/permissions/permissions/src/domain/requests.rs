//! Commands and queries of the module, each routed through the
//! [`AuthorizationGate`](super::gate::AuthorizationGate).

use std::sync::Arc;

use async_trait::async_trait;
use dac_security::{PermissionSet, PermissionType, Principal};
use permissions_sdk::{
    BulkGrantReport, BulkGrantRequest, EffectivePermission, GrantRecord, GrantRequest,
    ResourceLocator, RevokeRequest,
};
use uuid::Uuid;

use super::cache::RequestScope;
use super::error::DomainError;
use super::gate::{Authorize, Request, RequestHandler};
use super::resolver::PermissionResolver;
use super::service::PermissionMutationService;

/// Requirements shared by every request that only needs a caller identity.
macro_rules! authenticated_only {
    ($($ty:ty),+ $(,)?) => {$(
        impl Authorize for $ty {}
    )+};
}

pub struct CheckQuery {
    pub permission: PermissionType,
    pub locator: ResourceLocator,
}

pub struct EffectiveQuery {
    pub locator: ResourceLocator,
}

pub struct GrantCommand(pub GrantRequest);

pub struct BulkGrantCommand(pub BulkGrantRequest);

pub struct RevokeCommand(pub RevokeRequest);

/// Grant listing is open to the listed user and to administrators.
pub struct ListGrantsQuery {
    pub user_id: Uuid,
    pub admin_roles: Arc<[String]>,
}

authenticated_only!(CheckQuery, EffectiveQuery, GrantCommand, BulkGrantCommand, RevokeCommand);

#[async_trait]
impl Authorize for ListGrantsQuery {
    async fn is_authorized(&self, principal: &Principal) -> Result<bool, DomainError> {
        Ok(principal.user_id() == self.user_id || principal.has_any_role(&self.admin_roles))
    }
}

macro_rules! gated_request {
    ($ty:ty => $response:ty) => {
        impl Request for $ty {
            type Response = $response;
            type Error = DomainError;

            fn authorization(&self) -> Option<&dyn Authorize> {
                Some(self)
            }
        }
    };
}

gated_request!(CheckQuery => EffectivePermission);
gated_request!(EffectiveQuery => PermissionSet);
gated_request!(GrantCommand => GrantRecord);
gated_request!(BulkGrantCommand => BulkGrantReport);
gated_request!(RevokeCommand => Option<GrantRecord>);
gated_request!(ListGrantsQuery => Vec<GrantRecord>);

#[async_trait]
impl RequestHandler<CheckQuery> for PermissionResolver {
    async fn handle(
        &self,
        scope: &RequestScope,
        query: CheckQuery,
    ) -> Result<EffectivePermission, DomainError> {
        self.resolve(scope, query.permission, &query.locator).await
    }
}

#[async_trait]
impl RequestHandler<EffectiveQuery> for PermissionResolver {
    async fn handle(
        &self,
        scope: &RequestScope,
        query: EffectiveQuery,
    ) -> Result<PermissionSet, DomainError> {
        self.effective_set(scope, &query.locator).await
    }
}

#[async_trait]
impl RequestHandler<GrantCommand> for PermissionMutationService {
    async fn handle(
        &self,
        scope: &RequestScope,
        command: GrantCommand,
    ) -> Result<GrantRecord, DomainError> {
        self.grant(scope, command.0).await
    }
}

#[async_trait]
impl RequestHandler<BulkGrantCommand> for PermissionMutationService {
    async fn handle(
        &self,
        scope: &RequestScope,
        command: BulkGrantCommand,
    ) -> Result<BulkGrantReport, DomainError> {
        self.bulk_grant(scope, command.0).await
    }
}

#[async_trait]
impl RequestHandler<RevokeCommand> for PermissionMutationService {
    async fn handle(
        &self,
        scope: &RequestScope,
        command: RevokeCommand,
    ) -> Result<Option<GrantRecord>, DomainError> {
        self.revoke(scope, command.0).await
    }
}

#[async_trait]
impl RequestHandler<ListGrantsQuery> for PermissionMutationService {
    async fn handle(
        &self,
        scope: &RequestScope,
        query: ListGrantsQuery,
    ) -> Result<Vec<GrantRecord>, DomainError> {
        self.list_grants(scope, query.user_id).await
    }
}
