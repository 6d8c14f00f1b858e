//! Public API trait of the permissions module.

use async_trait::async_trait;
use dac_security::{PermissionSet, PermissionType, Principal};
use uuid::Uuid;

use crate::error::PermissionsError;
use crate::models::{
    BulkGrantReport, BulkGrantRequest, EffectivePermission, GrantRecord, GrantRequest,
    ResourceLocator, RevokeRequest,
};

/// Public API of the permission engine.
///
/// Every call is evaluated for the given `principal`; the tenant of the
/// object is part of the locator or target, never taken from ambient state.
///
/// ```ignore
/// let client = module.client();
/// let decision = client
///     .check(&principal, PermissionType::EDIT, &ResourceLocator::resource("Project", id, Some(tenant)))
///     .await?;
/// ```
#[async_trait]
pub trait PermissionsClient: Send + Sync {
    /// Resolve one capability for one locator.
    ///
    /// # Errors
    ///
    /// - `Validation` for malformed locators
    /// - `StoreUnavailable` when the grant store fails
    async fn check(
        &self,
        principal: &Principal,
        permission: PermissionType,
        locator: &ResourceLocator,
    ) -> Result<EffectivePermission, PermissionsError>;

    /// Every capability the principal effectively holds on `locator`.
    ///
    /// # Errors
    ///
    /// Same as [`PermissionsClient::check`].
    async fn effective_permissions(
        &self,
        principal: &Principal,
        locator: &ResourceLocator,
    ) -> Result<PermissionSet, PermissionsError>;

    /// Grant capabilities to one subject, merging with any existing row.
    ///
    /// # Errors
    ///
    /// - `Unauthenticated` when `granter` is anonymous
    /// - `SelfEscalationDenied` when `granter` lacks any delegated capability
    /// - `Validation`, `StoreUnavailable`
    async fn grant(
        &self,
        granter: &Principal,
        request: GrantRequest,
    ) -> Result<GrantRecord, PermissionsError>;

    /// Grant the same capabilities to many subjects. Per-subject failures are
    /// reported, not propagated.
    ///
    /// # Errors
    ///
    /// Only request-level failures (`Unauthenticated`, `Validation`).
    async fn bulk_grant(
        &self,
        granter: &Principal,
        request: BulkGrantRequest,
    ) -> Result<BulkGrantReport, PermissionsError>;

    /// Clear capabilities or expire a whole row.
    ///
    /// # Errors
    ///
    /// Same as [`PermissionsClient::grant`].
    async fn revoke(
        &self,
        revoker: &Principal,
        request: RevokeRequest,
    ) -> Result<Option<GrantRecord>, PermissionsError>;

    /// All rows of `user_id`, expired ones included.
    ///
    /// # Errors
    ///
    /// - `Forbidden` unless the caller is the user itself or an administrator
    /// - `StoreUnavailable`
    async fn list_grants(
        &self,
        principal: &Principal,
        user_id: Uuid,
    ) -> Result<Vec<GrantRecord>, PermissionsError>;
}
