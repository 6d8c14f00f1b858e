//! Domain models of the permission engine.

use dac_security::PermissionSet;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::PermissionsError;

/// Grant layer, ordered from broadest to most specific.
///
/// Precedence during resolution is the reverse order: `Resource` wins over
/// `ContentType`, which wins over `Tenant`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionLayer {
    Tenant,
    ContentType,
    Resource,
}

impl PermissionLayer {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tenant => "tenant",
            Self::ContentType => "content_type",
            Self::Resource => "resource",
        }
    }
}

/// Identifies the object an access decision is about.
///
/// `tenant_id` is the owning tenant of the object; `None` marks a global
/// object, for which the tenant layer is implicitly allowed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceLocator {
    pub entity_type: String,
    #[serde(default)]
    pub resource_id: Option<Uuid>,
    #[serde(default)]
    pub tenant_id: Option<Uuid>,
}

impl ResourceLocator {
    /// Locator for a single object.
    #[must_use]
    pub fn resource(entity_type: impl Into<String>, resource_id: Uuid, tenant_id: Option<Uuid>) -> Self {
        Self {
            entity_type: entity_type.into(),
            resource_id: Some(resource_id),
            tenant_id,
        }
    }

    /// Locator for a content type as a whole inside a tenant.
    #[must_use]
    pub fn content_type(entity_type: impl Into<String>, tenant_id: Option<Uuid>) -> Self {
        Self {
            entity_type: entity_type.into(),
            resource_id: None,
            tenant_id,
        }
    }

    #[must_use]
    pub fn is_global(&self) -> bool {
        self.tenant_id.is_none()
    }

    /// Rejects locators the resolver cannot evaluate.
    ///
    /// # Errors
    /// `Validation` when the entity type is blank.
    pub fn validate(&self) -> Result<(), PermissionsError> {
        if self.entity_type.trim().is_empty() {
            return Err(PermissionsError::validation(
                "entity_type",
                "must not be empty",
            ));
        }
        Ok(())
    }
}

/// Composite identity of one grant row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "layer", rename_all = "snake_case")]
pub enum GrantKey {
    Tenant {
        user_id: Uuid,
        tenant_id: Uuid,
    },
    ContentType {
        user_id: Uuid,
        tenant_id: Uuid,
        entity_type: String,
    },
    Resource {
        user_id: Uuid,
        entity_type: String,
        resource_id: Uuid,
    },
}

impl GrantKey {
    #[must_use]
    pub fn layer(&self) -> PermissionLayer {
        match self {
            Self::Tenant { .. } => PermissionLayer::Tenant,
            Self::ContentType { .. } => PermissionLayer::ContentType,
            Self::Resource { .. } => PermissionLayer::Resource,
        }
    }

    #[must_use]
    pub fn user_id(&self) -> Uuid {
        match self {
            Self::Tenant { user_id, .. }
            | Self::ContentType { user_id, .. }
            | Self::Resource { user_id, .. } => *user_id,
        }
    }
}

/// A stored grant together with its bookkeeping columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantRecord {
    pub key: GrantKey,
    pub permissions: PermissionSet,
    #[serde(with = "time::serde::rfc3339::option")]
    pub expires_at: Option<OffsetDateTime>,
    /// Incremented on every write; used for conditional merge writes.
    pub revision: i64,
    pub granted_by: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl GrantRecord {
    /// A record is expired once `now` reaches `expires_at`.
    #[must_use]
    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    /// Unexpired and carrying at least one capability. Inactive records are
    /// treated as absent by the resolver.
    #[must_use]
    pub fn is_active(&self, now: OffsetDateTime) -> bool {
        !self.is_expired(now) && !self.permissions.is_empty()
    }
}

/// Why a decision came out the way it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionBasis {
    /// A stored grant was consulted.
    Grant,
    /// The principal carries an administrative role.
    AdministratorBypass,
    /// The object has no owning tenant.
    GlobalResource,
    /// No active grant at any layer.
    NoGrant,
}

/// Outcome of resolving one capability for one locator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectivePermission {
    pub granted: bool,
    pub matched_layer: Option<PermissionLayer>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub expires_at: Option<OffsetDateTime>,
    pub basis: DecisionBasis,
}

impl EffectivePermission {
    #[must_use]
    pub fn administrator() -> Self {
        Self {
            granted: true,
            matched_layer: None,
            expires_at: None,
            basis: DecisionBasis::AdministratorBypass,
        }
    }

    #[must_use]
    pub fn global_resource() -> Self {
        Self {
            granted: true,
            matched_layer: Some(PermissionLayer::Tenant),
            expires_at: None,
            basis: DecisionBasis::GlobalResource,
        }
    }

    #[must_use]
    pub fn from_grant(layer: PermissionLayer, granted: bool, expires_at: Option<OffsetDateTime>) -> Self {
        Self {
            granted,
            matched_layer: Some(layer),
            expires_at,
            basis: DecisionBasis::Grant,
        }
    }

    #[must_use]
    pub fn denied() -> Self {
        Self {
            granted: false,
            matched_layer: None,
            expires_at: None,
            basis: DecisionBasis::NoGrant,
        }
    }
}

/// Where a grant or revocation applies.
///
/// Fields not needed by `level` are ignored; missing required fields are a
/// validation error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantTarget {
    pub level: PermissionLayer,
    #[serde(default)]
    pub tenant_id: Option<Uuid>,
    #[serde(default)]
    pub entity_type: Option<String>,
    #[serde(default)]
    pub resource_id: Option<Uuid>,
}

impl GrantTarget {
    #[must_use]
    pub fn tenant(tenant_id: Uuid) -> Self {
        Self {
            level: PermissionLayer::Tenant,
            tenant_id: Some(tenant_id),
            entity_type: None,
            resource_id: None,
        }
    }

    #[must_use]
    pub fn content_type(tenant_id: Uuid, entity_type: impl Into<String>) -> Self {
        Self {
            level: PermissionLayer::ContentType,
            tenant_id: Some(tenant_id),
            entity_type: Some(entity_type.into()),
            resource_id: None,
        }
    }

    #[must_use]
    pub fn resource(entity_type: impl Into<String>, resource_id: Uuid, tenant_id: Option<Uuid>) -> Self {
        Self {
            level: PermissionLayer::Resource,
            tenant_id,
            entity_type: Some(entity_type.into()),
            resource_id: Some(resource_id),
        }
    }

    fn required_tenant(&self) -> Result<Uuid, PermissionsError> {
        self.tenant_id
            .ok_or_else(|| PermissionsError::validation("tenant_id", "required for this level"))
    }

    fn required_entity_type(&self) -> Result<&str, PermissionsError> {
        match self.entity_type.as_deref().map(str::trim) {
            Some(t) if !t.is_empty() => Ok(t),
            _ => Err(PermissionsError::validation(
                "entity_type",
                "required for this level",
            )),
        }
    }

    fn required_resource(&self) -> Result<Uuid, PermissionsError> {
        self.resource_id
            .ok_or_else(|| PermissionsError::validation("resource_id", "required for this level"))
    }

    /// Composite key of the row this target addresses for `user_id`.
    ///
    /// # Errors
    /// `Validation` when a field required by `level` is missing.
    pub fn key_for(&self, user_id: Uuid) -> Result<GrantKey, PermissionsError> {
        Ok(match self.level {
            PermissionLayer::Tenant => GrantKey::Tenant {
                user_id,
                tenant_id: self.required_tenant()?,
            },
            PermissionLayer::ContentType => GrantKey::ContentType {
                user_id,
                tenant_id: self.required_tenant()?,
                entity_type: self.required_entity_type()?.to_owned(),
            },
            PermissionLayer::Resource => GrantKey::Resource {
                user_id,
                entity_type: self.required_entity_type()?.to_owned(),
                resource_id: self.required_resource()?,
            },
        })
    }

    /// Locator used to check the granter's own authority over this target.
    ///
    /// # Errors
    /// `Validation` when a field required by `level` is missing.
    pub fn authority_locator(&self) -> Result<ResourceLocator, PermissionsError> {
        Ok(match self.level {
            PermissionLayer::Tenant => ResourceLocator {
                entity_type: self.entity_type.clone().unwrap_or_default(),
                resource_id: None,
                tenant_id: Some(self.required_tenant()?),
            },
            PermissionLayer::ContentType => ResourceLocator::content_type(
                self.required_entity_type()?,
                Some(self.required_tenant()?),
            ),
            PermissionLayer::Resource => ResourceLocator::resource(
                self.required_entity_type()?,
                self.required_resource()?,
                self.tenant_id,
            ),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantRequest {
    pub subject_user_id: Uuid,
    #[serde(flatten)]
    pub target: GrantTarget,
    pub permissions: PermissionSet,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub expires_at: Option<OffsetDateTime>,
}

/// Revocation of `permissions`, or of the whole row when `permissions` is
/// `None` (the row's expiry is back-dated to now).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevokeRequest {
    pub subject_user_id: Uuid,
    #[serde(flatten)]
    pub target: GrantTarget,
    #[serde(default)]
    pub permissions: Option<PermissionSet>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkGrantRequest {
    pub subject_user_ids: Vec<Uuid>,
    #[serde(flatten)]
    pub target: GrantTarget,
    pub permissions: PermissionSet,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub expires_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectFailure {
    pub subject_user_id: Uuid,
    pub error: PermissionsErrorKind,
    pub message: String,
}

/// Serializable discriminant of [`PermissionsError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionsErrorKind {
    Unauthenticated,
    Forbidden,
    SelfEscalationDenied,
    StoreUnavailable,
    Validation,
    Cancelled,
}

impl From<&PermissionsError> for PermissionsErrorKind {
    fn from(e: &PermissionsError) -> Self {
        match e {
            PermissionsError::Unauthenticated => Self::Unauthenticated,
            PermissionsError::Forbidden { .. } => Self::Forbidden,
            PermissionsError::SelfEscalationDenied { .. } => Self::SelfEscalationDenied,
            PermissionsError::StoreUnavailable(_) => Self::StoreUnavailable,
            PermissionsError::Validation { .. } => Self::Validation,
            PermissionsError::Cancelled => Self::Cancelled,
        }
    }
}

/// Aggregate outcome of a bulk grant. Every subject is attempted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkGrantReport {
    pub requested: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub failures: Vec<SubjectFailure>,
}
