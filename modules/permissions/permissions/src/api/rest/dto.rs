use dac_security::{PermissionSet, PermissionType};
use permissions_sdk::{GrantRecord, ResourceLocator};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Query string of `GET /effective`.
#[derive(Debug, Clone, Deserialize)]
pub struct LocatorParams {
    pub entity_type: String,
    #[serde(default)]
    pub resource_id: Option<Uuid>,
    #[serde(default)]
    pub tenant_id: Option<Uuid>,
}

impl From<LocatorParams> for ResourceLocator {
    fn from(p: LocatorParams) -> Self {
        Self {
            entity_type: p.entity_type,
            resource_id: p.resource_id,
            tenant_id: p.tenant_id,
        }
    }
}

/// Query string of `GET /check`.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckParams {
    pub permission: PermissionType,
    pub entity_type: String,
    #[serde(default)]
    pub resource_id: Option<Uuid>,
    #[serde(default)]
    pub tenant_id: Option<Uuid>,
}

impl CheckParams {
    #[must_use]
    pub fn into_parts(self) -> (PermissionType, ResourceLocator) {
        (
            self.permission,
            ResourceLocator {
                entity_type: self.entity_type,
                resource_id: self.resource_id,
                tenant_id: self.tenant_id,
            },
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectivePermissionsDto {
    pub permissions: PermissionSet,
}

/// A stored grant row as shown to administrators.
#[derive(Debug, Clone, Serialize)]
pub struct GrantRecordDto {
    #[serde(flatten)]
    pub record: GrantRecord,
    /// `expires_at` has passed.
    pub expired: bool,
}

impl GrantRecordDto {
    #[must_use]
    pub fn new(record: GrantRecord, now: OffsetDateTime) -> Self {
        let expired = record.is_expired(now);
        Self { record, expired }
    }
}
