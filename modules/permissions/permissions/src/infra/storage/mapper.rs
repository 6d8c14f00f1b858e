use dac_security::PermissionSet;
use permissions_sdk::{GrantKey, GrantRecord};

use super::entity::{content_type_permission, resource_permission, tenant_permission};

/// Stored bitmask as a signed 64-bit column; the sign bit carries capability 63.
pub(super) fn bits_to_column(set: PermissionSet) -> i64 {
    set.bits().cast_signed()
}

pub(super) fn column_to_bits(value: i64) -> PermissionSet {
    PermissionSet::from_bits(value.cast_unsigned())
}

impl From<tenant_permission::Model> for GrantRecord {
    fn from(m: tenant_permission::Model) -> Self {
        Self {
            key: GrantKey::Tenant {
                user_id: m.user_id,
                tenant_id: m.tenant_id,
            },
            permissions: column_to_bits(m.permissions),
            expires_at: m.expires_at,
            revision: m.revision,
            granted_by: m.granted_by,
            updated_at: m.updated_at,
        }
    }
}

impl From<content_type_permission::Model> for GrantRecord {
    fn from(m: content_type_permission::Model) -> Self {
        Self {
            key: GrantKey::ContentType {
                user_id: m.user_id,
                tenant_id: m.tenant_id,
                entity_type: m.entity_type,
            },
            permissions: column_to_bits(m.permissions),
            expires_at: m.expires_at,
            revision: m.revision,
            granted_by: m.granted_by,
            updated_at: m.updated_at,
        }
    }
}

impl From<resource_permission::Model> for GrantRecord {
    fn from(m: resource_permission::Model) -> Self {
        Self {
            key: GrantKey::Resource {
                user_id: m.user_id,
                entity_type: m.entity_type,
                resource_id: m.resource_id,
            },
            permissions: column_to_bits(m.permissions),
            expires_at: m.expires_at,
            revision: m.revision,
            granted_by: m.granted_by,
            updated_at: m.updated_at,
        }
    }
}
