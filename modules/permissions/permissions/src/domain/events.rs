use dac_security::PermissionSet;
use permissions_sdk::{GrantKey, GrantTarget, PermissionsErrorKind};
use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

/// Transport-agnostic audit event emitted by grant mutations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PermissionAuditEvent {
    Granted {
        granter_id: Uuid,
        key: GrantKey,
        delegated: PermissionSet,
        resulting: PermissionSet,
        #[serde(with = "time::serde::rfc3339::option")]
        expires_at: Option<OffsetDateTime>,
        /// `false` when the row already carried everything requested.
        changed: bool,
        #[serde(with = "time::serde::rfc3339")]
        at: OffsetDateTime,
    },
    Revoked {
        revoker_id: Uuid,
        key: GrantKey,
        /// `None` for revoke-all.
        removed: Option<PermissionSet>,
        resulting: PermissionSet,
        #[serde(with = "time::serde::rfc3339")]
        at: OffsetDateTime,
    },
    GrantRejected {
        granter_id: Uuid,
        key: GrantKey,
        requested: PermissionSet,
        missing: PermissionSet,
        #[serde(with = "time::serde::rfc3339")]
        at: OffsetDateTime,
    },
    /// A bulk-grant subject that failed for a reason other than missing
    /// authority, which is reported as `GrantRejected`.
    GrantFailed {
        granter_id: Uuid,
        subject_user_id: Uuid,
        target: GrantTarget,
        error: PermissionsErrorKind,
        message: String,
        #[serde(with = "time::serde::rfc3339")]
        at: OffsetDateTime,
    },
    BulkGranted {
        granter_id: Uuid,
        target: GrantTarget,
        permissions: PermissionSet,
        requested: usize,
        succeeded: usize,
        failed: usize,
        #[serde(with = "time::serde::rfc3339")]
        at: OffsetDateTime,
    },
}

impl PermissionAuditEvent {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Granted { .. } => "granted",
            Self::Revoked { .. } => "revoked",
            Self::GrantRejected { .. } => "grant_rejected",
            Self::GrantFailed { .. } => "grant_failed",
            Self::BulkGranted { .. } => "bulk_granted",
        }
    }

    /// Id of the principal that triggered the mutation.
    #[must_use]
    pub fn actor_id(&self) -> Uuid {
        match self {
            Self::Granted { granter_id, .. }
            | Self::GrantRejected { granter_id, .. }
            | Self::GrantFailed { granter_id, .. }
            | Self::BulkGranted { granter_id, .. } => *granter_id,
            Self::Revoked { revoker_id, .. } => *revoker_id,
        }
    }
}
