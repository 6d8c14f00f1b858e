use std::future::Future;

use async_trait::async_trait;
use dac_security::PermissionSet;
use permissions_sdk::{GrantKey, GrantRecord};
use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;
use tracing::error;
use uuid::Uuid;

use super::error::DomainError;

/// Conditional write of one grant row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantWrite {
    pub key: GrantKey,
    pub permissions: PermissionSet,
    pub expires_at: Option<OffsetDateTime>,
    pub granted_by: Uuid,
    pub updated_at: OffsetDateTime,
    /// `None`: the row must not exist yet. `Some(rev)`: the row must still be
    /// at revision `rev`.
    pub expected_revision: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertOutcome {
    Written(GrantRecord),
    /// The row changed (or appeared) since it was read.
    Conflict,
}

/// Grant storage behind the resolver and the mutation service.
///
/// Rows are never deleted. A successful write bumps `revision` by one; the
/// first write of a key produces revision 1.
#[async_trait]
pub trait PermissionStore: Send + Sync {
    async fn get(&self, key: &GrantKey) -> anyhow::Result<Option<GrantRecord>>;

    async fn upsert(&self, write: GrantWrite) -> anyhow::Result<UpsertOutcome>;

    /// All rows of `user_id` across the three layers, expired ones included.
    async fn list_for_user(&self, user_id: Uuid) -> anyhow::Result<Vec<GrantRecord>>;
}

/// Runs a store operation unless the request is cancelled first.
///
/// Store failures become `StoreUnavailable`; they never turn into a
/// decision.
pub(crate) async fn cancellable<T>(
    cancel: &CancellationToken,
    op: impl Future<Output = anyhow::Result<T>>,
) -> Result<T, DomainError> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(DomainError::Cancelled),
        result = op => result.map_err(|e| {
            error!(error = %e, "grant store operation failed");
            DomainError::store(&e)
        }),
    }
}
