#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use dac_security::{PermissionSet, Principal};
use parking_lot::Mutex;
use permissions_sdk::{GrantKey, GrantRecord};
use time::{Duration, OffsetDateTime, macros::datetime};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::cache::RequestScope;
use super::clock::ManualClock;
use super::events::PermissionAuditEvent;
use super::ports::EventPublisher;
use super::resolver::PermissionResolver;
use super::store::{GrantWrite, PermissionStore, UpsertOutcome};
use crate::infra::storage::InMemoryPermissionStore;

pub const NOW: OffsetDateTime = datetime!(2030-06-01 12:00 UTC);

pub fn user(tenant_id: Uuid) -> Principal {
    Principal::builder()
        .user_id(Uuid::new_v4())
        .tenant_id(tenant_id)
        .build()
}

pub fn admin(tenant_id: Uuid) -> Principal {
    Principal::builder()
        .user_id(Uuid::new_v4())
        .tenant_id(tenant_id)
        .role("admin")
        .build()
}

pub fn scope(principal: Principal) -> RequestScope {
    RequestScope::new(principal, true, CancellationToken::new())
}

pub fn clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(NOW))
}

pub fn resolver(store: Arc<dyn PermissionStore>, clock: Arc<ManualClock>) -> PermissionResolver {
    PermissionResolver::new(store, clock, vec!["admin".to_owned()])
}

pub fn yesterday() -> Option<OffsetDateTime> {
    Some(NOW - Duration::days(1))
}

pub fn in_days(days: i64) -> Option<OffsetDateTime> {
    Some(NOW + Duration::days(days))
}

/// Writes a row directly, bypassing the mutation service.
pub async fn seed(
    store: &InMemoryPermissionStore,
    key: GrantKey,
    permissions: impl Into<PermissionSet>,
    expires_at: Option<OffsetDateTime>,
) -> GrantRecord {
    let expected_revision = store.get(&key).await.unwrap().map(|r| r.revision);
    let outcome = store
        .upsert(GrantWrite {
            key,
            permissions: permissions.into(),
            expires_at,
            granted_by: Uuid::nil(),
            updated_at: NOW,
            expected_revision,
        })
        .await
        .unwrap();
    match outcome {
        UpsertOutcome::Written(record) => record,
        UpsertOutcome::Conflict => panic!("seed conflicted"),
    }
}

/// Store wrapper counting reads, optionally failing or hanging them.
pub struct ProbeStore {
    pub inner: InMemoryPermissionStore,
    pub reads: AtomicUsize,
    pub fail_reads: bool,
    pub hang_reads: bool,
    /// Number of upcoming writes to answer with `Conflict`.
    pub forced_conflicts: AtomicUsize,
}

impl ProbeStore {
    pub fn new() -> Self {
        Self {
            inner: InMemoryPermissionStore::new(),
            reads: AtomicUsize::new(0),
            fail_reads: false,
            hang_reads: false,
            forced_conflicts: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_reads: true,
            ..Self::new()
        }
    }

    pub fn hanging() -> Self {
        Self {
            hang_reads: true,
            ..Self::new()
        }
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PermissionStore for ProbeStore {
    async fn get(&self, key: &GrantKey) -> anyhow::Result<Option<GrantRecord>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads {
            anyhow::bail!("connection refused");
        }
        if self.hang_reads {
            std::future::pending::<()>().await;
        }
        self.inner.get(key).await
    }

    async fn upsert(&self, write: GrantWrite) -> anyhow::Result<UpsertOutcome> {
        let forced = self
            .forced_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if forced {
            return Ok(UpsertOutcome::Conflict);
        }
        self.inner.upsert(write).await
    }

    async fn list_for_user(&self, user_id: Uuid) -> anyhow::Result<Vec<GrantRecord>> {
        self.inner.list_for_user(user_id).await
    }
}

/// Publisher that keeps every event for later assertions.
#[derive(Default)]
pub struct RecordingPublisher {
    pub events: Mutex<Vec<PermissionAuditEvent>>,
}

impl RecordingPublisher {
    pub fn take(&self) -> Vec<PermissionAuditEvent> {
        std::mem::take(&mut *self.events.lock())
    }
}

impl EventPublisher<PermissionAuditEvent> for RecordingPublisher {
    fn publish(&self, event: &PermissionAuditEvent) {
        self.events.lock().push(event.clone());
    }
}
