#![allow(clippy::unwrap_used, clippy::expect_used, dead_code)]

use std::sync::Arc;

use dac_security::{PermissionSet, Principal};
use permissions::domain::clock::{Clock, ManualClock};
use permissions::domain::events::PermissionAuditEvent;
use permissions::domain::store::PermissionStore;
use permissions::infra::audit::BroadcastAuditPublisher;
use permissions::infra::storage::InMemoryPermissionStore;
use permissions::{GrantRecord, PermissionsClient, PermissionsModule};
use permissions_sdk::{GrantRequest, GrantTarget};
use time::macros::datetime;
use time::{Duration, OffsetDateTime};
use tokio::sync::broadcast;
use uuid::Uuid;

pub const START: OffsetDateTime = datetime!(2031-01-15 09:00 UTC);

pub struct Env {
    pub module: PermissionsModule,
    pub client: Arc<dyn PermissionsClient>,
    pub clock: Arc<ManualClock>,
    pub audit: broadcast::Receiver<PermissionAuditEvent>,
    pub tenant: Uuid,
    pub admin: Principal,
}

pub fn env() -> Env {
    env_with_store(Arc::new(InMemoryPermissionStore::new()))
}

pub fn env_with_store(store: Arc<dyn PermissionStore>) -> Env {
    let clock = Arc::new(ManualClock::new(START));
    let publisher = Arc::new(BroadcastAuditPublisher::new(1024));
    let audit = publisher.subscribe();
    let module = PermissionsModule::builder(store)
        .clock(clock.clone())
        .publisher(publisher)
        .build();
    let tenant = Uuid::new_v4();
    Env {
        client: module.client(),
        module,
        clock,
        audit,
        admin: admin(tenant),
        tenant,
    }
}

pub fn member(tenant: Uuid) -> Principal {
    Principal::builder()
        .user_id(Uuid::new_v4())
        .tenant_id(tenant)
        .build()
}

pub fn admin(tenant: Uuid) -> Principal {
    Principal::builder()
        .user_id(Uuid::new_v4())
        .tenant_id(tenant)
        .role("admin")
        .build()
}

impl Env {
    pub fn now(&self) -> OffsetDateTime {
        self.clock.now()
    }

    /// Expiry `days` from the current manual time.
    pub fn in_days(&self, days: i64) -> Option<OffsetDateTime> {
        Some(self.now() + Duration::days(days))
    }

    /// Administrator grant of `permissions` on `target` to `subject`.
    pub async fn grant(
        &self,
        subject: &Principal,
        target: GrantTarget,
        permissions: impl Into<PermissionSet>,
        expires_at: Option<OffsetDateTime>,
    ) -> GrantRecord {
        self.client
            .grant(
                &self.admin,
                GrantRequest {
                    subject_user_id: subject.user_id(),
                    target,
                    permissions: permissions.into(),
                    expires_at,
                },
            )
            .await
            .expect("administrator grant")
    }

    /// Drain the audit events published so far.
    pub fn audit_events(&mut self) -> Vec<PermissionAuditEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.audit.try_recv() {
            events.push(event);
        }
        events
    }
}
