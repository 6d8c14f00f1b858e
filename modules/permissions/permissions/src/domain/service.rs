use std::sync::Arc;

use dac_security::{PermissionSet, Principal};
use permissions_sdk::{
    BulkGrantReport, BulkGrantRequest, DecisionBasis, GrantKey, GrantRecord, GrantRequest,
    PermissionLayer, PermissionsError, PermissionsErrorKind, ResourceLocator, RevokeRequest,
    SubjectFailure,
};
use time::OffsetDateTime;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::cache::RequestScope;
use super::clock::Clock;
use super::error::DomainError;
use super::events::PermissionAuditEvent;
use super::ports::EventPublisher;
use super::resolver::PermissionResolver;
use super::store::{GrantWrite, PermissionStore, UpsertOutcome, cancellable};
use crate::config::PermissionsConfig;

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub max_bulk_subjects: usize,
    pub max_merge_retries: u32,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self::from(&PermissionsConfig::default())
    }
}

impl From<&PermissionsConfig> for ServiceConfig {
    fn from(cfg: &PermissionsConfig) -> Self {
        Self {
            max_bulk_subjects: cfg.max_bulk_subjects,
            max_merge_retries: cfg.max_merge_retries,
        }
    }
}

/// Row contents a merge wants to write, or `None` when the current row
/// already says it.
type Desired = Option<(PermissionSet, Option<OffsetDateTime>)>;

struct Merged {
    record: Option<GrantRecord>,
    changed: bool,
}

/// Sole writer of grant rows.
///
/// Every mutation is checked against the acting principal's own rights
/// before anything is written: nobody can hand out (or take away) a
/// capability they do not hold at the target scope.
pub struct PermissionMutationService {
    store: Arc<dyn PermissionStore>,
    resolver: Arc<PermissionResolver>,
    clock: Arc<dyn Clock>,
    publisher: Arc<dyn EventPublisher<PermissionAuditEvent>>,
    config: ServiceConfig,
}

impl PermissionMutationService {
    #[must_use]
    pub fn new(
        store: Arc<dyn PermissionStore>,
        resolver: Arc<PermissionResolver>,
        publisher: Arc<dyn EventPublisher<PermissionAuditEvent>>,
        config: ServiceConfig,
    ) -> Self {
        let clock = Arc::clone(resolver.clock());
        Self {
            store,
            resolver,
            clock,
            publisher,
            config,
        }
    }

    /// Grant `request.permissions` to one subject, merging with the row
    /// already stored under the same key.
    ///
    /// # Errors
    /// `Unauthenticated`, `Validation`, `SelfEscalationDenied` (nothing is
    /// written), `StoreUnavailable`, `Cancelled`.
    #[instrument(
        skip_all,
        fields(
            granter = %scope.principal().user_id(),
            subject = %request.subject_user_id,
            level = request.target.level.as_str(),
        )
    )]
    pub async fn grant(
        &self,
        scope: &RequestScope,
        request: GrantRequest,
    ) -> Result<GrantRecord, DomainError> {
        let granter = authenticated(scope)?;
        let now = self.clock.now();
        validate_subject(request.subject_user_id)?;
        validate_grant(request.permissions, request.expires_at, now)?;
        let key = request.target.key_for(request.subject_user_id)?;
        let locator = request.target.authority_locator()?;

        self.ensure_authority(scope, &key, &locator, request.permissions)
            .await?;

        let requested = request.permissions;
        let requested_expiry = request.expires_at;
        let merged = self
            .merge(scope, &key, |current, now| {
                merge_grant(current, now, requested, requested_expiry)
            })
            .await?;
        let record = merged
            .record
            .ok_or_else(|| DomainError::StoreUnavailable("grant row missing after merge".to_owned()))?;

        if merged.changed {
            info!(resulting = %record.permissions, revision = record.revision, "grant written");
        } else {
            debug!("grant already present, nothing written");
        }
        self.publisher.publish(&PermissionAuditEvent::Granted {
            granter_id: granter.user_id(),
            key,
            delegated: requested,
            resulting: record.permissions,
            expires_at: record.expires_at,
            changed: merged.changed,
            at: now,
        });
        Ok(record)
    }

    /// Grant the same capabilities to many subjects. Each subject succeeds or
    /// fails on its own; only cancellation stops the run.
    ///
    /// # Errors
    /// Request-level `Unauthenticated` and `Validation`, and `Cancelled`.
    #[instrument(
        skip_all,
        fields(
            granter = %scope.principal().user_id(),
            subjects = request.subject_user_ids.len(),
            level = request.target.level.as_str(),
        )
    )]
    pub async fn bulk_grant(
        &self,
        scope: &RequestScope,
        request: BulkGrantRequest,
    ) -> Result<BulkGrantReport, DomainError> {
        let granter = authenticated(scope)?;
        if request.subject_user_ids.is_empty() {
            return Err(DomainError::validation(
                "subject_user_ids",
                "at least one subject is required",
            ));
        }
        if request.subject_user_ids.len() > self.config.max_bulk_subjects {
            return Err(DomainError::validation(
                "subject_user_ids",
                format!("at most {} subjects per request", self.config.max_bulk_subjects),
            ));
        }
        validate_grant(request.permissions, request.expires_at, self.clock.now())?;
        request.target.authority_locator()?;

        let mut report = BulkGrantReport {
            requested: request.subject_user_ids.len(),
            ..BulkGrantReport::default()
        };
        for subject in &request.subject_user_ids {
            let single = GrantRequest {
                subject_user_id: *subject,
                target: request.target.clone(),
                permissions: request.permissions,
                expires_at: request.expires_at,
            };
            match self.grant(scope, single).await {
                Ok(_) => report.succeeded += 1,
                Err(DomainError::Cancelled) => return Err(DomainError::Cancelled),
                Err(e) => {
                    let error: PermissionsErrorKind = (&PermissionsError::from(e.clone())).into();
                    let message = e.to_string();
                    if !matches!(e, DomainError::SelfEscalationDenied { .. }) {
                        self.publisher.publish(&PermissionAuditEvent::GrantFailed {
                            granter_id: granter.user_id(),
                            subject_user_id: *subject,
                            target: request.target.clone(),
                            error,
                            message: message.clone(),
                            at: self.clock.now(),
                        });
                    }
                    report.failed += 1;
                    report.failures.push(SubjectFailure {
                        subject_user_id: *subject,
                        error,
                        message,
                    });
                }
            }
        }

        info!(
            succeeded = report.succeeded,
            failed = report.failed,
            "bulk grant finished"
        );
        self.publisher.publish(&PermissionAuditEvent::BulkGranted {
            granter_id: granter.user_id(),
            target: request.target,
            permissions: request.permissions,
            requested: report.requested,
            succeeded: report.succeeded,
            failed: report.failed,
            at: self.clock.now(),
        });
        Ok(report)
    }

    /// Clear capabilities from a row, or back-date its expiry to now when
    /// `request.permissions` is `None`. The row is kept either way.
    ///
    /// The revoker's authority is checked before the row is read, so a
    /// denied caller learns nothing about it. Returns `None` when no row
    /// exists under the key.
    ///
    /// # Errors
    /// Same as [`Self::grant`].
    #[instrument(
        skip_all,
        fields(
            revoker = %scope.principal().user_id(),
            subject = %request.subject_user_id,
            level = request.target.level.as_str(),
        )
    )]
    pub async fn revoke(
        &self,
        scope: &RequestScope,
        request: RevokeRequest,
    ) -> Result<Option<GrantRecord>, DomainError> {
        let revoker = authenticated(scope)?;
        validate_subject(request.subject_user_id)?;
        if request.permissions.is_some_and(PermissionSet::is_empty) {
            return Err(DomainError::validation("permissions", "must not be empty"));
        }
        let key = request.target.key_for(request.subject_user_id)?;
        let locator = request.target.authority_locator()?;

        let now = self.clock.now();
        if let Some(bits) = request.permissions {
            self.ensure_authority(scope, &key, &locator, bits).await?;
        }
        let current = cancellable(scope.cancel(), self.store.get(&key)).await?;
        if request.permissions.is_none() {
            // Revoking everything needs the row's bits, or all built-ins when
            // there is nothing active to compare against.
            let held = current
                .as_ref()
                .filter(|row| row.is_active(now))
                .map_or_else(PermissionSet::builtin, |row| row.permissions);
            self.ensure_authority(scope, &key, &locator, held).await?;
        }

        let Some(current) = current else {
            debug!("no grant row, nothing to revoke");
            return Ok(None);
        };
        if !current.is_active(now) {
            debug!("grant row already inactive");
            return Ok(Some(current));
        }
        if request
            .permissions
            .is_some_and(|bits| bits.intersection(current.permissions).is_empty())
        {
            return Ok(Some(current));
        }

        let bits = request.permissions;
        let merged = self
            .merge(scope, &key, |row, now| merge_revoke(row, now, bits))
            .await?;

        if let Some(record) = &merged.record {
            info!(resulting = %record.permissions, changed = merged.changed, "grant revoked");
            self.publisher.publish(&PermissionAuditEvent::Revoked {
                revoker_id: revoker.user_id(),
                key,
                removed: bits,
                resulting: record.permissions,
                at: now,
            });
        }
        Ok(merged.record)
    }

    /// Every row of `user_id`, expired ones included. Access to this listing
    /// is decided by the caller.
    ///
    /// # Errors
    /// `StoreUnavailable`, `Cancelled`.
    pub async fn list_grants(
        &self,
        scope: &RequestScope,
        user_id: Uuid,
    ) -> Result<Vec<GrantRecord>, DomainError> {
        cancellable(scope.cancel(), self.store.list_for_user(user_id)).await
    }

    /// The acting principal must itself hold every bit of `requested` at the
    /// target scope, counting only layers at or above the target's level.
    /// The global-resource allowance is not authority.
    async fn ensure_authority(
        &self,
        scope: &RequestScope,
        key: &GrantKey,
        locator: &ResourceLocator,
        requested: PermissionSet,
    ) -> Result<(), DomainError> {
        let level: PermissionLayer = key.layer();
        let mut missing = PermissionSet::empty();
        for permission in requested.iter() {
            let decision = self
                .resolver
                .resolve_from(scope, permission, locator, level)
                .await?;
            if !decision.granted || decision.basis == DecisionBasis::GlobalResource {
                missing.insert(permission);
            }
        }
        if missing.is_empty() {
            return Ok(());
        }

        warn!(%missing, "self-escalation denied");
        self.publisher.publish(&PermissionAuditEvent::GrantRejected {
            granter_id: scope.principal().user_id(),
            key: key.clone(),
            requested,
            missing,
            at: self.clock.now(),
        });
        Err(DomainError::SelfEscalationDenied { missing })
    }

    /// Read-merge-write loop with a conditional write on the read revision.
    async fn merge<F>(
        &self,
        scope: &RequestScope,
        key: &GrantKey,
        mut desired: F,
    ) -> Result<Merged, DomainError>
    where
        F: FnMut(Option<&GrantRecord>, OffsetDateTime) -> Desired,
    {
        let actor = scope.principal().user_id();
        for attempt in 0..=self.config.max_merge_retries {
            let current = cancellable(scope.cancel(), self.store.get(key)).await?;
            let now = self.clock.now();
            let Some((permissions, expires_at)) = desired(current.as_ref(), now) else {
                return Ok(Merged {
                    record: current,
                    changed: false,
                });
            };

            let write = GrantWrite {
                key: key.clone(),
                permissions,
                expires_at,
                granted_by: actor,
                updated_at: now,
                expected_revision: current.as_ref().map(|r| r.revision),
            };
            match cancellable(scope.cancel(), self.store.upsert(write)).await? {
                UpsertOutcome::Written(record) => {
                    return Ok(Merged {
                        record: Some(record),
                        changed: true,
                    });
                }
                UpsertOutcome::Conflict => {
                    debug!(attempt, "grant row changed concurrently, re-reading");
                }
            }
        }

        warn!(
            retries = self.config.max_merge_retries,
            "giving up on contended grant row"
        );
        Err(DomainError::StoreUnavailable("write contention".to_owned()))
    }
}

fn authenticated(scope: &RequestScope) -> Result<&Principal, DomainError> {
    let principal = scope.principal();
    if principal.is_authenticated() {
        Ok(principal)
    } else {
        Err(DomainError::Unauthenticated)
    }
}

fn validate_subject(subject: Uuid) -> Result<(), DomainError> {
    if subject.is_nil() {
        return Err(DomainError::validation(
            "subject_user_id",
            "must not be nil",
        ));
    }
    Ok(())
}

fn validate_grant(
    permissions: PermissionSet,
    expires_at: Option<OffsetDateTime>,
    now: OffsetDateTime,
) -> Result<(), DomainError> {
    if permissions.is_empty() {
        return Err(DomainError::validation("permissions", "must not be empty"));
    }
    if expires_at.is_some_and(|at| at <= now) {
        return Err(DomainError::validation(
            "expires_at",
            "must be in the future",
        ));
    }
    Ok(())
}

/// Union with the active row's bits. An active row keeps the later of the
/// two expiries (`None` never expires); an inactive row is replaced.
fn merge_grant(
    current: Option<&GrantRecord>,
    now: OffsetDateTime,
    requested: PermissionSet,
    requested_expiry: Option<OffsetDateTime>,
) -> Desired {
    let active = current.filter(|r| r.is_active(now));
    let (permissions, expires_at) = match active {
        Some(row) => (
            row.permissions | requested,
            later_expiry(row.expires_at, requested_expiry),
        ),
        None => (requested, requested_expiry),
    };
    let unchanged =
        active.is_some_and(|row| row.permissions == permissions && row.expires_at == expires_at);
    (!unchanged).then_some((permissions, expires_at))
}

fn merge_revoke(current: Option<&GrantRecord>, now: OffsetDateTime, bits: Option<PermissionSet>) -> Desired {
    let row = current.filter(|r| r.is_active(now))?;
    match bits {
        Some(bits) => {
            let remaining = row.permissions - bits;
            (remaining != row.permissions).then_some((remaining, row.expires_at))
        }
        None => Some((row.permissions, Some(now))),
    }
}

fn later_expiry(a: Option<OffsetDateTime>, b: Option<OffsetDateTime>) -> Option<OffsetDateTime> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.max(b)),
        _ => None,
    }
}
