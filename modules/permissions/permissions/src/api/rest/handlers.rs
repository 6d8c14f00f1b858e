use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::Uri;
use dac_security::Principal;
use permissions_sdk::{
    BulkGrantReport, BulkGrantRequest, EffectivePermission, GrantRecord, GrantRequest,
    RevokeRequest,
};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::info;
use uuid::Uuid;

use super::dto::{CheckParams, EffectivePermissionsDto, GrantRecordDto, LocatorParams};
use super::error::{ApiError, ApiResult};
use super::principal::Caller;
use crate::domain::cache::RequestScope;
use crate::domain::clock::Clock;
use crate::domain::requests::{
    BulkGrantCommand, CheckQuery, EffectiveQuery, GrantCommand, ListGrantsQuery, RevokeCommand,
};
use crate::module::AppServices;

/// Scope of one HTTP request. The returned guard cancels the scope when the
/// handler future is dropped, e.g. on client disconnect.
fn request_scope(services: &AppServices, principal: Principal) -> (RequestScope, DropGuard) {
    let cancel = CancellationToken::new();
    let guard = cancel.clone().drop_guard();
    (services.new_scope(principal, cancel), guard)
}

pub(super) async fn grant(
    State(services): State<Arc<AppServices>>,
    uri: Uri,
    Caller(principal): Caller,
    Json(request): Json<GrantRequest>,
) -> ApiResult<Json<GrantRecord>> {
    info!(
        granter_id = %principal.user_id(),
        subject_id = %request.subject_user_id,
        level = request.target.level.as_str(),
        "Granting permissions"
    );
    let (scope, _guard) = request_scope(&services, principal);
    let record = services
        .gate
        .dispatch(&scope, &*services.mutations, GrantCommand(request))
        .await
        .map_err(|e| ApiError::new(e, uri.path()))?;
    Ok(Json(record))
}

pub(super) async fn bulk_grant(
    State(services): State<Arc<AppServices>>,
    uri: Uri,
    Caller(principal): Caller,
    Json(request): Json<BulkGrantRequest>,
) -> ApiResult<Json<BulkGrantReport>> {
    info!(
        granter_id = %principal.user_id(),
        subjects = request.subject_user_ids.len(),
        level = request.target.level.as_str(),
        "Bulk granting permissions"
    );
    let (scope, _guard) = request_scope(&services, principal);
    let report = services
        .gate
        .dispatch(&scope, &*services.mutations, BulkGrantCommand(request))
        .await
        .map_err(|e| ApiError::new(e, uri.path()))?;
    Ok(Json(report))
}

pub(super) async fn revoke(
    State(services): State<Arc<AppServices>>,
    uri: Uri,
    Caller(principal): Caller,
    Json(request): Json<RevokeRequest>,
) -> ApiResult<Json<Option<GrantRecord>>> {
    info!(
        revoker_id = %principal.user_id(),
        subject_id = %request.subject_user_id,
        level = request.target.level.as_str(),
        "Revoking permissions"
    );
    let (scope, _guard) = request_scope(&services, principal);
    let record = services
        .gate
        .dispatch(&scope, &*services.mutations, RevokeCommand(request))
        .await
        .map_err(|e| ApiError::new(e, uri.path()))?;
    Ok(Json(record))
}

pub(super) async fn list_grants(
    State(services): State<Arc<AppServices>>,
    uri: Uri,
    Caller(principal): Caller,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<Vec<GrantRecordDto>>> {
    let (scope, _guard) = request_scope(&services, principal);
    let query = ListGrantsQuery {
        user_id,
        admin_roles: Arc::clone(&services.admin_roles),
    };
    let records = services
        .gate
        .dispatch(&scope, &*services.mutations, query)
        .await
        .map_err(|e| ApiError::new(e, uri.path()))?;

    let now = services.resolver.clock().now();
    Ok(Json(
        records
            .into_iter()
            .map(|r| GrantRecordDto::new(r, now))
            .collect(),
    ))
}

pub(super) async fn effective(
    State(services): State<Arc<AppServices>>,
    uri: Uri,
    Caller(principal): Caller,
    Query(params): Query<LocatorParams>,
) -> ApiResult<Json<EffectivePermissionsDto>> {
    let (scope, _guard) = request_scope(&services, principal);
    let query = EffectiveQuery {
        locator: params.into(),
    };
    let permissions = services
        .gate
        .dispatch(&scope, &*services.resolver, query)
        .await
        .map_err(|e| ApiError::new(e, uri.path()))?;
    Ok(Json(EffectivePermissionsDto { permissions }))
}

pub(super) async fn check(
    State(services): State<Arc<AppServices>>,
    uri: Uri,
    Caller(principal): Caller,
    Query(params): Query<CheckParams>,
) -> ApiResult<Json<EffectivePermission>> {
    let (scope, _guard) = request_scope(&services, principal);
    let (permission, locator) = params.into_parts();
    let decision = services
        .gate
        .dispatch(&scope, &*services.resolver, CheckQuery { permission, locator })
        .await
        .map_err(|e| ApiError::new(e, uri.path()))?;
    Ok(Json(decision))
}
