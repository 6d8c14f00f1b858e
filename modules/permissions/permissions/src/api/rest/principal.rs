//! Caller identity from trusted edge headers.
//!
//! The authenticating edge sets `x-user-id`, `x-tenant-id`, `x-roles`
//! (comma separated) and `x-groups` (comma separated group ids). Group
//! memberships are expanded into role claims through the group hierarchy.
//! A request without `x-user-id` is anonymous and is rejected by the gate.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::request::Parts;
use dac_security::Principal;
use uuid::Uuid;

use super::error::ErrorCode;
use super::problem::Problem;
use crate::module::AppServices;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const TENANT_ID_HEADER: &str = "x-tenant-id";
pub const ROLES_HEADER: &str = "x-roles";
pub const GROUPS_HEADER: &str = "x-groups";

/// The principal of the current request.
#[derive(Debug, Clone)]
pub struct Caller(pub Principal);

impl FromRequestParts<Arc<AppServices>> for Caller {
    type Rejection = Problem;

    async fn from_request_parts(
        parts: &mut Parts,
        services: &Arc<AppServices>,
    ) -> Result<Self, Self::Rejection> {
        let instance = parts.uri.path().to_owned();
        let reject = |detail: String| {
            ErrorCode::InvalidIdentity.with_context(detail, &instance, None)
        };

        let Some(user_id) = uuid_header(&parts.headers, USER_ID_HEADER).map_err(reject)? else {
            return Ok(Self(Principal::anonymous()));
        };

        let mut builder = Principal::builder()
            .user_id(user_id)
            .roles(list_header(&parts.headers, ROLES_HEADER).map_err(reject)?);
        if let Some(tenant_id) = uuid_header(&parts.headers, TENANT_ID_HEADER).map_err(reject)? {
            builder = builder.tenant_id(tenant_id);
        }

        let groups = list_header(&parts.headers, GROUPS_HEADER)
            .map_err(reject)?
            .iter()
            .map(|g| {
                Uuid::parse_str(g).map_err(|_| reject(format!("{GROUPS_HEADER}: '{g}' is not a UUID")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        if !groups.is_empty() {
            builder = builder.roles(services.groups.effective_roles(&groups));
        }

        Ok(Self(builder.build()))
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Result<Option<&'a str>, String> {
    headers
        .get(name)
        .map(|v| v.to_str().map_err(|_| format!("{name}: not valid ASCII")))
        .transpose()
}

fn uuid_header(headers: &HeaderMap, name: &str) -> Result<Option<Uuid>, String> {
    match header_str(headers, name)?.map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => Uuid::parse_str(raw)
            .map(Some)
            .map_err(|_| format!("{name}: '{raw}' is not a UUID")),
    }
}

fn list_header(headers: &HeaderMap, name: &str) -> Result<Vec<String>, String> {
    Ok(header_str(headers, name)?
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default())
}
