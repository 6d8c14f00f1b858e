use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use super::problem::Problem;
use crate::domain::error::DomainError;

/// Static error catalog of the REST surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Unauthenticated,
    Forbidden,
    SelfEscalationDenied,
    Validation,
    InvalidIdentity,
    StoreUnavailable,
    Cancelled,
}

struct ErrDef {
    status: u16,
    title: &'static str,
    code: &'static str,
}

impl ErrorCode {
    const fn def(self) -> ErrDef {
        match self {
            Self::Unauthenticated => ErrDef {
                status: 401,
                title: "Unauthorized",
                code: "PERMISSIONS_UNAUTHENTICATED",
            },
            Self::Forbidden => ErrDef {
                status: 403,
                title: "Forbidden",
                code: "PERMISSIONS_FORBIDDEN",
            },
            Self::SelfEscalationDenied => ErrDef {
                status: 403,
                title: "Self-escalation denied",
                code: "PERMISSIONS_SELF_ESCALATION_DENIED",
            },
            Self::Validation => ErrDef {
                status: 422,
                title: "Validation failed",
                code: "PERMISSIONS_VALIDATION",
            },
            Self::InvalidIdentity => ErrDef {
                status: 400,
                title: "Bad Request",
                code: "PERMISSIONS_INVALID_IDENTITY_HEADER",
            },
            Self::StoreUnavailable => ErrDef {
                status: 503,
                title: "Service Unavailable",
                code: "PERMISSIONS_STORE_UNAVAILABLE",
            },
            // nginx's "client closed request"
            Self::Cancelled => ErrDef {
                status: 499,
                title: "Client Closed Request",
                code: "PERMISSIONS_CANCELLED",
            },
        }
    }

    #[must_use]
    pub fn code(self) -> &'static str {
        self.def().code
    }
    pub fn with_context(
        self,
        detail: impl Into<String>,
        instance: &str,
        trace_id: Option<String>,
    ) -> Problem {
        let def = self.def();
        let status = StatusCode::from_u16(def.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Problem::new(status, def.title, detail)
            .with_type(format!("https://errors.cyberfabric.dev/{}", def.code))
            .with_code(def.code)
            .with_instance(instance)
            .with_trace_id(trace_id)
    }
}

/// Map a domain error to a problem document. Store details are logged, not
/// returned.
pub fn domain_error_to_problem(e: &DomainError, instance: &str) -> Problem {
    let trace_id = tracing::Span::current()
        .id()
        .map(|id| id.into_u64().to_string());

    match e {
        DomainError::Unauthenticated => {
            ErrorCode::Unauthenticated.with_context("Authentication required", instance, trace_id)
        }
        DomainError::Forbidden { reason } => {
            ErrorCode::Forbidden.with_context(reason.clone(), instance, trace_id)
        }
        DomainError::SelfEscalationDenied { missing } => ErrorCode::SelfEscalationDenied
            .with_context(
                format!("Granter does not hold: {missing}"),
                instance,
                trace_id,
            ),
        DomainError::Validation { field, message } => {
            ErrorCode::Validation.with_context(format!("{field}: {message}"), instance, trace_id)
        }
        DomainError::StoreUnavailable(_) => {
            tracing::error!(error = %e, "permission store failure surfaced to client");
            ErrorCode::StoreUnavailable.with_context(
                "Permission store is unavailable",
                instance,
                trace_id,
            )
        }
        DomainError::Cancelled => {
            ErrorCode::Cancelled.with_context("Request was cancelled", instance, trace_id)
        }
    }
}

/// A domain error bound to the request path it occurred on.
pub struct ApiError {
    pub error: DomainError,
    pub instance: String,
}

impl ApiError {
    #[must_use]
    pub fn new(error: DomainError, instance: impl Into<String>) -> Self {
        Self {
            error,
            instance: instance.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        domain_error_to_problem(&self.error, &self.instance).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use dac_security::PermissionType;

    #[test]
    fn statuses_follow_the_catalog() {
        let cases = [
            (DomainError::Unauthenticated, 401, "PERMISSIONS_UNAUTHENTICATED"),
            (DomainError::forbidden("role"), 403, "PERMISSIONS_FORBIDDEN"),
            (
                DomainError::SelfEscalationDenied {
                    missing: PermissionType::SHARE.into(),
                },
                403,
                "PERMISSIONS_SELF_ESCALATION_DENIED",
            ),
            (DomainError::validation("entity_type", "blank"), 422, "PERMISSIONS_VALIDATION"),
            (
                DomainError::StoreUnavailable("db down".to_owned()),
                503,
                "PERMISSIONS_STORE_UNAVAILABLE",
            ),
            (DomainError::Cancelled, 499, "PERMISSIONS_CANCELLED"),
        ];
        for (error, status, code) in cases {
            let p = domain_error_to_problem(&error, "/permissions/v1/check");
            assert_eq!(p.status.as_u16(), status, "{error}");
            assert_eq!(p.code, code);
            assert_eq!(p.instance, "/permissions/v1/check");
        }
    }

    #[test]
    fn store_details_are_not_exposed() {
        let p = domain_error_to_problem(
            &DomainError::StoreUnavailable("password=hunter2".to_owned()),
            "/",
        );
        assert!(!p.detail.contains("hunter2"));
    }

    #[test]
    fn escalation_names_missing_bits() {
        let p = domain_error_to_problem(
            &DomainError::SelfEscalationDenied {
                missing: PermissionType::EDIT | PermissionType::SHARE,
            },
            "/",
        );
        assert!(p.detail.contains("edit|share"));
    }
}
