use dac_security::PermissionSet;
use permissions_sdk::PermissionsError;
use thiserror::Error;

/// Domain-level error of the permission engine.
///
/// Mirrors [`PermissionsError`] variant for variant; the split exists so the
/// domain can attach store context without leaking it through the SDK.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("authentication required")]
    Unauthenticated,

    #[error("forbidden: {reason}")]
    Forbidden { reason: String },

    #[error("self-escalation denied: granter lacks {missing}")]
    SelfEscalationDenied { missing: PermissionSet },

    #[error("permission store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("validation failed: {field}: {message}")]
    Validation { field: String, message: String },

    #[error("request cancelled")]
    Cancelled,
}

impl DomainError {
    #[must_use]
    pub fn forbidden(reason: impl Into<String>) -> Self {
        Self::Forbidden {
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Wraps a store failure. The source chain is flattened into the message
    /// so the error stays `Clone`.
    #[must_use]
    pub fn store(err: &anyhow::Error) -> Self {
        Self::StoreUnavailable(format!("{err:#}"))
    }
}

impl From<PermissionsError> for DomainError {
    fn from(e: PermissionsError) -> Self {
        match e {
            PermissionsError::Unauthenticated => Self::Unauthenticated,
            PermissionsError::Forbidden { reason } => Self::Forbidden { reason },
            PermissionsError::SelfEscalationDenied { missing } => {
                Self::SelfEscalationDenied { missing }
            }
            PermissionsError::StoreUnavailable(msg) => Self::StoreUnavailable(msg),
            PermissionsError::Validation { field, message } => Self::Validation { field, message },
            PermissionsError::Cancelled => Self::Cancelled,
        }
    }
}

impl From<DomainError> for PermissionsError {
    fn from(e: DomainError) -> Self {
        match e {
            DomainError::Unauthenticated => Self::Unauthenticated,
            DomainError::Forbidden { reason } => Self::Forbidden { reason },
            DomainError::SelfEscalationDenied { missing } => Self::SelfEscalationDenied { missing },
            DomainError::StoreUnavailable(msg) => Self::StoreUnavailable(msg),
            DomainError::Validation { field, message } => Self::Validation { field, message },
            DomainError::Cancelled => Self::Cancelled,
        }
    }
}
