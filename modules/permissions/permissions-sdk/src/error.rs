//! Error types for the permissions module.

use dac_security::PermissionSet;
use thiserror::Error;

/// Errors surfaced by the permission engine.
///
/// `Unauthenticated`, `Forbidden` and `SelfEscalationDenied` are expected
/// outcomes of an access decision. `StoreUnavailable` and `Cancelled` are
/// neither allow nor deny and must never be treated as either.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PermissionsError {
    /// The request carried no authenticated principal.
    #[error("authentication required")]
    Unauthenticated,

    /// The principal lacks a required role, permission or predicate.
    #[error("forbidden: {reason}")]
    Forbidden { reason: String },

    /// The granter tried to delegate capabilities it does not hold itself.
    #[error("self-escalation denied: granter lacks {missing}")]
    SelfEscalationDenied { missing: PermissionSet },

    /// The grant store could not be reached or failed.
    #[error("permission store unavailable: {0}")]
    StoreUnavailable(String),

    /// Malformed locator or request.
    #[error("validation failed: {field}: {message}")]
    Validation { field: String, message: String },

    /// The request was cancelled before a decision was reached.
    #[error("request cancelled")]
    Cancelled,
}

impl PermissionsError {
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

    /// `true` for outcomes of an access decision, as opposed to
    /// infrastructure or input failures.
    #[must_use]
    pub fn is_access_denial(&self) -> bool {
        matches!(
            self,
            Self::Unauthenticated | Self::Forbidden { .. } | Self::SelfEscalationDenied { .. }
        )
    }
}
