//! Permissions SDK
//!
//! This crate provides the public API for the `permissions` module:
//!
//! - [`PermissionsClient`] - Public API trait for consumers
//! - [`ResourceLocator`], [`GrantKey`], [`GrantRecord`], [`EffectivePermission`] - Models
//! - [`PermissionsError`] - Error types
//!
//! ## Usage
//!
//! ```ignore
//! use permissions_sdk::{PermissionsClient, ResourceLocator};
//! use dac_security::PermissionType;
//!
//! let locator = ResourceLocator::resource("Post", post_id, Some(tenant_id));
//! let decision = client.check(&principal, PermissionType::COMMENT, &locator).await?;
//! if decision.granted { /* ... */ }
//! ```

pub mod api;
pub mod error;
pub mod models;

pub use api::PermissionsClient;
pub use error::PermissionsError;
pub use models::{
    BulkGrantReport, BulkGrantRequest, DecisionBasis, EffectivePermission, GrantKey, GrantRecord,
    GrantRequest, GrantTarget, PermissionLayer, PermissionsErrorKind, ResourceLocator, RevokeRequest,
    SubjectFailure,
};
