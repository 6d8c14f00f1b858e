//! Permissions Module
//!
//! Three-layer discretionary access control: grants at tenant, content-type
//! and resource level are resolved into one decision, enforced around
//! command/query dispatch ([`domain::gate`]) and per field of graph-style
//! queries ([`domain::field_guard`]), and mutated through a service that
//! refuses self-escalation ([`domain::service`]).
//!
//! ## Public API
//!
//! The public API is defined in `permissions-sdk` and re-exported here:
//! - `PermissionsClient` - trait for in-process consumers
//! - `ResourceLocator`, `GrantKey`, `GrantRecord`, `EffectivePermission` - models
//! - `PermissionsError` - error types
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

// === PUBLIC API (from SDK) ===
pub use permissions_sdk::{
    EffectivePermission, GrantKey, GrantRecord, PermissionsClient, PermissionsError,
    ResourceLocator,
};

// === MODULE DEFINITION ===
pub mod module;
pub use module::{PermissionsModule, PermissionsModuleBuilder};

// === INTERNAL MODULES ===
// Exposed for integration tests and the server binary; only SDK types are a
// stable API.
#[doc(hidden)]
pub mod api;
#[doc(hidden)]
pub mod config;
#[doc(hidden)]
pub mod domain;
#[doc(hidden)]
pub mod infra;
