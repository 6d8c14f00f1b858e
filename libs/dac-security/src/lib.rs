#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Security primitives shared by the DAC permission engine and its callers.
//!
//! - [`Principal`] - the authenticated actor of one request
//! - [`PermissionType`] / [`PermissionSet`] - named capabilities and their bitmask

pub mod constants;
pub mod permission;
pub mod principal;

pub use permission::{ParsePermissionError, PermissionSet, PermissionType};
pub use principal::{Principal, PrincipalBuilder};
