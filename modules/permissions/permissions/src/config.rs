//! Configuration for the permissions module.

use dac_security::constants::DEFAULT_ADMIN_ROLE;
use serde::{Deserialize, Serialize};

/// Module configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PermissionsConfig {
    /// Role claims that short-circuit resolution to ALLOW.
    pub admin_roles: Vec<String>,

    /// Upper bound on subjects accepted by one bulk grant.
    pub max_bulk_subjects: usize,

    /// Conditional-write retries before a merge gives up on contention.
    pub max_merge_retries: u32,

    /// Memoize decisions within one request.
    pub cache_enabled: bool,
}

impl Default for PermissionsConfig {
    fn default() -> Self {
        Self {
            admin_roles: vec![DEFAULT_ADMIN_ROLE.to_owned()],
            max_bulk_subjects: 500,
            max_merge_retries: 5,
            cache_enabled: true,
        }
    }
}
