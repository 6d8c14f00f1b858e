//! Tenant user groups: a flat table of `(id, parent_id, roles)` rows walked
//! on demand.

use std::collections::{BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

/// Configuration row of one group.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GroupConfig {
    pub id: Uuid,

    /// Parent group ID. `None` for root groups.
    #[serde(default)]
    pub parent_id: Option<Uuid>,

    /// Roles granted to members of this group and of every descendant.
    #[serde(default)]
    pub roles: Vec<String>,
}

/// In-memory group index.
#[derive(Debug, Clone, Default)]
pub struct GroupHierarchy {
    groups: HashMap<Uuid, GroupConfig>,
}

impl GroupHierarchy {
    #[must_use]
    pub fn from_config(groups: &[GroupConfig]) -> Self {
        Self {
            groups: groups.iter().map(|g| (g.id, g.clone())).collect(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Ancestors of `id` from the direct parent up to the root.
    ///
    /// The starting group is not included. The walk stops at an unknown
    /// parent or when it would revisit a group.
    #[must_use]
    pub fn ancestors(&self, id: Uuid) -> Vec<Uuid> {
        let mut ancestors = Vec::new();
        let mut visited = HashSet::new();
        visited.insert(id);

        let Some(group) = self.groups.get(&id) else {
            return ancestors;
        };
        let mut current_parent_id = group.parent_id;

        while let Some(parent_id) = current_parent_id {
            if !visited.insert(parent_id) {
                warn!(group_id = %id, %parent_id, "group hierarchy contains a cycle");
                break;
            }
            let Some(parent) = self.groups.get(&parent_id) else {
                break;
            };
            ancestors.push(parent_id);
            current_parent_id = parent.parent_id;
        }

        ancestors
    }

    /// Union of the roles of `groups` and all of their ancestors, sorted.
    /// Unknown group ids contribute nothing.
    #[must_use]
    pub fn effective_roles(&self, groups: &[Uuid]) -> Vec<String> {
        let mut roles = BTreeSet::new();
        for &id in groups {
            let chain = std::iter::once(id).chain(self.ancestors(id));
            for group in chain.filter_map(|g| self.groups.get(&g)) {
                roles.extend(group.roles.iter().cloned());
            }
        }
        roles.into_iter().collect()
    }
}
