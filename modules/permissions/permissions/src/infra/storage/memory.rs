use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use permissions_sdk::{GrantKey, GrantRecord};
use uuid::Uuid;

use crate::domain::store::{GrantWrite, PermissionStore, UpsertOutcome};

/// Process-local grant store. Used by `--mock` runs and tests.
#[derive(Debug, Default)]
pub struct InMemoryPermissionStore {
    rows: RwLock<HashMap<GrantKey, GrantRecord>>,
}

impl InMemoryPermissionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows across all layers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }
}

#[async_trait]
impl PermissionStore for InMemoryPermissionStore {
    async fn get(&self, key: &GrantKey) -> anyhow::Result<Option<GrantRecord>> {
        Ok(self.rows.read().get(key).cloned())
    }

    async fn upsert(&self, write: GrantWrite) -> anyhow::Result<UpsertOutcome> {
        let mut rows = self.rows.write();
        let current = rows.get(&write.key).map(|r| r.revision);
        if current != write.expected_revision {
            return Ok(UpsertOutcome::Conflict);
        }
        let record = GrantRecord {
            key: write.key.clone(),
            permissions: write.permissions,
            expires_at: write.expires_at,
            revision: current.unwrap_or(0) + 1,
            granted_by: write.granted_by,
            updated_at: write.updated_at,
        };
        rows.insert(write.key, record.clone());
        Ok(UpsertOutcome::Written(record))
    }

    async fn list_for_user(&self, user_id: Uuid) -> anyhow::Result<Vec<GrantRecord>> {
        let mut rows: Vec<GrantRecord> = self
            .rows
            .read()
            .values()
            .filter(|r| r.key.user_id() == user_id)
            .cloned()
            .collect();
        rows.sort_by_key(|r| (r.key.layer(), r.updated_at));
        Ok(rows)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use dac_security::{PermissionSet, PermissionType};
    use time::OffsetDateTime;

    fn write(key: &GrantKey, permissions: PermissionSet, expected: Option<i64>) -> GrantWrite {
        GrantWrite {
            key: key.clone(),
            permissions,
            expires_at: None,
            granted_by: Uuid::nil(),
            updated_at: OffsetDateTime::UNIX_EPOCH,
            expected_revision: expected,
        }
    }

    #[tokio::test]
    async fn conditional_writes_detect_stale_revisions() {
        let store = InMemoryPermissionStore::new();
        let key = GrantKey::Tenant {
            user_id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
        };

        let UpsertOutcome::Written(first) = store
            .upsert(write(&key, PermissionType::READ.into(), None))
            .await
            .unwrap()
        else {
            panic!("first insert must succeed");
        };
        assert_eq!(first.revision, 1);

        // Second insert-only write loses.
        assert_eq!(
            store
                .upsert(write(&key, PermissionType::EDIT.into(), None))
                .await
                .unwrap(),
            UpsertOutcome::Conflict
        );

        let UpsertOutcome::Written(second) = store
            .upsert(write(&key, PermissionType::EDIT.into(), Some(1)))
            .await
            .unwrap()
        else {
            panic!("update at current revision must succeed");
        };
        assert_eq!(second.revision, 2);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn lists_only_rows_of_the_user() {
        let store = InMemoryPermissionStore::new();
        let alice = Uuid::new_v4();
        let tenant = Uuid::new_v4();
        for key in [
            GrantKey::Tenant {
                user_id: alice,
                tenant_id: tenant,
            },
            GrantKey::Resource {
                user_id: alice,
                entity_type: "Post".to_owned(),
                resource_id: Uuid::new_v4(),
            },
            GrantKey::Tenant {
                user_id: Uuid::new_v4(),
                tenant_id: tenant,
            },
        ] {
            store
                .upsert(write(&key, PermissionType::READ.into(), None))
                .await
                .unwrap();
        }

        let rows = store.list_for_user(alice).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.key.user_id() == alice));
    }
}
