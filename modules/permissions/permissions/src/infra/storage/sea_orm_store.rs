use async_trait::async_trait;
use permissions_sdk::{GrantKey, GrantRecord};
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveValue, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
};
use uuid::Uuid;

use super::entity::{content_type_permission, resource_permission, tenant_permission};
use super::mapper::bits_to_column;
use crate::domain::store::{GrantWrite, PermissionStore, UpsertOutcome};

/// Grant store over three composite-keyed tables.
///
/// Conditional writes: a first write is an insert that does nothing on a
/// key conflict; later writes update only while the stored revision still
/// matches. Zero affected rows means another writer got there first.
pub struct SeaOrmPermissionStore {
    db: DatabaseConnection,
}

impl SeaOrmPermissionStore {
    #[must_use]
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn insert(&self, write: &GrantWrite) -> anyhow::Result<u64> {
        let permissions = ActiveValue::Set(bits_to_column(write.permissions));
        let expires_at = ActiveValue::Set(write.expires_at);
        let revision = ActiveValue::Set(1);
        let granted_by = ActiveValue::Set(write.granted_by);
        let updated_at = ActiveValue::Set(write.updated_at);

        let inserted = match &write.key {
            GrantKey::Tenant { user_id, tenant_id } => {
                tenant_permission::Entity::insert(tenant_permission::ActiveModel {
                    user_id: ActiveValue::Set(*user_id),
                    tenant_id: ActiveValue::Set(*tenant_id),
                    permissions,
                    expires_at,
                    revision,
                    granted_by,
                    updated_at,
                })
                .on_conflict(
                    OnConflict::columns([
                        tenant_permission::Column::UserId,
                        tenant_permission::Column::TenantId,
                    ])
                    .do_nothing()
                    .to_owned(),
                )
                .exec_without_returning(&self.db)
                .await?
            }
            GrantKey::ContentType {
                user_id,
                tenant_id,
                entity_type,
            } => {
                content_type_permission::Entity::insert(content_type_permission::ActiveModel {
                    user_id: ActiveValue::Set(*user_id),
                    tenant_id: ActiveValue::Set(*tenant_id),
                    entity_type: ActiveValue::Set(entity_type.clone()),
                    permissions,
                    expires_at,
                    revision,
                    granted_by,
                    updated_at,
                })
                .on_conflict(
                    OnConflict::columns([
                        content_type_permission::Column::UserId,
                        content_type_permission::Column::TenantId,
                        content_type_permission::Column::EntityType,
                    ])
                    .do_nothing()
                    .to_owned(),
                )
                .exec_without_returning(&self.db)
                .await?
            }
            GrantKey::Resource {
                user_id,
                entity_type,
                resource_id,
            } => {
                resource_permission::Entity::insert(resource_permission::ActiveModel {
                    user_id: ActiveValue::Set(*user_id),
                    entity_type: ActiveValue::Set(entity_type.clone()),
                    resource_id: ActiveValue::Set(*resource_id),
                    permissions,
                    expires_at,
                    revision,
                    granted_by,
                    updated_at,
                })
                .on_conflict(
                    OnConflict::columns([
                        resource_permission::Column::UserId,
                        resource_permission::Column::EntityType,
                        resource_permission::Column::ResourceId,
                    ])
                    .do_nothing()
                    .to_owned(),
                )
                .exec_without_returning(&self.db)
                .await?
            }
        };
        Ok(inserted)
    }

    async fn update(&self, write: &GrantWrite, expected: i64) -> anyhow::Result<u64> {
        let permissions = ActiveValue::Set(bits_to_column(write.permissions));
        let expires_at = ActiveValue::Set(write.expires_at);
        let revision = ActiveValue::Set(expected + 1);
        let granted_by = ActiveValue::Set(write.granted_by);
        let updated_at = ActiveValue::Set(write.updated_at);

        let result = match &write.key {
            GrantKey::Tenant { user_id, tenant_id } => {
                use tenant_permission::{ActiveModel, Column, Entity};
                Entity::update_many()
                    .set(ActiveModel {
                        permissions,
                        expires_at,
                        revision,
                        granted_by,
                        updated_at,
                        ..Default::default()
                    })
                    .filter(Column::UserId.eq(*user_id))
                    .filter(Column::TenantId.eq(*tenant_id))
                    .filter(Column::Revision.eq(expected))
                    .exec(&self.db)
                    .await?
            }
            GrantKey::ContentType {
                user_id,
                tenant_id,
                entity_type,
            } => {
                use content_type_permission::{ActiveModel, Column, Entity};
                Entity::update_many()
                    .set(ActiveModel {
                        permissions,
                        expires_at,
                        revision,
                        granted_by,
                        updated_at,
                        ..Default::default()
                    })
                    .filter(Column::UserId.eq(*user_id))
                    .filter(Column::TenantId.eq(*tenant_id))
                    .filter(Column::EntityType.eq(entity_type.as_str()))
                    .filter(Column::Revision.eq(expected))
                    .exec(&self.db)
                    .await?
            }
            GrantKey::Resource {
                user_id,
                entity_type,
                resource_id,
            } => {
                use resource_permission::{ActiveModel, Column, Entity};
                Entity::update_many()
                    .set(ActiveModel {
                        permissions,
                        expires_at,
                        revision,
                        granted_by,
                        updated_at,
                        ..Default::default()
                    })
                    .filter(Column::UserId.eq(*user_id))
                    .filter(Column::EntityType.eq(entity_type.as_str()))
                    .filter(Column::ResourceId.eq(*resource_id))
                    .filter(Column::Revision.eq(expected))
                    .exec(&self.db)
                    .await?
            }
        };
        Ok(result.rows_affected)
    }
}

#[async_trait]
impl PermissionStore for SeaOrmPermissionStore {
    async fn get(&self, key: &GrantKey) -> anyhow::Result<Option<GrantRecord>> {
        let record = match key {
            GrantKey::Tenant { user_id, tenant_id } => {
                tenant_permission::Entity::find_by_id((*user_id, *tenant_id))
                    .one(&self.db)
                    .await?
                    .map(Into::into)
            }
            GrantKey::ContentType {
                user_id,
                tenant_id,
                entity_type,
            } => content_type_permission::Entity::find_by_id((
                *user_id,
                *tenant_id,
                entity_type.clone(),
            ))
            .one(&self.db)
            .await?
            .map(Into::into),
            GrantKey::Resource {
                user_id,
                entity_type,
                resource_id,
            } => resource_permission::Entity::find_by_id((
                *user_id,
                entity_type.clone(),
                *resource_id,
            ))
            .one(&self.db)
            .await?
            .map(Into::into),
        };
        Ok(record)
    }

    async fn upsert(&self, write: GrantWrite) -> anyhow::Result<UpsertOutcome> {
        let (affected, revision) = match write.expected_revision {
            None => (self.insert(&write).await?, 1),
            Some(expected) => (self.update(&write, expected).await?, expected + 1),
        };
        if affected == 0 {
            return Ok(UpsertOutcome::Conflict);
        }
        Ok(UpsertOutcome::Written(GrantRecord {
            key: write.key,
            permissions: write.permissions,
            expires_at: write.expires_at,
            revision,
            granted_by: write.granted_by,
            updated_at: write.updated_at,
        }))
    }

    async fn list_for_user(&self, user_id: Uuid) -> anyhow::Result<Vec<GrantRecord>> {
        let tenants = tenant_permission::Entity::find()
            .filter(tenant_permission::Column::UserId.eq(user_id))
            .order_by_asc(tenant_permission::Column::UpdatedAt)
            .all(&self.db)
            .await?;
        let content_types = content_type_permission::Entity::find()
            .filter(content_type_permission::Column::UserId.eq(user_id))
            .order_by_asc(content_type_permission::Column::UpdatedAt)
            .all(&self.db)
            .await?;
        let resources = resource_permission::Entity::find()
            .filter(resource_permission::Column::UserId.eq(user_id))
            .order_by_asc(resource_permission::Column::UpdatedAt)
            .all(&self.db)
            .await?;

        let mut records: Vec<GrantRecord> =
            Vec::with_capacity(tenants.len() + content_types.len() + resources.len());
        records.extend(tenants.into_iter().map(GrantRecord::from));
        records.extend(content_types.into_iter().map(GrantRecord::from));
        records.extend(resources.into_iter().map(GrantRecord::from));
        Ok(records)
    }
}
