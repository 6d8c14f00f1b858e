use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                with_grant_columns(
                    Table::create()
                        .table(TenantPermissions::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(TenantPermissions::UserId).uuid().not_null())
                        .col(ColumnDef::new(TenantPermissions::TenantId).uuid().not_null()),
                )
                .primary_key(
                    Index::create()
                        .col(TenantPermissions::UserId)
                        .col(TenantPermissions::TenantId),
                )
                .to_owned(),
            )
            .await?;

        manager
            .create_table(
                with_grant_columns(
                    Table::create()
                        .table(ContentTypePermissions::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(ContentTypePermissions::UserId).uuid().not_null())
                        .col(ColumnDef::new(ContentTypePermissions::TenantId).uuid().not_null())
                        .col(
                            ColumnDef::new(ContentTypePermissions::EntityType)
                                .string_len(128)
                                .not_null(),
                        ),
                )
                .primary_key(
                    Index::create()
                        .col(ContentTypePermissions::UserId)
                        .col(ContentTypePermissions::TenantId)
                        .col(ContentTypePermissions::EntityType),
                )
                .to_owned(),
            )
            .await?;

        manager
            .create_table(
                with_grant_columns(
                    Table::create()
                        .table(ResourcePermissions::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(ResourcePermissions::UserId).uuid().not_null())
                        .col(
                            ColumnDef::new(ResourcePermissions::EntityType)
                                .string_len(128)
                                .not_null(),
                        )
                        .col(ColumnDef::new(ResourcePermissions::ResourceId).uuid().not_null()),
                )
                .primary_key(
                    Index::create()
                        .col(ResourcePermissions::UserId)
                        .col(ResourcePermissions::EntityType)
                        .col(ResourcePermissions::ResourceId),
                )
                .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ResourcePermissions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ContentTypePermissions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(TenantPermissions::Table).to_owned())
            .await
    }
}

/// Columns every grant table carries next to its key.
fn with_grant_columns(table: &mut TableCreateStatement) -> &mut TableCreateStatement {
    table
        .col(ColumnDef::new(Grant::Permissions).big_integer().not_null())
        .col(ColumnDef::new(Grant::ExpiresAt).timestamp_with_time_zone())
        .col(ColumnDef::new(Grant::Revision).big_integer().not_null())
        .col(ColumnDef::new(Grant::GrantedBy).uuid().not_null())
        .col(
            ColumnDef::new(Grant::UpdatedAt)
                .timestamp_with_time_zone()
                .not_null(),
        )
}

#[derive(DeriveIden)]
enum Grant {
    Permissions,
    ExpiresAt,
    Revision,
    GrantedBy,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum TenantPermissions {
    Table,
    UserId,
    TenantId,
}

#[derive(DeriveIden)]
enum ContentTypePermissions {
    Table,
    UserId,
    TenantId,
    EntityType,
}

#[derive(DeriveIden)]
enum ResourcePermissions {
    Table,
    UserId,
    EntityType,
    ResourceId,
}
