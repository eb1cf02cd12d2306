use sea_orm_migration::prelude::*;

#[derive(DeriveIden)]
enum AuditRecords {
    Table,
    Id,
    EntityType,
    EntityId,
    Action,
    ActorId,
    Before,
    After,
    Severity,
    Success,
    CreatedAt,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(AuditRecords::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AuditRecords::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(AuditRecords::EntityType).string_len(64).not_null())
                    .col(ColumnDef::new(AuditRecords::EntityId).string_len(64).not_null())
                    .col(ColumnDef::new(AuditRecords::Action).string_len(64).not_null())
                    .col(ColumnDef::new(AuditRecords::ActorId).big_integer().null())
                    .col(ColumnDef::new(AuditRecords::Before).json().null())
                    .col(ColumnDef::new(AuditRecords::After).json().null())
                    .col(
                        ColumnDef::new(AuditRecords::Severity)
                            .string_len(16)
                            .not_null()
                            .default("info"),
                    )
                    .col(
                        ColumnDef::new(AuditRecords::Success)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(AuditRecords::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_audit_records_entity")
                    .table(AuditRecords::Table)
                    .col(AuditRecords::EntityType)
                    .col(AuditRecords::EntityId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(AuditRecords::Table).to_owned())
            .await?;
        Ok(())
    }
}
