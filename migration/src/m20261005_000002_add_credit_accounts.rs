use sea_orm_migration::prelude::*;

/// Investor outlet credits, investor group credits and media budgets share one shape.
#[derive(DeriveIden)]
enum CreditAccounts {
    Table,
    Id,
    Category,
    OwnerAccountId,
    Outlet,
    Balance,
    AnnualAllocation,
    SpentThisYear,
    AutoRenew,
    ExpiresAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(CreditAccounts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CreditAccounts::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(CreditAccounts::Category).string_len(24).not_null())
                    .col(
                        ColumnDef::new(CreditAccounts::OwnerAccountId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(CreditAccounts::Outlet).string_len(128).null())
                    .col(
                        ColumnDef::new(CreditAccounts::Balance)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(CreditAccounts::AnnualAllocation)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(CreditAccounts::SpentThisYear)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(CreditAccounts::AutoRenew)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(CreditAccounts::ExpiresAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CreditAccounts::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(CreditAccounts::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // 续期批处理按 (category, expires_at) 扫描
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_credit_accounts_category_expires")
                    .table(CreditAccounts::Table)
                    .col(CreditAccounts::Category)
                    .col(CreditAccounts::ExpiresAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("uq_credit_accounts_owner")
                    .table(CreditAccounts::Table)
                    .col(CreditAccounts::Category)
                    .col(CreditAccounts::OwnerAccountId)
                    .col(CreditAccounts::Outlet)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(CreditAccounts::Table).to_owned())
            .await?;
        Ok(())
    }
}
