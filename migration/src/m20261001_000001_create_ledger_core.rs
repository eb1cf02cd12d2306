use sea_orm_migration::prelude::*;

#[derive(DeriveIden)]
enum Accounts {
    Table,
    Id,
    AccountType,
    DisplayName,
    PointsBalance,
    TotalSpend,
    PurchaseCount,
    CreatedAt,
    UpdatedAt,
}

/// Append-only; rows are never updated or deleted.
#[derive(DeriveIden)]
enum LedgerEntries {
    Table,
    Id,
    AccountId,
    CreditAccountId,
    Kind,
    PointsDelta,
    BalanceAfter,
    AmountValue,
    Outlet,
    StaffId,
    VoucherId,
    VoucherInstanceId,
    ReversesEntryId,
    Description,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Vouchers {
    Table,
    Id,
    Title,
    PointsRequired,
    CashValue,
    VoucherType,
    IsActive,
    ExpiresAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum VoucherInstances {
    Table,
    Id,
    PublicId,
    UserId,
    VoucherId,
    Status,
    ExpiresAt,
    UsedAt,
    UsedByStaffId,
    UsedAtOutlet,
    CreatedAt,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // 账户：points_balance 是 ledger_entries 的缓存
        manager
            .create_table(
                Table::create()
                    .table(Accounts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Accounts::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Accounts::AccountType).string_len(16).not_null())
                    .col(ColumnDef::new(Accounts::DisplayName).string_len(255).null())
                    .col(
                        ColumnDef::new(Accounts::PointsBalance)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Accounts::TotalSpend)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Accounts::PurchaseCount)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Accounts::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Accounts::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(LedgerEntries::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(LedgerEntries::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(LedgerEntries::AccountId).big_integer().not_null())
                    .col(ColumnDef::new(LedgerEntries::CreditAccountId).big_integer().null())
                    .col(ColumnDef::new(LedgerEntries::Kind).string_len(16).not_null())
                    .col(ColumnDef::new(LedgerEntries::PointsDelta).big_integer().not_null())
                    .col(ColumnDef::new(LedgerEntries::BalanceAfter).big_integer().not_null())
                    .col(ColumnDef::new(LedgerEntries::AmountValue).big_integer().null())
                    .col(ColumnDef::new(LedgerEntries::Outlet).string_len(128).null())
                    .col(ColumnDef::new(LedgerEntries::StaffId).big_integer().null())
                    .col(ColumnDef::new(LedgerEntries::VoucherId).big_integer().null())
                    .col(ColumnDef::new(LedgerEntries::VoucherInstanceId).big_integer().null())
                    .col(ColumnDef::new(LedgerEntries::ReversesEntryId).big_integer().null())
                    .col(ColumnDef::new(LedgerEntries::Description).text().null())
                    .col(
                        ColumnDef::new(LedgerEntries::CreatedAt)
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
                    .name("idx_ledger_entries_account")
                    .table(LedgerEntries::Table)
                    .col(LedgerEntries::AccountId)
                    .col(LedgerEntries::CreatedAt)
                    .to_owned(),
            )
            .await?;

        // 一条分录最多被冲正一次
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("uq_ledger_entries_reverses")
                    .table(LedgerEntries::Table)
                    .col(LedgerEntries::ReversesEntryId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Vouchers::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Vouchers::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Vouchers::Title).string_len(255).not_null())
                    .col(ColumnDef::new(Vouchers::PointsRequired).big_integer().not_null())
                    .col(
                        ColumnDef::new(Vouchers::CashValue)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Vouchers::VoucherType).string_len(16).not_null())
                    .col(
                        ColumnDef::new(Vouchers::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Vouchers::ExpiresAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Vouchers::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Vouchers::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(VoucherInstances::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(VoucherInstances::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(VoucherInstances::PublicId).uuid().not_null())
                    .col(ColumnDef::new(VoucherInstances::UserId).big_integer().not_null())
                    .col(ColumnDef::new(VoucherInstances::VoucherId).big_integer().not_null())
                    .col(
                        ColumnDef::new(VoucherInstances::Status)
                            .string_len(16)
                            .not_null()
                            .default("active"),
                    )
                    .col(
                        ColumnDef::new(VoucherInstances::ExpiresAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(VoucherInstances::UsedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(ColumnDef::new(VoucherInstances::UsedByStaffId).big_integer().null())
                    .col(ColumnDef::new(VoucherInstances::UsedAtOutlet).string_len(128).null())
                    .col(
                        ColumnDef::new(VoucherInstances::CreatedAt)
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
                    .name("uq_voucher_instances_public_id")
                    .table(VoucherInstances::Table)
                    .col(VoucherInstances::PublicId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_voucher_instances_user_status")
                    .table(VoucherInstances::Table)
                    .col(VoucherInstances::UserId)
                    .col(VoucherInstances::Status)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(VoucherInstances::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Vouchers::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(LedgerEntries::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Accounts::Table).to_owned())
            .await?;
        Ok(())
    }
}
