use sea_orm_migration::prelude::*;

#[derive(DeriveIden)]
enum Accounts {
    Table,
    BirthdayMonth,
    BirthdayDay,
    StreakDays,
    LastVisitOn,
}

#[derive(DeriveIden)]
enum BirthdayRewards {
    Table,
    Id,
    AccountId,
    RewardYear,
    Points,
    CreatedAt,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // SQLite 每条 ALTER TABLE 只能带一个子句
        manager
            .alter_table(
                Table::alter()
                    .table(Accounts::Table)
                    .add_column(ColumnDef::new(Accounts::BirthdayMonth).small_integer().null())
                    .to_owned(),
            )
            .await?;
        manager
            .alter_table(
                Table::alter()
                    .table(Accounts::Table)
                    .add_column(ColumnDef::new(Accounts::BirthdayDay).small_integer().null())
                    .to_owned(),
            )
            .await?;
        manager
            .alter_table(
                Table::alter()
                    .table(Accounts::Table)
                    .add_column(
                        ColumnDef::new(Accounts::StreakDays)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .to_owned(),
            )
            .await?;
        manager
            .alter_table(
                Table::alter()
                    .table(Accounts::Table)
                    .add_column(ColumnDef::new(Accounts::LastVisitOn).date().null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(BirthdayRewards::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(BirthdayRewards::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(BirthdayRewards::AccountId).big_integer().not_null())
                    .col(ColumnDef::new(BirthdayRewards::RewardYear).integer().not_null())
                    .col(ColumnDef::new(BirthdayRewards::Points).big_integer().not_null())
                    .col(
                        ColumnDef::new(BirthdayRewards::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // unique (account_id, reward_year)
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("uq_birthday_rewards_account_year")
                    .table(BirthdayRewards::Table)
                    .col(BirthdayRewards::AccountId)
                    .col(BirthdayRewards::RewardYear)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(BirthdayRewards::Table).to_owned())
            .await?;
        for col in [
            Accounts::BirthdayMonth,
            Accounts::BirthdayDay,
            Accounts::StreakDays,
            Accounts::LastVisitOn,
        ] {
            manager
                .alter_table(
                    Table::alter()
                        .table(Accounts::Table)
                        .drop_column(col)
                        .to_owned(),
                )
                .await?;
        }
        Ok(())
    }
}
