pub use sea_orm_migration::prelude::*;

mod m20261001_000001_create_ledger_core;
mod m20261005_000002_add_credit_accounts;
mod m20261010_000003_add_audit_records;
mod m20261012_000004_add_birthday_rewards_and_streaks;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20261001_000001_create_ledger_core::Migration),
            Box::new(m20261005_000002_add_credit_accounts::Migration),
            Box::new(m20261010_000003_add_audit_records::Migration),
            Box::new(m20261012_000004_add_birthday_rewards_and_streaks::Migration),
        ]
    }
}
