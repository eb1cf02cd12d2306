pub mod accounts;
pub mod audit_records;
pub mod birthday_rewards;
pub mod credit_accounts;
pub mod ledger_entries;
pub mod voucher_instances;
pub mod vouchers;

pub use accounts as account_entity;
pub use audit_records as audit_record_entity;
pub use birthday_rewards as birthday_reward_entity;
pub use credit_accounts as credit_account_entity;
pub use ledger_entries as ledger_entry_entity;
pub use voucher_instances as voucher_instance_entity;
pub use vouchers as voucher_entity;

pub use accounts::AccountType;
pub use audit_records::AuditSeverity;
pub use credit_accounts::CreditCategory;
pub use ledger_entries::LedgerEntryKind;
pub use voucher_instances::{VoucherEvent, VoucherInstanceStatus};
pub use vouchers::VoucherType;
