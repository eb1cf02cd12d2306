pub mod account_service;
pub mod audit_service;
pub mod birthday_reward_service;
pub mod credit_service;
pub mod ledger_service;
pub mod pos_service;
pub mod renewal_service;
pub mod voucher_service;

pub use account_service::*;
pub use audit_service::*;
pub use birthday_reward_service::*;
pub use credit_service::*;
pub use ledger_service::*;
pub use pos_service::*;
pub use renewal_service::*;
pub use voucher_service::*;
