pub mod admin;
pub mod ledger;
pub mod pos;
pub mod qr;
pub mod voucher;

pub use admin::admin_config;
pub use ledger::ledger_config;
pub use pos::pos_config;
pub use qr::qr_config;
pub use voucher::voucher_config;
