pub mod account;
pub mod credit;
pub mod ledger;
pub mod pagination;
pub mod pos;
pub mod qr;
pub mod renewal;
pub mod voucher;

pub use account::*;
pub use credit::*;
pub use ledger::*;
pub use pagination::*;
pub use pos::*;
pub use qr::*;
pub use renewal::*;
pub use voucher::*;
