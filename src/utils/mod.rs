pub mod jwt;
pub mod qr_token;

pub use jwt::*;
pub use qr_token::*;
