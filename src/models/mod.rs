//! Data models

mod auth_key;
mod device;
mod user;
mod wechat_account;

pub use auth_key::*;
pub use device::*;
pub use user::*;
pub use wechat_account::*;
