//! Business logic services

pub mod auth;
pub mod gateway;

pub use auth::AuthService;
pub use gateway::{GatewayClient, GatewayEnvelope};
