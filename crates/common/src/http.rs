mod action_repository;
mod client;
mod config;
mod device_repository;
mod notification_service;
mod service_quota;
mod user_repository;

pub use action_repository::*;
pub use client::*;
pub use config::*;
pub use device_repository::*;
pub use notification_service::*;
pub use service_quota::*;
pub use user_repository::*;
