//! HTTP request handlers organized by resource type

pub mod health;
pub mod pagination;
pub mod secrets;

pub use health::health_handler;
pub use secrets::{
    delete_secret_handler, get_secret_handler, list_secrets_handler, restore_secret_handler,
};
