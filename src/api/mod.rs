//! # HTTP Surface
//!
//! Owner-scoped secret endpoints, the health probe and the OpenAPI document,
//! plus the error envelope shared with the request guards.

pub mod docs;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod server;

pub use error::ApiError;
pub use routes::{build_router, protect, ApiState};
pub use server::start_api_server;
