//! Repository modules for data access

pub mod secret;

pub use secret::{SecretOrder, SecretQuery, SecretRepository, SortColumn};
