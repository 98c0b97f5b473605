//! Funnel API - the thin REST layer behind the registration wizard
//!
//! - Reference data: states, regions, benefits
//! - Candidate registration with duplicate-email conflicts
//! - Mock PIX payments charging the configured kit amount
//! - Vehicle lookup proxy over the configured upstream backends
//!
//! Every error body is `{"error": "<message>"}`.

#![warn(unreachable_pub)]

pub mod config;
pub mod context;
pub mod error;
mod handlers;
pub mod repository;
pub mod routes;

pub use config::ServerConfig;
pub use context::AppContext;
pub use error::{ApiError, ConfigError, RepositoryError};
pub use repository::{CatalogRepository, InMemoryCatalog};
pub use routes::routes;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
