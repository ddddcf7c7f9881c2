//! Shared types, errors, and configuration for Kosh.
//!
//! This crate provides common types used across all other crates:
//! - Money rounding helpers over `Decimal`
//! - Typed IDs for type-safe entity references
//! - Pagination types for list endpoints
//! - Application-wide error types
//! - Configuration management

pub mod config;
pub mod error;
pub mod types;

pub use config::{AppConfig, LedgerConfig};
pub use error::{AppError, AppResult};
