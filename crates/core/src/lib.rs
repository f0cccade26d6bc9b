//! Core types and shared functionality for stowaway.
//!
//! This crate provides:
//! - Request/response model shared by the agent, client and store
//! - The static asset manifest
//! - Cache store trait with a SQLite backend
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod http;
pub mod manifest;

pub use cache::{CacheDb, CacheStore};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
pub use http::{Request, Response};
pub use manifest::Manifest;
