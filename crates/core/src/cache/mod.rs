//! Request-keyed response cache split into named generations.
//!
//! This module provides the [`CacheStore`] seam the agent talks to and a
//! persistent implementation on SQLite with async access via tokio-rusqlite.
//! It supports:
//!
//! - Generations created on open and deleted wholesale (entries cascade)
//! - Keys derived from request identity using SHA-256 hashing
//! - Atomic batch writes for pre-population
//! - Automatic schema migrations and WAL mode for concurrent access

pub mod connection;
pub mod entries;
pub mod hash;
pub mod migrations;
pub mod store;

pub use crate::Error;

pub use connection::CacheDb;
pub use store::CacheStore;
