//! SQLite storage implementation for PriceVault.
//!
//! This crate provides all database-related functionality using Diesel ORM with SQLite.
//! It implements the store traits defined in `pricevault-core` and contains:
//! - Database connection pooling and management
//! - Diesel migrations
//! - The durable price tier and the shared rate-budget counters
//! - Database-specific model types (with Diesel derives)
//!
//! # Architecture
//!
//! This crate is the only place in the workspace where Diesel dependencies exist.
//! `core` is database-agnostic and works with traits.
//!
//! ```text
//!          core (engine)
//!                  │
//!                  ▼
//!          storage-sqlite (this crate)
//!                  │
//!                  ▼
//!              SQLite DB
//! ```

pub mod db;
pub mod errors;
pub mod schema;

// Store implementations
pub mod prices;
pub mod rate_budget;

// Re-export database utilities
pub use db::{
    create_pool, get_connection, get_db_path, init, open, run_migrations, spawn_writer,
    DbConnection, DbPool, WriteHandle,
};

pub use prices::PriceRepository;
pub use rate_budget::SqliteBudgetStore;

// Re-export storage errors and conversion helpers
pub use errors::{IntoCore, StorageError};

// Re-export from pricevault-core for convenience
pub use pricevault_core::errors::{DatabaseError, Error, Result};
