//! Digital Distributor Core - Shared domain types.
//!
//! Used by every workspace member:
//! - `api` - The HTTP service (catalog, orders, reviews, support, analytics)
//! - `cli` - Migrations, database role passwords, employee provisioning
//! - `integration-tests` - HTTP surface tests
//!
//! # Architecture
//!
//! Only types and pure rules live here: no I/O, no database access, no HTTP.
//! The `postgres` feature adds `sqlx` encode/decode impls so the same types
//! can be bound to queries directly.
//!
//! # Modules
//!
//! - [`types`] - Typed IDs, emails, roles, status machines and the order
//!   auto-progression schedule

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
