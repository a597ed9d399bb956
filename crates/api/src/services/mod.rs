//! Business logic that spans repositories.
//!
//! - `auth` - password login, registration and bearer tokens
//! - `order_status` - the background order auto-progression task

pub mod auth;
pub mod order_status;
