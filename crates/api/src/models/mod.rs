//! Domain models returned by repositories and serialized by handlers.
//!
//! Database row types live next to their queries in [`crate::db`]; these are
//! the validated shapes the rest of the crate works with. JSON field names
//! are camelCase.

pub mod analytics;
pub mod catalog;
pub mod order;
pub mod review;
pub mod support;
pub mod user;
