//! Core types for Digital Distributor.

pub mod email;
pub mod id;
pub mod progression;
pub mod role;
pub mod status;

pub use email::{Email, EmailError};
pub use id::*;
pub use progression::{AutoProgression, ProgressionStep};
pub use role::{DbRole, Role, RoleParseError};
pub use status::*;
