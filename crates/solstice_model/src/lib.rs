//! Unified domain types for all Solstice entities.
//!
//! These types are the single source of truth. All interfaces (CLI, API
//! handlers, stores) should use these types.

mod types;

pub mod rules;

pub use types::*;
