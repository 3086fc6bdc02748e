//! Shared types and utilities for the booruvault local booru cache.

pub mod paths;
pub mod protocol;
pub mod types;

pub use paths::*;
pub use protocol::*;
pub use types::*;
