//! # domains
//!
//! Models, errors and repository ports for Rusty-Community: the vote/karma
//! engine and the comment/message thread arenas.

pub mod error;
pub mod models;
pub mod ports;

// Re-exporting for easier access in other crates
pub use error::*;
pub use models::*;
pub use ports::*;
