//! Domain core of the AMM Assist chat client.
//!
//! Everything here is synchronous and UI-agnostic: the event stream decoder,
//! the frame interpreter and the conversation store that the UI observes.

pub mod config;
pub mod conversation;
pub mod error;
pub mod skill_catalog;
pub mod stream;

// Re-export common error type
pub use error::{AmmError, Result};
