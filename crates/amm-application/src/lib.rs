//! Application layer for AMM Assist.
//!
//! This crate wires the conversation store from `amm-core` to the transport
//! from `amm-interaction` and exposes the operations a UI shell calls.

pub mod chat_session;
pub mod telemetry;

pub use chat_session::{ChatSession, SendOutcome};
pub use telemetry::init_tracing;
