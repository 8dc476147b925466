//! Event stream decoding and interpretation.
//!
//! - `decoder`: raw body chunks to [`Frame`]s
//! - `interpreter`: [`Frame`]s to [`Transition`]s

pub mod decoder;
pub mod interpreter;

pub use decoder::{Frame, FrameDecoder};
pub use interpreter::{Transition, interpret};
