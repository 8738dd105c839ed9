//! Structured logging vocabulary.
//!
//! Library code only emits `tracing` events; installing a subscriber is left to the
//! host application.

pub mod events;
pub mod fields;
