//! # switchboard-rs
//!
//! Dispatches incoming calls to a staffed pool of employees under a bounded
//! number of in-flight calls.
//!
//! Calls that find no free employee are held in a FIFO queue until an
//! employee frees up or the hold timer expires. Calls beyond the concurrency
//! limit are rejected on the spot.

pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod telemetry;
