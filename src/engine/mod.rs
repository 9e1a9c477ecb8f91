//! Dispatch engine: admission control, employee assignment, held-call lifecycle.

pub mod dispatcher;
pub mod handler;
pub mod hold;

pub use dispatcher::{CallHandle, Dispatcher, DispatcherConfig, DispatcherStatus};
pub use handler::{CallHandler, HandlingTime, SimulatedHandler};
pub use hold::{HeldCall, HoldOutcome};
