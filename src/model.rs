//! Core data model.
//!
//! A call is a unit of work waiting to be answered. An employee is the
//! resource that answers it, one call at a time, in tier order.

pub mod call;
pub mod employee;

pub use call::{Call, CallId, Outcome, Reason};
pub use employee::{Availability, Employee, EmployeeId, Tier};
