//! Error types for switchboard-rs.
//!
//! Dispatch itself never fails outward: every rejection is reported on the
//! call. These errors cover configuration, roster files, runtime lookup and
//! the handling step.

use thiserror::Error;

use crate::model::call::Outcome;

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid call transition: {from:?} -> {to:?}")]
    InvalidTransition { from: Outcome, to: Outcome },

    #[error("call handling failed: {0}")]
    Handling(String),

    #[error("no tokio runtime: {0}")]
    Runtime(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
