//! Crate-wide error type.
//!
//! A small `thiserror` enum with a generic `Other` escape hatch for
//! storage-layer failures the kernel does not need to distinguish.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorldError {
    #[error("storage error: {0}")]
    Storage(String),

    #[error("invalid session token")]
    InvalidSession,

    #[error("no active character for user")]
    NoActiveCharacter,

    #[error("world record not found: {0}")]
    WorldNotFound(String),

    #[error("internal state invariant violated: {0}")]
    State(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, WorldError>;
