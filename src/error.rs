//! Crate-wide error type.
//!
//! Three classes, per the design: I/O failure, codec (encode/decode)
//! failure, and detected invariant violations. Expected outcomes such as
//! "key not found" are never represented here — they are plain status
//! enums returned inside `Ok(..)` (see [`crate::tree`]).

use thiserror::Error;

/// Everything that can go wrong in this crate that is *not* an expected
/// status outcome of a public operation.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("encoding error: {0}")]
    Codec(#[from] bincode::Error),

    #[error("invariant violation: {0}")]
    Invariant(String),
}

/// Convenience alias used by every fallible operation in this crate.
pub type Result<T> = std::result::Result<T, Error>;
