//! # Domain Error Types
//!
//! Typed errors for the pure core. Storage and network failures live in the
//! `tapline-db` and `tapline-sync` crates; the only thing the core itself can
//! reject is malformed input.

use thiserror::Error;

/// Validation failures for scanned badge identifiers.
///
/// ## Design Principles
/// - Each variant carries enough context to log a useful rejection
/// - Validation failures are expected operational noise (misreads, damaged
///   tags), never fatal
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The scanner delivered an empty identifier.
    #[error("Badge identifier is empty")]
    EmptyBadgeId,

    /// The identifier exceeds the maximum credential length.
    #[error("Badge identifier too long: {len} characters (max {max})")]
    BadgeIdTooLong { len: usize, max: usize },

    /// The identifier contains characters no credential format produces.
    #[error("Badge identifier contains invalid character: {found:?}")]
    InvalidCharacter { found: char },
}
