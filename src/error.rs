//! Centralized error types for mimetree.
//!
//! Parsing itself is infallible: every input yields a message with at least
//! a root node, and decoding failures substitute empty defaults. The only
//! error surface is strict header lookup.

use thiserror::Error;

/// All errors produced by the mimetree library.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MimeError {
    /// The requested header is not present on the node.
    #[error("header '{0}' not found")]
    HeaderNotFound(String),
}

/// Convenience alias for `Result<T, MimeError>`.
pub type Result<T> = std::result::Result<T, MimeError>;
