//! Error types for the sink pipeline.
//!
//! Every failure aborts the traversal that raised it; nothing in this crate
//! retries or recovers. The only silent outcomes are the deliberate field
//! omissions performed by [`CycleGuard`](crate::CycleGuard) and
//! [`FilterSink`](crate::FilterSink), and those are not errors.
//!
//! ## Error Categories
//!
//! - **Protocol violations**: a sink method called outside its allowed state
//! - **Schema mismatches**: a reader expected one type name and found another
//! - **Configuration errors**: bad format identifiers or codecs, raised lazily
//!   at the field that uses them
//! - **Unsupported operations**: a sink asked to do something it does not implement
//!
//! ## Examples
//!
//! ```rust
//! use sinkchain::{Error, TreeSink};
//!
//! let sink = TreeSink::new();
//! let err = sink.finish().unwrap_err();
//! assert!(matches!(err, Error::IncompleteTraversal));
//! assert!(err.is_protocol_violation());
//! ```

use std::fmt;
use thiserror::Error;

/// Represents all possible errors raised while driving a sink chain.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// A sink method was called outside its allowed state.
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    /// `finish()` was called before any value was written.
    #[error("Protocol violation: traversal finished before any value was written")]
    IncompleteTraversal,

    /// A reader expected one type name or node kind and found another.
    #[error("Schema mismatch: expected {expected}, found {found}")]
    SchemaMismatch { expected: String, found: String },

    /// Misconfigured format identifier or codec.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The sink deliberately does not implement the requested operation.
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// Custom error
    #[error("Error: {0}")]
    Custom(String),
}

impl Error {
    /// Creates a protocol violation error.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use sinkchain::Error;
    ///
    /// let err = Error::protocol("field write after end_structure");
    /// assert!(err.to_string().contains("end_structure"));
    /// ```
    pub fn protocol(msg: &str) -> Self {
        Error::ProtocolViolation(msg.to_string())
    }

    /// Creates a schema mismatch error.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use sinkchain::Error;
    ///
    /// let err = Error::schema_mismatch("Node", "User");
    /// assert!(err.to_string().contains("expected Node"));
    /// ```
    pub fn schema_mismatch(expected: &str, found: &str) -> Self {
        Error::SchemaMismatch {
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }

    /// Creates a configuration error.
    pub fn configuration(msg: &str) -> Self {
        Error::Configuration(msg.to_string())
    }

    /// Creates an unsupported operation error.
    pub fn unsupported(operation: &str) -> Self {
        Error::UnsupportedOperation(operation.to_string())
    }

    /// Creates a custom error with a display message.
    pub fn custom<T: fmt::Display>(msg: T) -> Self {
        Error::Custom(msg.to_string())
    }

    /// Returns `true` for [`Error::ProtocolViolation`] and [`Error::IncompleteTraversal`].
    #[must_use]
    pub fn is_protocol_violation(&self) -> bool {
        matches!(self, Error::ProtocolViolation(_) | Error::IncompleteTraversal)
    }
}

impl serde::de::Error for Error {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Error::Custom(msg.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Custom(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
