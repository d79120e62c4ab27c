//! Library error taxonomy.

use thiserror::Error;

/// Convenience alias used across the crate.
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Every failure a construct can produce.
///
/// A failed operation never leaves partial results behind; the stream and
/// context that were threaded through the call are considered poisoned.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// The input value cannot be serialized by the description.
    #[error("building failed: {0}")]
    Build(String),
    /// The byte stream cannot be decoded by the description.
    #[error("parsing failed: {0}")]
    Parse(String),
    /// The description has no determinate size under the given context.
    #[error("sizeof failed: {0}")]
    Size(String),
    /// A user-supplied context function failed or returned an unusable value.
    #[error("contextual function failed: {0}")]
    Contextual(String),
}

impl Error {
    /// Shorthand for a [`Error::Build`] with a formatted message.
    pub fn build(msg: impl Into<String>) -> Self {
        Self::Build(msg.into())
    }

    /// Shorthand for a [`Error::Parse`] with a formatted message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Shorthand for a [`Error::Size`] with a formatted message.
    pub fn size(msg: impl Into<String>) -> Self {
        Self::Size(msg.into())
    }

    /// Shorthand for a [`Error::Contextual`] with a formatted message.
    pub fn contextual(msg: impl Into<String>) -> Self {
        Self::Contextual(msg.into())
    }
}
