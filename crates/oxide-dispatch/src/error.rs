//! Error types for route registration and chain execution.

use oxide_tree::InsertError;
use thiserror::Error;

/// Configuration errors raised while building an engine.
///
/// These surface before any request is served; the non-`try` registration
/// methods turn them into a panic.
#[derive(Debug, Error)]
pub enum RouterError {
    /// The route pattern was rejected by the tree.
    #[error(transparent)]
    Pattern(#[from] InsertError),

    /// The method token is empty.
    #[error("HTTP method can not be empty")]
    EmptyMethod,

    /// The method token is not an upper-case token.
    #[error("HTTP method '{0}' is not valid")]
    InvalidMethod(String),

    /// A route was registered without handlers.
    #[error("there must be at least one handler for '{0}'")]
    EmptyChain(String),

    /// Group middleware and route handlers together reach the abort cursor.
    #[error("too many handlers: {len} (must be below {limit})")]
    ChainTooLong {
        /// Combined length of the chain.
        len: usize,
        /// The exclusive upper bound.
        limit: usize,
    },

    /// A trusted proxy entry is neither an IP address nor a CIDR range.
    #[error("invalid trusted proxy '{entry}': {reason}")]
    InvalidProxy {
        /// The rejected entry.
        entry: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The configuration document could not be decoded.
    #[error("invalid engine configuration: {0}")]
    Config(#[from] serde_json::Error),
}

/// Result type alias for engine configuration.
pub type Result<T> = std::result::Result<T, RouterError>;

/// Why a handler chain stopped before running to completion.
///
/// Returned through [`HandlerResult`] and forwarded with `?` by every
/// enclosing `next()` call, so trailing code of outer middleware does not run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Halt {
    /// The chain was stopped on purpose. The engine swallows it silently.
    #[error("handler chain stopped")]
    Die,

    /// A handler failed. The engine logs it and answers 500 if nothing was
    /// written yet.
    #[error("handler fault: {0}")]
    Fault(String),
}

impl Halt {
    /// Creates a fault from any displayable error.
    pub fn fault(err: impl std::fmt::Display) -> Self {
        Self::Fault(err.to_string())
    }
}

/// What a handler returns.
pub type HandlerResult = std::result::Result<(), Halt>;
