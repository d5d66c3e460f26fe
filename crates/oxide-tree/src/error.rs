//! Error types for route insertion.

use thiserror::Error;

/// Errors raised while inserting a route pattern into a tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InsertError {
    /// The pattern does not begin with `/`.
    #[error("path must begin with '/': {0}")]
    MissingLeadingSlash(String),

    /// A `:` or `*` is not followed by a name.
    #[error("wildcards must be named with a non-empty name in path '{0}'")]
    EmptyWildcardName(String),

    /// Two wildcards share one path segment.
    #[error("only one wildcard per path segment is allowed, has: '{segment}' in path '{path}'")]
    MultipleWildcards {
        /// The offending segment.
        segment: String,
        /// The full pattern.
        path: String,
    },

    /// A catch-all is followed by more path.
    #[error("catch-all routes are only allowed at the end of the path in path '{0}'")]
    CatchAllNotLast(String),

    /// A catch-all does not directly follow a slash.
    #[error("no / before catch-all in path '{0}'")]
    CatchAllWithoutSlash(String),

    /// The same parameter name appears twice in one pattern.
    #[error("duplicate parameter name '{name}' in path '{path}'")]
    DuplicateParamName {
        /// The repeated name.
        name: String,
        /// The full pattern.
        path: String,
    },

    /// A wildcard with a different name is already bound at this position.
    #[error(
        "'{segment}' in new path '{path}' conflicts with existing wildcard '{existing}' in existing prefix '{prefix}'"
    )]
    WildcardConflict {
        /// The new wildcard segment.
        segment: String,
        /// The wildcard already registered at this position.
        existing: String,
        /// The pattern text leading up to the conflict.
        prefix: String,
        /// The full new pattern.
        path: String,
    },

    /// A value is already registered for exactly this pattern.
    #[error("handlers are already registered for path '{0}'")]
    DuplicateRoute(String),
}

/// Result type alias for tree operations.
pub type Result<T> = std::result::Result<T, InsertError>;
