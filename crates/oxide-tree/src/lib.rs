//! # oxide-tree
//!
//! A compressed prefix tree for HTTP route patterns.
//!
//! This crate provides:
//! - Static, `:param` and `*catch-all` route patterns
//! - Lookup that backtracks, so static routes never shadow dynamic ones
//! - Trailing-slash recommendations for near misses
//! - Case-insensitive path correction
//! - Path cleaning for redirects
//!
//! ## Quick Start
//!
//! ```
//! use oxide_tree::{Node, Params};
//!
//! let mut root = Node::new();
//! root.insert("/users/:id", "show user").unwrap();
//! root.insert("/users/new", "new user form").unwrap();
//! root.insert("/static/*filepath", "assets").unwrap();
//!
//! let mut params = Params::new();
//! let mut skipped = Vec::new();
//! let found = root.get_value("/users/42", &mut params, &mut skipped, false);
//! assert_eq!(found.value, Some(&"show user"));
//! assert_eq!(found.full_path, "/users/:id");
//! assert_eq!(params.get("id"), Some("42"));
//! ```
//!
//! ## Pattern Syntax
//!
//! - `/users` matches exactly `/users`
//! - `/users/:id` captures one non-empty segment as `id`
//! - `/files/*filepath` captures the rest of the path, without the leading
//!   slash, as `filepath`; `/files/` matches with an empty value
//!
//! ## Trailing Slashes
//!
//! ```
//! use oxide_tree::{Node, Params};
//!
//! let mut root = Node::new();
//! root.insert("/docs/", ()).unwrap();
//!
//! let mut params = Params::new();
//! let mut skipped = Vec::new();
//! let found = root.get_value("/docs", &mut params, &mut skipped, false);
//! assert!(found.value.is_none());
//! assert!(found.tsr);
//! ```

mod error;
mod node;
mod params;
mod path;

pub use error::{InsertError, Result};
pub use node::{Node, NodeValue, SkippedNode};
pub use params::{Param, Params};
pub use path::{clean_path, count_params, count_sections};
