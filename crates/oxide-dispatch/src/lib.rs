//! # oxide-dispatch
//!
//! The request dispatch core of an HTTP framework.
//!
//! This crate provides:
//! - Per-method route trees with `:param` and `*catch-all` patterns
//! - Handler chains with onion-style middleware (`next`, `abort`, `die`)
//! - Route groups sharing a prefix and middleware
//! - Trailing-slash and fixed-path redirects, 404 and 405 fallbacks
//! - Pooled per-request contexts with metadata, errors and output helpers
//!
//! ## Quick Start
//!
//! ```
//! use oxide_dispatch::{handlers, Context, Engine, Request, RequestContext, Routes};
//!
//! let mut engine = Engine::new();
//! engine.get("/", handlers![|c: &mut Context| {
//!     c.string(200, "Hello, World!");
//!     Ok(())
//! }]);
//! engine.get("/users/:id", handlers![|c: &mut Context| {
//!     let id = c.param("id").to_string();
//!     c.json(200, &serde_json::json!({ "id": id }))
//! }]);
//!
//! let response = engine.serve(Request::get("/users/123"));
//! assert_eq!(response.status, 200);
//! assert_eq!(response.body_string().as_deref(), Some(r#"{"id":"123"}"#));
//! ```
//!
//! ## Middleware
//!
//! A handler that calls [`RequestContext::next`] wraps every handler after
//! it. [`RequestContext::abort`] stops the pending handlers once the current
//! one returns; [`RequestContext::die`] unwinds immediately.
//!
//! ```
//! use oxide_dispatch::{handlers, Context, Engine, Request, RequestContext, Routes};
//!
//! let mut engine = Engine::new();
//! engine.use_middleware(handlers![|c: &mut Context| {
//!     if c.get_header("Authorization").is_none() {
//!         return c.die_with_status(401);
//!     }
//!     c.next()
//! }]);
//! engine.get("/private", handlers![|c: &mut Context| {
//!     c.string(200, "secret");
//!     Ok(())
//! }]);
//!
//! assert_eq!(engine.serve(Request::get("/private")).status, 401);
//! ```
//!
//! ## Route Groups
//!
//! ```
//! use oxide_dispatch::{handlers, Context, Engine, Request, Routes};
//!
//! let mut engine = Engine::new();
//! let mut api = engine.group("/api/v1", Vec::new());
//! api.get("/users", handlers![|c: &mut Context| {
//!     c.string(200, "users");
//!     Ok(())
//! }]);
//!
//! assert_eq!(engine.serve(Request::get("/api/v1/users")).status, 200);
//! ```

mod client_ip;
mod config;
mod context;
mod engine;
mod error;
mod errors;
mod executor;
mod group;
mod method;
mod middleware;
mod pool;
mod request;
mod response;
mod tree;

pub use client_ip::{remote_ip, ClientIpResolver};
pub use config::{ClientIpConfig, EngineConfig};
pub use context::{Context, ContextSizing, RequestContext, Value};
pub use engine::Engine;
pub use error::{Halt, HandlerResult, Result, RouterError};
pub use errors::{BoxError, Error, ErrorType, Errors};
pub use executor::{
    handler, last_name, Executor, Handler, HandlersChain, ABORT_INDEX, MAX_CHAIN_LEN,
};
pub use group::{combine_handlers, join_paths, RouterGroup, Routes};
pub use method::Method;
pub use middleware::{logger, recovery};
pub use oxide_tree::{clean_path, Param, Params};
pub use pool::ContextPool;
pub use request::{parse_urlencoded, Request};
pub use response::{Response, ResponseWriter};
pub use tree::{MethodTree, MethodTrees, RouteInfo};

/// Builds a `Vec` of [`Handler`]s from closures or functions.
///
/// ```
/// use oxide_dispatch::{handlers, Context, Handler};
///
/// fn index(_: &mut Context) -> oxide_dispatch::HandlerResult {
///     Ok(())
/// }
///
/// let chain: Vec<Handler<Context>> = handlers![index, |_: &mut Context| Ok(())];
/// assert_eq!(chain.len(), 2);
/// ```
#[macro_export]
macro_rules! handlers {
    ($($h:expr),* $(,)?) => {
        vec![$($crate::handler($h)),*]
    };
}
