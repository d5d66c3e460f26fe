//! Route registration and route groups.

use oxide_tree::clean_path;

use crate::context::RequestContext;
use crate::engine::Engine;
use crate::error::{Result, RouterError};
use crate::executor::{Handler, MAX_CHAIN_LEN};
use crate::method::Method;

/// Route registration shared by [`Engine`] and [`RouterGroup`].
///
/// The non-`try` methods treat a rejected route as a fatal configuration
/// error and panic with its message.
pub trait Routes<C: RequestContext> {
    /// Registers `handlers` for `method` at `path`, relative to this scope.
    ///
    /// # Errors
    ///
    /// Returns an error when the method or pattern is invalid, the pattern is
    /// already registered, no handler is given or the combined chain is too
    /// long.
    fn try_handle(&mut self, method: &str, path: &str, handlers: Vec<Handler<C>>)
        -> Result<&mut Self>;

    /// Appends middleware to this scope.
    ///
    /// # Errors
    ///
    /// Returns an error when the scope's middleware would exceed the chain
    /// length cap.
    fn try_use_middleware(&mut self, middleware: Vec<Handler<C>>) -> Result<&mut Self>;

    /// Returns the absolute path routes of this scope are registered under.
    fn base_path(&self) -> &str;

    /// Registers `handlers` for `method` at `path`.
    ///
    /// # Panics
    ///
    /// Panics when the route is rejected; see [`try_handle`](Self::try_handle).
    #[track_caller]
    fn handle(&mut self, method: &str, path: &str, handlers: Vec<Handler<C>>) -> &mut Self {
        match self.try_handle(method, path, handlers) {
            Ok(scope) => scope,
            Err(e) => panic!("{e}"),
        }
    }

    /// Appends middleware to this scope.
    ///
    /// # Panics
    ///
    /// Panics when the middleware is rejected; see
    /// [`try_use_middleware`](Self::try_use_middleware).
    #[track_caller]
    fn use_middleware(&mut self, middleware: Vec<Handler<C>>) -> &mut Self {
        match self.try_use_middleware(middleware) {
            Ok(scope) => scope,
            Err(e) => panic!("{e}"),
        }
    }

    /// Registers a GET route.
    #[track_caller]
    fn get(&mut self, path: &str, handlers: Vec<Handler<C>>) -> &mut Self {
        self.handle(Method::Get.as_str(), path, handlers)
    }

    /// Registers a POST route.
    #[track_caller]
    fn post(&mut self, path: &str, handlers: Vec<Handler<C>>) -> &mut Self {
        self.handle(Method::Post.as_str(), path, handlers)
    }

    /// Registers a PUT route.
    #[track_caller]
    fn put(&mut self, path: &str, handlers: Vec<Handler<C>>) -> &mut Self {
        self.handle(Method::Put.as_str(), path, handlers)
    }

    /// Registers a PATCH route.
    #[track_caller]
    fn patch(&mut self, path: &str, handlers: Vec<Handler<C>>) -> &mut Self {
        self.handle(Method::Patch.as_str(), path, handlers)
    }

    /// Registers a DELETE route.
    #[track_caller]
    fn delete(&mut self, path: &str, handlers: Vec<Handler<C>>) -> &mut Self {
        self.handle(Method::Delete.as_str(), path, handlers)
    }

    /// Registers an OPTIONS route.
    #[track_caller]
    fn options(&mut self, path: &str, handlers: Vec<Handler<C>>) -> &mut Self {
        self.handle(Method::Options.as_str(), path, handlers)
    }

    /// Registers a HEAD route.
    #[track_caller]
    fn head(&mut self, path: &str, handlers: Vec<Handler<C>>) -> &mut Self {
        self.handle(Method::Head.as_str(), path, handlers)
    }

    /// Registers the route for every method in [`Method::ALL`].
    #[track_caller]
    fn any(&mut self, path: &str, handlers: Vec<Handler<C>>) -> &mut Self {
        for method in Method::ALL {
            self.handle(method.as_str(), path, handlers.clone());
        }
        self
    }

    /// Registers the route for each of `methods`.
    #[track_caller]
    fn match_methods(
        &mut self,
        methods: &[&str],
        path: &str,
        handlers: Vec<Handler<C>>,
    ) -> &mut Self {
        for method in methods {
            self.handle(method, path, handlers.clone());
        }
        self
    }
}

/// A scope of routes sharing a path prefix and middleware.
///
/// Middleware is copied in when the group is created; middleware added to the
/// parent afterwards does not apply to it.
pub struct RouterGroup<'e, C: RequestContext> {
    engine: &'e mut Engine<C>,
    handlers: Vec<Handler<C>>,
    base_path: String,
}

impl<'e, C: RequestContext> RouterGroup<'e, C> {
    pub(crate) fn new(
        engine: &'e mut Engine<C>,
        handlers: Vec<Handler<C>>,
        base_path: String,
    ) -> Self {
        Self {
            engine,
            handlers,
            base_path,
        }
    }

    /// Creates a nested group.
    ///
    /// # Panics
    ///
    /// Panics when the combined middleware chain is too long.
    #[track_caller]
    pub fn group(
        &mut self,
        relative_path: &str,
        middleware: Vec<Handler<C>>,
    ) -> RouterGroup<'_, C> {
        match self.try_group(relative_path, middleware) {
            Ok(group) => group,
            Err(e) => panic!("{e}"),
        }
    }

    /// Creates a nested group.
    ///
    /// # Errors
    ///
    /// Returns an error when the combined middleware chain is too long.
    pub fn try_group(
        &mut self,
        relative_path: &str,
        middleware: Vec<Handler<C>>,
    ) -> Result<RouterGroup<'_, C>> {
        let handlers = combine_handlers(&self.handlers, middleware)?;
        let base_path = join_paths(&self.base_path, relative_path);
        Ok(RouterGroup::new(&mut *self.engine, handlers, base_path))
    }

    /// Returns the middleware of this group.
    #[must_use]
    pub fn handlers(&self) -> &[Handler<C>] {
        &self.handlers
    }
}

impl<C: RequestContext> std::fmt::Debug for RouterGroup<'_, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouterGroup")
            .field("base_path", &self.base_path)
            .field("handlers", &self.handlers)
            .finish_non_exhaustive()
    }
}

impl<C: RequestContext> Routes<C> for RouterGroup<'_, C> {
    fn try_handle(
        &mut self,
        method: &str,
        path: &str,
        handlers: Vec<Handler<C>>,
    ) -> Result<&mut Self> {
        let absolute = join_paths(&self.base_path, path);
        self.engine.add_route(method, &absolute, &self.handlers, handlers)?;
        Ok(self)
    }

    fn try_use_middleware(&mut self, middleware: Vec<Handler<C>>) -> Result<&mut Self> {
        self.handlers = combine_handlers(&self.handlers, middleware)?;
        Ok(self)
    }

    fn base_path(&self) -> &str {
        &self.base_path
    }
}

/// Appends `extra` to `base`, checking the chain stays below the abort
/// cursor.
///
/// # Errors
///
/// Returns an error when the combined chain is too long.
pub fn combine_handlers<C>(base: &[Handler<C>], extra: Vec<Handler<C>>) -> Result<Vec<Handler<C>>> {
    let len = base.len() + extra.len();
    if len > MAX_CHAIN_LEN {
        return Err(RouterError::ChainTooLong {
            len,
            limit: MAX_CHAIN_LEN + 1,
        });
    }
    let mut merged = Vec::with_capacity(len);
    merged.extend_from_slice(base);
    merged.extend(extra);
    Ok(merged)
}

/// Joins a group's absolute path with a relative one.
///
/// The result is cleaned; a trailing slash on `relative` is kept.
///
/// ```
/// use oxide_dispatch::join_paths;
///
/// assert_eq!(join_paths("/api", "users/"), "/api/users/");
/// assert_eq!(join_paths("/api/", "/v1//items"), "/api/v1/items");
/// assert_eq!(join_paths("/api", ""), "/api");
/// ```
#[must_use]
pub fn join_paths(absolute: &str, relative: &str) -> String {
    if relative.is_empty() {
        return absolute.to_string();
    }
    clean_path(&format!("{absolute}/{relative}"))
}
