//! Per-request state.
//!
//! [`RequestContext`] is the contract the engine, the executor and the
//! middleware rely on. [`Context`] is the implementation used unless an
//! engine is built with its own factory.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use oxide_tree::Params;
use parking_lot::RwLock;
use serde::Serialize;

use crate::client_ip::{self, ClientIpResolver};
use crate::error::{Halt, HandlerResult};
use crate::errors::{BoxError, Error, ErrorType, Errors};
use crate::executor::Executor;
use crate::request::Request;
use crate::response::{Response, ResponseWriter};

/// A value stored in the per-request metadata map.
pub type Value = Arc<dyn Any + Send + Sync>;

/// What a context factory receives from the engine.
#[derive(Debug, Clone)]
pub struct ContextSizing {
    /// Largest number of parameters any registered route captures.
    pub max_params: u16,
    /// Client address resolution configured on the engine.
    pub client_ip: Arc<ClientIpResolver>,
}

impl Default for ContextSizing {
    fn default() -> Self {
        Self {
            max_params: 0,
            client_ip: Arc::new(ClientIpResolver::default()),
        }
    }
}

/// The capabilities the engine and executor need from per-request state.
///
/// Implementations are built once per pool slot by the engine's factory,
/// bound to a request with [`init`](Self::init) and cleared with
/// [`reset`](Self::reset) before going back to the pool.
pub trait RequestContext: Send + Sized + 'static {
    /// Binds a new request.
    fn init(&mut self, request: Request);

    /// Clears everything a previous request left behind, keeping allocated
    /// capacity. The bound request is left in place.
    fn reset(&mut self);

    /// Returns the bound request.
    fn request(&self) -> &Request;

    /// Returns the bound request for modification.
    fn request_mut(&mut self) -> &mut Request;

    /// Returns the response writer.
    fn writer(&self) -> &ResponseWriter;

    /// Returns the response writer for modification.
    fn writer_mut(&mut self) -> &mut ResponseWriter;

    /// Returns the captured path parameters.
    fn params(&self) -> &Params;

    /// Returns the captured path parameters for modification.
    fn params_mut(&mut self) -> &mut Params;

    /// Returns the executor running this request's chain.
    fn executor(&self) -> &Executor<Self>;

    /// Returns the executor for modification.
    fn executor_mut(&mut self) -> &mut Executor<Self>;

    /// Returns the matched route pattern, empty when nothing matched.
    fn full_path(&self) -> &str;

    /// Records the matched route pattern.
    fn set_full_path(&mut self, full_path: &str);

    /// Moves the buffered response out.
    fn take_response(&mut self) -> Response {
        self.writer_mut().take_response()
    }

    /// Returns the client address. Defaults to the peer address.
    fn client_ip(&self) -> String {
        client_ip::remote_ip(self.request())
    }

    /// Runs the remaining handlers of the chain.
    ///
    /// Called by middleware to wrap the handlers after it: code before the
    /// call runs on the way in, code after it on the way out.
    ///
    /// # Errors
    ///
    /// Forwards the first [`Halt`] returned by a handler; the handlers after
    /// it do not run.
    fn next(&mut self) -> HandlerResult {
        self.executor_mut().advance();
        while let Some(handler) = self.executor().current() {
            handler.call(self)?;
            self.executor_mut().advance();
        }
        Ok(())
    }

    /// Prevents pending handlers from running. Does not stop the current one.
    fn abort(&mut self) {
        self.executor_mut().abort();
    }

    /// Returns whether the chain was aborted.
    fn is_aborted(&self) -> bool {
        self.executor().is_aborted()
    }

    /// Writes and flushes `code`, then aborts.
    fn abort_with_status(&mut self, code: u16) {
        self.writer_mut().write_header(code);
        self.writer_mut().write_header_now();
        self.abort();
    }

    /// Aborts and unwinds to the engine, skipping the trailing code of every
    /// enclosing middleware. Return the result from the handler with `?`.
    ///
    /// # Errors
    ///
    /// Always returns [`Halt::Die`].
    fn die(&mut self) -> HandlerResult {
        self.abort();
        Err(Halt::Die)
    }

    /// Writes and flushes `code`, then dies.
    ///
    /// # Errors
    ///
    /// Always returns [`Halt::Die`].
    fn die_with_status(&mut self, code: u16) -> HandlerResult {
        self.writer_mut().write_header(code);
        self.writer_mut().write_header_now();
        self.die()
    }

    /// Returns the value of a path parameter, or an empty string.
    fn param(&self, key: &str) -> &str {
        self.params().by_name(key)
    }
}

/// The default per-request context.
pub struct Context {
    request: Request,
    writer: ResponseWriter,
    params: Params,
    executor: Executor<Self>,
    full_path: String,
    keys: RwLock<HashMap<String, Value>>,
    errors: Errors,
    query_cache: Option<Vec<(String, String)>>,
    form_cache: Option<Vec<(String, String)>>,
    client_ip: Arc<ClientIpResolver>,
}

impl Default for Context {
    fn default() -> Self {
        Self::new(ContextSizing::default())
    }
}

impl RequestContext for Context {
    fn init(&mut self, request: Request) {
        self.request = request;
    }

    fn reset(&mut self) {
        self.writer.reset();
        self.params.clear();
        self.executor = Executor::default();
        self.full_path.clear();
        self.keys.get_mut().clear();
        self.errors.clear();
        self.query_cache = None;
        self.form_cache = None;
    }

    fn request(&self) -> &Request {
        &self.request
    }

    fn request_mut(&mut self) -> &mut Request {
        &mut self.request
    }

    fn writer(&self) -> &ResponseWriter {
        &self.writer
    }

    fn writer_mut(&mut self) -> &mut ResponseWriter {
        &mut self.writer
    }

    fn params(&self) -> &Params {
        &self.params
    }

    fn params_mut(&mut self) -> &mut Params {
        &mut self.params
    }

    fn executor(&self) -> &Executor<Self> {
        &self.executor
    }

    fn executor_mut(&mut self) -> &mut Executor<Self> {
        &mut self.executor
    }

    fn full_path(&self) -> &str {
        &self.full_path
    }

    fn set_full_path(&mut self, full_path: &str) {
        self.full_path.clear();
        self.full_path.push_str(full_path);
    }

    fn client_ip(&self) -> String {
        self.client_ip.client_ip(&self.request)
    }
}

impl Context {
    /// Creates a context with scratch buffers sized for the engine's routes.
    #[must_use]
    pub fn new(sizing: ContextSizing) -> Self {
        Self {
            request: Request::default(),
            writer: ResponseWriter::new(),
            params: Params::with_capacity(usize::from(sizing.max_params)),
            executor: Executor::default(),
            full_path: String::new(),
            keys: RwLock::new(HashMap::new()),
            errors: Errors::new(),
            query_cache: None,
            form_cache: None,
            client_ip: sizing.client_ip,
        }
    }

    /// Returns a detached copy that may outlive the request, e.g. to hand to
    /// a background task.
    ///
    /// The copy has its own metadata map and parameters, an unwritten
    /// writer and an aborted executor with no handlers.
    #[must_use]
    pub fn copy(&self) -> Self {
        Self {
            request: self.request.clone(),
            writer: ResponseWriter::new(),
            params: self.params.clone(),
            executor: Executor::detached(),
            full_path: self.full_path.clone(),
            keys: RwLock::new(self.keys.read().clone()),
            errors: Errors::new(),
            query_cache: None,
            form_cache: None,
            client_ip: Arc::clone(&self.client_ip),
        }
    }

    /// Appends a path parameter.
    pub fn add_param(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.params.push(key, value);
    }

    /// Returns the name of the route handler.
    #[must_use]
    pub fn handler_name(&self) -> &'static str {
        self.executor.handler_name()
    }

    /// Returns the names of every handler in the running chain.
    #[must_use]
    pub fn handler_names(&self) -> Vec<&'static str> {
        self.executor.handler_names()
    }

    /// Stores a value under `key`, replacing any previous one.
    pub fn set(&self, key: impl Into<String>, value: impl Any + Send + Sync) {
        self.keys.write().insert(key.into(), Arc::new(value));
    }

    /// Returns the value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        self.keys.read().get(key).cloned()
    }

    /// Returns a clone of the value under `key` if it has type `T`.
    #[must_use]
    pub fn get_as<T: Any + Clone>(&self, key: &str) -> Option<T> {
        self.keys
            .read()
            .get(key)
            .and_then(|v| v.downcast_ref::<T>())
            .cloned()
    }

    /// Returns the value stored under `key`.
    ///
    /// # Panics
    ///
    /// Panics when the key does not exist.
    #[must_use]
    #[track_caller]
    pub fn must_get(&self, key: &str) -> Value {
        match self.get(key) {
            Some(value) => value,
            None => panic!("key \"{key}\" does not exist"),
        }
    }

    /// Returns the string under `key`, or an empty string.
    #[must_use]
    pub fn get_string(&self, key: &str) -> String {
        self.get_as::<String>(key)
            .or_else(|| self.get_as::<&'static str>(key).map(str::to_string))
            .unwrap_or_default()
    }

    /// Returns the bool under `key`, or `false`.
    #[must_use]
    pub fn get_bool(&self, key: &str) -> bool {
        self.get_as(key).unwrap_or_default()
    }

    /// Returns the integer under `key`, or 0.
    #[must_use]
    pub fn get_i64(&self, key: &str) -> i64 {
        self.get_as(key).unwrap_or_default()
    }

    /// Returns the float under `key`, or 0.0.
    #[must_use]
    pub fn get_f64(&self, key: &str) -> f64 {
        self.get_as(key).unwrap_or_default()
    }

    /// Returns a snapshot of the metadata map.
    #[must_use]
    pub fn keys(&self) -> HashMap<String, Value> {
        self.keys.read().clone()
    }

    /// Attaches an error to the request, private by default.
    ///
    /// # Panics
    ///
    /// Panics when the error's message is empty.
    #[track_caller]
    pub fn error(&mut self, err: impl Into<BoxError>) -> &mut Error {
        self.errors.push(Error::new(err, ErrorType::Private))
    }

    /// Returns the errors attached so far.
    #[must_use]
    pub const fn errors(&self) -> &Errors {
        &self.errors
    }

    /// Writes and flushes `code`, aborts and attaches `err`.
    ///
    /// # Panics
    ///
    /// Panics when the error's message is empty.
    #[track_caller]
    pub fn abort_with_error(&mut self, code: u16, err: impl Into<BoxError>) -> &mut Error {
        self.abort_with_status(code);
        self.error(err)
    }

    /// Returns the first value of a query parameter.
    pub fn query(&mut self, key: &str) -> Option<&str> {
        self.query_values()
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Returns the first value of a query parameter, or `default`.
    pub fn default_query<'a>(&'a mut self, key: &str, default: &'a str) -> &'a str {
        self.query(key).unwrap_or(default)
    }

    /// Returns every value of a repeated query parameter.
    pub fn query_array(&mut self, key: &str) -> Vec<&str> {
        self.query_values()
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    fn query_values(&mut self) -> &[(String, String)] {
        let request = &self.request;
        self.query_cache.get_or_insert_with(|| request.query_pairs())
    }

    /// Returns the first value of a URL-encoded form field.
    pub fn post_form(&mut self, key: &str) -> Option<&str> {
        self.form_values()
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Returns the first value of a form field, or `default`.
    pub fn default_post_form<'a>(&'a mut self, key: &str, default: &'a str) -> &'a str {
        self.post_form(key).unwrap_or(default)
    }

    /// Returns every value of a repeated form field.
    pub fn post_form_array(&mut self, key: &str) -> Vec<&str> {
        self.form_values()
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    fn form_values(&mut self) -> &[(String, String)] {
        let request = &self.request;
        self.form_cache.get_or_insert_with(|| request.form_pairs())
    }

    /// Returns a request header.
    #[must_use]
    pub fn get_header(&self, key: &str) -> Option<&str> {
        self.request.get_header(key)
    }

    /// Returns the media type of the request body.
    #[must_use]
    pub fn content_type(&self) -> &str {
        self.request.content_type()
    }

    /// Returns whether the request asks for a websocket upgrade.
    #[must_use]
    pub fn is_websocket(&self) -> bool {
        let connection_upgrade = self
            .get_header("Connection")
            .is_some_and(|v| v.to_ascii_lowercase().contains("upgrade"));
        let upgrade_websocket = self
            .get_header("Upgrade")
            .is_some_and(|v| v.eq_ignore_ascii_case("websocket"));
        connection_upgrade && upgrade_websocket
    }

    /// Returns the peer address without the port.
    #[must_use]
    pub fn remote_ip(&self) -> String {
        client_ip::remote_ip(&self.request)
    }

    /// Returns the transport deadline, if any.
    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.request.deadline
    }

    /// Sets the response status.
    pub fn status(&mut self, code: u16) {
        self.writer.write_header(code);
    }

    /// Sets a response header; an empty value removes it.
    pub fn header(&mut self, key: &str, value: &str) {
        if value.is_empty() {
            self.writer.remove_header(key);
        } else {
            self.writer.set_header(key, value);
        }
    }

    /// Writes a body with the given content type.
    pub fn data(&mut self, code: u16, content_type: &str, body: &[u8]) {
        self.status(code);
        self.writer.set_header("Content-Type", content_type);
        self.writer.write(body);
    }

    /// Writes a plain-text body.
    pub fn string(&mut self, code: u16, body: &str) {
        self.data(code, "text/plain; charset=utf-8", body.as_bytes());
    }

    /// Serializes `value` as the JSON body.
    ///
    /// # Errors
    ///
    /// Returns a [`Halt::Fault`] when `value` cannot be serialized.
    pub fn json<T: Serialize + ?Sized>(&mut self, code: u16, value: &T) -> HandlerResult {
        let body = serde_json::to_vec(value).map_err(Halt::fault)?;
        self.data(code, "application/json; charset=utf-8", &body);
        Ok(())
    }

    /// Redirects to `location`.
    ///
    /// # Errors
    ///
    /// Returns a [`Halt::Fault`] when `code` is not a redirect status.
    pub fn redirect(&mut self, code: u16, location: &str) -> HandlerResult {
        if !(300..=308).contains(&code) && code != 201 {
            return Err(Halt::Fault(format!("cannot redirect with status code {code}")));
        }
        self.status(code);
        self.writer.set_header("Location", location);
        self.writer.write_header_now();
        Ok(())
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("method", &self.request.method)
            .field("path", &self.request.path)
            .field("full_path", &self.full_path)
            .field("params", &self.params)
            .field("executor", &self.executor)
            .field("errors", &self.errors.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{handler, Handler, HandlersChain};

    fn run(ctx: &mut Context, chain: Vec<Handler<Context>>) -> HandlerResult {
        let chain: HandlersChain<Context> = chain.into();
        *ctx.executor_mut() = Executor::new(chain);
        ctx.next()
    }

    fn trace(ctx: &Context, step: &str) {
        let mut steps = ctx.get_as::<Vec<String>>("trace").unwrap_or_default();
        steps.push(step.to_string());
        ctx.set("trace", steps);
    }

    #[test]
    fn test_next_runs_onion_order() {
        let mut ctx = Context::default();
        let result = run(
            &mut ctx,
            vec![
                handler(|c: &mut Context| {
                    trace(c, "a-in");
                    c.next()?;
                    trace(c, "a-out");
                    Ok(())
                }),
                handler(|c: &mut Context| {
                    trace(c, "b-in");
                    c.next()?;
                    trace(c, "b-out");
                    Ok(())
                }),
                handler(|c: &mut Context| {
                    trace(c, "c");
                    Ok(())
                }),
            ],
        );
        assert_eq!(result, Ok(()));
        assert_eq!(
            ctx.get_as::<Vec<String>>("trace").unwrap(),
            vec!["a-in", "b-in", "c", "b-out", "a-out"]
        );
    }

    #[test]
    fn test_abort_skips_pending_handlers() {
        let mut ctx = Context::default();
        let result = run(
            &mut ctx,
            vec![
                handler(|c: &mut Context| {
                    trace(c, "1");
                    c.abort();
                    trace(c, "1-after-abort");
                    Ok(())
                }),
                handler(|c: &mut Context| {
                    trace(c, "2");
                    Ok(())
                }),
                handler(|c: &mut Context| {
                    trace(c, "3");
                    Ok(())
                }),
            ],
        );
        assert_eq!(result, Ok(()));
        assert!(ctx.is_aborted());
        assert_eq!(
            ctx.get_as::<Vec<String>>("trace").unwrap(),
            vec!["1", "1-after-abort"]
        );
    }

    #[test]
    fn test_die_skips_trailing_code() {
        let mut ctx = Context::default();
        let result = run(
            &mut ctx,
            vec![
                handler(|c: &mut Context| {
                    trace(c, "outer-in");
                    c.next()?;
                    trace(c, "outer-out");
                    Ok(())
                }),
                handler(|c: &mut Context| {
                    trace(c, "dying");
                    c.die_with_status(403)?;
                    trace(c, "unreachable");
                    Ok(())
                }),
                handler(|c: &mut Context| {
                    trace(c, "never");
                    Ok(())
                }),
            ],
        );
        assert_eq!(result, Err(Halt::Die));
        assert!(ctx.is_aborted());
        assert_eq!(ctx.writer().status(), 403);
        assert!(ctx.writer().written());
        assert_eq!(
            ctx.get_as::<Vec<String>>("trace").unwrap(),
            vec!["outer-in", "dying"]
        );
    }

    #[test]
    fn test_handlers_without_next_run_in_order() {
        let mut ctx = Context::default();
        let steps = (0..5)
            .map(|i| {
                handler(move |c: &mut Context| {
                    trace(c, &i.to_string());
                    Ok(())
                })
            })
            .collect();
        run(&mut ctx, steps).unwrap();
        assert_eq!(
            ctx.get_as::<Vec<String>>("trace").unwrap(),
            vec!["0", "1", "2", "3", "4"]
        );
    }

    #[test]
    fn test_metadata_accessors() {
        let ctx = Context::default();
        ctx.set("name", "gordon".to_string());
        ctx.set("static", "str");
        ctx.set("admin", true);
        ctx.set("age", 42_i64);
        ctx.set("ratio", 0.5_f64);

        assert_eq!(ctx.get_string("name"), "gordon");
        assert_eq!(ctx.get_string("static"), "str");
        assert!(ctx.get_bool("admin"));
        assert_eq!(ctx.get_i64("age"), 42);
        assert!((ctx.get_f64("ratio") - 0.5).abs() < f64::EPSILON);
        assert_eq!(ctx.get_i64("name"), 0);
        assert!(ctx.get("missing").is_none());
        assert_eq!(ctx.keys().len(), 5);
    }

    #[test]
    #[should_panic(expected = "key \"missing\" does not exist")]
    fn test_must_get_panics() {
        let ctx = Context::default();
        let _ = ctx.must_get("missing");
    }

    #[test]
    fn test_query_and_form() {
        let mut ctx = Context::default();
        ctx.init(
            Request::post("/search?q=rust&tag=a&tag=b")
                .form("user=gordon&role=admin&role=dev"),
        );

        assert_eq!(ctx.query("q"), Some("rust"));
        assert_eq!(ctx.default_query("page", "1"), "1");
        assert_eq!(ctx.query_array("tag"), vec!["a", "b"]);
        assert_eq!(ctx.post_form("user"), Some("gordon"));
        assert_eq!(ctx.default_post_form("missing", "none"), "none");
        assert_eq!(ctx.post_form_array("role"), vec!["admin", "dev"]);
    }

    #[test]
    fn test_reset_clears_request_state() {
        let mut ctx = Context::default();
        ctx.init(Request::get("/a?x=1"));
        ctx.add_param("id", "1");
        ctx.set("user", "gordon".to_string());
        ctx.error("boom");
        ctx.set_full_path("/a");
        let _ = ctx.query("x");
        ctx.string(201, "made");

        ctx.reset();
        ctx.init(Request::get("/b"));

        assert!(ctx.params().is_empty());
        assert!(ctx.keys().is_empty());
        assert!(ctx.errors().is_empty());
        assert_eq!(ctx.full_path(), "");
        assert_eq!(ctx.query("x"), None);
        assert!(!ctx.writer().written());
        assert_eq!(ctx.writer().status(), 200);
        assert!(!ctx.is_aborted());
    }

    #[test]
    fn test_copy_is_independent() {
        let mut ctx = Context::default();
        ctx.init(Request::get("/users/1"));
        ctx.add_param("id", "1");
        ctx.set("user", "gordon".to_string());

        let copy = ctx.copy();
        copy.set("user", "alyx".to_string());
        ctx.add_param("extra", "x");

        assert_eq!(ctx.get_string("user"), "gordon");
        assert_eq!(copy.get_string("user"), "alyx");
        assert_eq!(copy.params().len(), 1);
        assert_eq!(copy.param("id"), "1");
        assert!(copy.is_aborted());
        assert!(copy.executor().handlers().is_empty());
    }

    #[test]
    fn test_abort_with_error() {
        let mut ctx = Context::default();
        ctx.abort_with_error(401, "no token").set_type(ErrorType::Public);
        assert!(ctx.is_aborted());
        assert_eq!(ctx.writer().status(), 401);
        assert!(ctx.writer().written());
        assert_eq!(ctx.errors().by_type(ErrorType::Public).len(), 1);
    }

    #[test]
    fn test_output_helpers() {
        let mut ctx = Context::default();
        ctx.header("X-Trace", "abc");
        ctx.header("X-Trace", "");
        ctx.json(201, &serde_json::json!({"ok": true})).unwrap();
        let response = ctx.take_response();
        assert_eq!(response.status, 201);
        assert_eq!(response.get_header("Content-Type"), Some("application/json; charset=utf-8"));
        assert_eq!(response.get_header("X-Trace"), None);
        assert_eq!(response.body_string().as_deref(), Some(r#"{"ok":true}"#));
    }

    #[test]
    fn test_redirect_rejects_non_redirect_codes() {
        let mut ctx = Context::default();
        assert!(ctx.redirect(200, "/x").is_err());
        ctx.redirect(302, "/login").unwrap();
        assert_eq!(ctx.writer().status(), 302);
        assert_eq!(ctx.writer().header("Location"), Some("/login"));
    }

    #[test]
    fn test_is_websocket() {
        let mut ctx = Context::default();
        ctx.init(
            Request::get("/ws")
                .header("Connection", "keep-alive, Upgrade")
                .header("Upgrade", "websocket"),
        );
        assert!(ctx.is_websocket());
        ctx.init(Request::get("/ws"));
        assert!(!ctx.is_websocket());
    }
}
