//! The dispatch engine: route table, fallbacks and the context pool.

use std::sync::Arc;

use once_cell::sync::Lazy;
use oxide_tree::{clean_path, count_params, count_sections, Node};
use regex::Regex;
use tracing::{debug, error};

use crate::client_ip::ClientIpResolver;
use crate::config::EngineConfig;
use crate::context::{Context, ContextSizing, RequestContext};
use crate::error::{Halt, Result, RouterError};
use crate::executor::{last_name, Executor, Handler, HandlersChain};
use crate::group::{combine_handlers, join_paths, RouterGroup, Routes};
use crate::method::{self, Method};
use crate::middleware::{logger, recovery};
use crate::pool::ContextPool;
use crate::request::Request;
use crate::response::Response;
use crate::tree::{MethodTrees, RouteInfo};

static UNSAFE_PREFIX_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new("[^a-zA-Z0-9/-]+").expect("prefix filter pattern is valid"));
static REPEATED_SLASHES: Lazy<Regex> =
    Lazy::new(|| Regex::new("/{2,}").expect("slash pattern is valid"));

const DEFAULT_404_BODY: &[u8] = b"404 page not found";
const DEFAULT_405_BODY: &[u8] = b"405 method not allowed";
const MIME_PLAIN: &str = "text/plain";

type ContextFactory<C> = Box<dyn Fn(ContextSizing) -> C + Send + Sync>;

/// Routes requests to handler chains.
///
/// Routes are registered through `&mut Engine`; serving only needs
/// `&Engine`, so a populated engine can be shared between workers.
///
/// # Example
///
/// ```
/// use oxide_dispatch::{handlers, Context, Engine, Request, RequestContext, Routes};
///
/// let mut engine = Engine::new();
/// engine.get(
///     "/users/:id",
///     handlers![|c: &mut Context| {
///         let body = format!("user {}", c.param("id"));
///         c.string(200, &body);
///         Ok(())
///     }],
/// );
///
/// let response = engine.serve(Request::get("/users/42"));
/// assert_eq!(response.status, 200);
/// assert_eq!(response.body_string().as_deref(), Some("user 42"));
/// ```
pub struct Engine<C: RequestContext = Context> {
    config: EngineConfig,
    client_ip: Arc<ClientIpResolver>,
    trees: MethodTrees<C>,
    handlers: Vec<Handler<C>>,
    no_route: Vec<Handler<C>>,
    no_method: Vec<Handler<C>>,
    all_no_route: HandlersChain<C>,
    all_no_method: HandlersChain<C>,
    max_params: u16,
    max_sections: u16,
    factory: ContextFactory<C>,
    pool: ContextPool<C>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// Creates an engine with the default configuration and no middleware.
    #[must_use]
    pub fn new() -> Self {
        let config = EngineConfig::default();
        let client_ip = Arc::new(ClientIpResolver::default());
        Self::build(config, client_ip, Box::new(Context::new))
    }

    /// Creates an engine with the [`logger`] and [`recovery`] middleware
    /// installed.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut engine = Self::new();
        engine.use_middleware(vec![logger(), recovery()]);
        engine
    }

    /// Creates an engine with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error when a trusted proxy entry is malformed.
    pub fn with_config(config: EngineConfig) -> Result<Self> {
        Self::with_factory(config, Context::new)
    }
}

impl<C: RequestContext> Engine<C> {
    /// Creates an engine whose contexts are built by `factory`.
    ///
    /// # Errors
    ///
    /// Returns an error when a trusted proxy entry is malformed.
    pub fn with_factory<F>(config: EngineConfig, factory: F) -> Result<Self>
    where
        F: Fn(ContextSizing) -> C + Send + Sync + 'static,
    {
        let client_ip = Arc::new(ClientIpResolver::from_config(&config.client_ip)?);
        Ok(Self::build(config, client_ip, Box::new(factory)))
    }

    fn build(
        config: EngineConfig,
        client_ip: Arc<ClientIpResolver>,
        factory: ContextFactory<C>,
    ) -> Self {
        Self {
            config,
            client_ip,
            trees: MethodTrees::new(),
            handlers: Vec::new(),
            no_route: Vec::new(),
            no_method: Vec::new(),
            all_no_route: Arc::from(Vec::new()),
            all_no_method: Arc::from(Vec::new()),
            max_params: 0,
            max_sections: 0,
            factory,
            pool: ContextPool::new(),
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Returns the global middleware.
    #[must_use]
    pub fn handlers(&self) -> &[Handler<C>] {
        &self.handlers
    }

    /// Returns the route table.
    #[must_use]
    pub const fn trees(&self) -> &MethodTrees<C> {
        &self.trees
    }

    /// Returns every registered route.
    #[must_use]
    pub fn routes(&self) -> Vec<RouteInfo<C>> {
        self.trees.routes()
    }

    /// Returns what a context factory receives for the current route table.
    #[must_use]
    pub fn sizing(&self) -> ContextSizing {
        ContextSizing {
            max_params: self.max_params,
            client_ip: Arc::clone(&self.client_ip),
        }
    }

    /// Returns the largest section count of any registered route; it sizes
    /// the lookup's backtracking stack.
    #[must_use]
    pub const fn max_sections(&self) -> u16 {
        self.max_sections
    }

    /// Builds a fresh context, outside the pool.
    #[must_use]
    pub fn new_context(&self) -> C {
        (self.factory)(self.sizing())
    }

    /// Returns the number of idle pooled contexts.
    #[must_use]
    pub fn idle_contexts(&self) -> usize {
        self.pool.idle()
    }

    /// Creates a route group under `relative_path`.
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

    /// Creates a route group under `relative_path`.
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
        let base_path = join_paths("/", relative_path);
        Ok(RouterGroup::new(self, handlers, base_path))
    }

    /// Sets the chain run when no route matches. Global middleware runs
    /// before it.
    ///
    /// # Panics
    ///
    /// Panics when the combined chain is too long.
    #[track_caller]
    pub fn no_route(&mut self, handlers: Vec<Handler<C>>) -> &mut Self {
        match self.try_no_route(handlers) {
            Ok(engine) => engine,
            Err(e) => panic!("{e}"),
        }
    }

    /// Sets the chain run when no route matches.
    ///
    /// # Errors
    ///
    /// Returns an error when global middleware plus `handlers` is too long.
    pub fn try_no_route(&mut self, handlers: Vec<Handler<C>>) -> Result<&mut Self> {
        self.all_no_route = combine_handlers(&self.handlers, handlers.clone())?.into();
        self.no_route = handlers;
        Ok(self)
    }

    /// Sets the chain run when the path only matches under other methods.
    /// Global middleware runs before it.
    ///
    /// # Panics
    ///
    /// Panics when the combined chain is too long.
    #[track_caller]
    pub fn no_method(&mut self, handlers: Vec<Handler<C>>) -> &mut Self {
        match self.try_no_method(handlers) {
            Ok(engine) => engine,
            Err(e) => panic!("{e}"),
        }
    }

    /// Sets the chain run when the path only matches under other methods.
    ///
    /// # Errors
    ///
    /// Returns an error when global middleware plus `handlers` is too long.
    pub fn try_no_method(&mut self, handlers: Vec<Handler<C>>) -> Result<&mut Self> {
        self.all_no_method = combine_handlers(&self.handlers, handlers.clone())?.into();
        self.no_method = handlers;
        Ok(self)
    }

    pub(crate) fn add_route(
        &mut self,
        method: &str,
        path: &str,
        base: &[Handler<C>],
        handlers: Vec<Handler<C>>,
    ) -> Result<()> {
        method::validate(method)?;
        if handlers.is_empty() {
            return Err(RouterError::EmptyChain(path.to_string()));
        }
        let chain = combine_handlers(base, handlers)?;
        let handler_name = last_name(&chain);
        let len = chain.len();

        self.trees.add_route(method, path, chain.into())?;

        debug!(
            method = %method,
            path = %path,
            handler = handler_name,
            handlers = len,
            "Registered route"
        );

        self.max_params = self.max_params.max(count_params(path));
        self.max_sections = self.max_sections.max(count_sections(path));
        self.pool.clear();
        Ok(())
    }

    /// Handles one request and returns its response.
    ///
    /// A context is taken from the pool, bound to `request`, routed and
    /// returned to the pool once the response has been moved out.
    pub fn serve(&self, request: Request) -> Response {
        let mut ctx = self.pool.acquire(|| self.new_context());
        ctx.init(request);
        self.handle_request(&mut ctx);
        let response = ctx.take_response();
        self.pool.release(ctx);
        response
    }

    /// Routes an already bound context again, e.g. after a handler rewrote
    /// its path.
    ///
    /// The context is reset first; its executor is restored afterwards, so
    /// the calling chain continues where it left off.
    pub fn handle_context(&self, ctx: &mut C) {
        let saved = std::mem::take(ctx.executor_mut());
        ctx.reset();
        self.handle_request(ctx);
        *ctx.executor_mut() = saved;
    }

    fn handle_request(&self, ctx: &mut C) {
        let http_method = ctx.request().method.clone();
        let (mut path, unescape) = match &ctx.request().raw_path {
            Some(raw) if self.config.use_raw_path && !raw.is_empty() => {
                (raw.clone(), self.config.unescape_path_values)
            }
            _ => (ctx.request().path.clone(), false),
        };
        if self.config.remove_extra_slash {
            path = clean_path(&path);
        }

        let mut skipped = Vec::with_capacity(usize::from(self.max_sections));
        if let Some(root) = self.trees.get(&http_method) {
            let found = root.get_value(&path, ctx.params_mut(), &mut skipped, unescape);
            if let Some(chain) = found.value {
                ctx.set_full_path(found.full_path);
                *ctx.executor_mut() = Executor::new(Arc::clone(chain));
                run_chain(ctx);
                ctx.writer_mut().write_header_now();
                return;
            }

            if http_method != Method::Connect.as_str() && path != "/" {
                if found.tsr && self.config.redirect_trailing_slash {
                    redirect_trailing_slash(ctx);
                    return;
                }
                if self.config.redirect_fixed_path
                    && redirect_fixed_path(ctx, root, self.config.redirect_trailing_slash)
                {
                    return;
                }
            }
        }

        if self.config.handle_method_not_allowed {
            let allowed: Vec<&str> = self
                .trees
                .iter()
                .filter(|tree| tree.method() != http_method && tree.root().contains(&path))
                .map(|tree| tree.method())
                .collect();
            if !allowed.is_empty() {
                ctx.writer_mut().set_header("Allow", allowed.join(", "));
                serve_error(ctx, 405, &self.all_no_method, DEFAULT_405_BODY);
                return;
            }
        }

        serve_error(ctx, 404, &self.all_no_route, DEFAULT_404_BODY);
    }
}

impl<C: RequestContext> std::fmt::Debug for Engine<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("handlers", &self.handlers)
            .field("methods", &self.trees.len())
            .field("max_params", &self.max_params)
            .field("max_sections", &self.max_sections)
            .finish_non_exhaustive()
    }
}

impl<C: RequestContext> Routes<C> for Engine<C> {
    fn try_handle(
        &mut self,
        method: &str,
        path: &str,
        handlers: Vec<Handler<C>>,
    ) -> Result<&mut Self> {
        let base = self.handlers.clone();
        let absolute = join_paths("/", path);
        self.add_route(method, &absolute, &base, handlers)?;
        Ok(self)
    }

    /// Appends global middleware. It also runs before the `no_route` and
    /// `no_method` chains, which are checked against the length cap too.
    fn try_use_middleware(&mut self, middleware: Vec<Handler<C>>) -> Result<&mut Self> {
        let handlers = combine_handlers(&self.handlers, middleware)?;
        let all_no_route = combine_handlers(&handlers, self.no_route.clone())?;
        let all_no_method = combine_handlers(&handlers, self.no_method.clone())?;
        self.handlers = handlers;
        self.all_no_route = all_no_route.into();
        self.all_no_method = all_no_method.into();
        Ok(self)
    }

    fn base_path(&self) -> &str {
        "/"
    }
}

fn serve_error<C: RequestContext>(
    ctx: &mut C,
    code: u16,
    chain: &HandlersChain<C>,
    default_body: &[u8],
) {
    ctx.writer_mut().write_header(code);
    *ctx.executor_mut() = Executor::new(Arc::clone(chain));
    run_chain(ctx);

    let writer = ctx.writer_mut();
    if writer.written() {
        return;
    }
    if writer.status() == code {
        writer.set_header("Content-Type", MIME_PLAIN);
        writer.write(default_body);
        return;
    }
    writer.write_header_now();
}

/// Runs the installed chain and absorbs whatever [`Halt`] escapes it.
fn run_chain<C: RequestContext>(ctx: &mut C) {
    match ctx.next() {
        Ok(()) => {}
        Err(Halt::Die) => {
            debug!(path = %ctx.request().path, "Handler chain stopped");
        }
        Err(Halt::Fault(reason)) => {
            error!(
                method = %ctx.request().method,
                path = %ctx.request().path,
                handler = ctx.executor().handler_name(),
                "Unrecovered handler fault: {reason}"
            );
            let writer = ctx.writer_mut();
            if !writer.written() {
                writer.write_header(500);
                writer.write_header_now();
            }
        }
    }
}

fn redirect_trailing_slash<C: RequestContext>(ctx: &mut C) {
    let mut path = ctx.request().path.clone();
    if let Some(prefix) = ctx
        .request()
        .get_header("X-Forwarded-Prefix")
        .map(forwarded_prefix)
        .filter(|p| !p.is_empty())
    {
        path = format!("{prefix}{path}");
    }

    let target = match path.strip_suffix('/') {
        Some(stripped) if path.len() > 1 => stripped.to_string(),
        _ => format!("{path}/"),
    };
    redirect_request(ctx, target);
}

fn forwarded_prefix(header: &str) -> String {
    let cleaned = clean_path(header);
    let safe = UNSAFE_PREFIX_CHARS.replace_all(&cleaned, "");
    let collapsed = REPEATED_SLASHES.replace_all(&safe, "/");
    collapsed.trim_end_matches('/').to_string()
}

fn redirect_fixed_path<C: RequestContext>(
    ctx: &mut C,
    root: &Node<HandlersChain<C>>,
    fix_trailing_slash: bool,
) -> bool {
    let cleaned = clean_path(&ctx.request().path);
    match root.find_case_insensitive_path(&cleaned, fix_trailing_slash) {
        Some(fixed) => {
            redirect_request(ctx, fixed);
            true
        }
        None => false,
    }
}

fn redirect_request<C: RequestContext>(ctx: &mut C, target: String) {
    let request = ctx.request();
    let from = request.path.clone();
    let code = redirect_status(&request.method);
    let location = if request.raw_query.is_empty() {
        target.clone()
    } else {
        format!("{target}?{}", request.raw_query)
    };

    debug!(code, from = %from, to = %location, "Redirecting request");

    ctx.request_mut().path = target;
    let writer = ctx.writer_mut();
    writer.write_header(code);
    writer.set_header("Location", location);
    writer.write_header_now();
}

const fn redirect_status_for(method: Option<Method>) -> u16 {
    match method {
        Some(Method::Get | Method::Head) => 301,
        Some(Method::Put | Method::Delete | Method::Options | Method::Trace) => 308,
        _ => 307,
    }
}

fn redirect_status(method: &str) -> u16 {
    redirect_status_for(method.parse().ok())
}
