//! Handler chains and the cursor that runs them.

use std::fmt;
use std::sync::Arc;

use crate::error::HandlerResult;

/// Cursor value that marks a chain as aborted.
///
/// Any cursor at or past this value runs no further handlers, so a chain
/// must hold fewer handlers than this.
pub const ABORT_INDEX: i8 = i8::MAX >> 1;

/// Maximum number of handlers in one chain.
#[allow(clippy::cast_sign_loss)]
pub const MAX_CHAIN_LEN: usize = ABORT_INDEX as usize - 1;

type HandlerFn<C> = dyn Fn(&mut C) -> HandlerResult + Send + Sync;

/// A handler or middleware function, tagged with a name for introspection.
pub struct Handler<C> {
    name: &'static str,
    func: Arc<HandlerFn<C>>,
}

impl<C> Handler<C> {
    /// Wraps a function, naming it after its type.
    pub fn new<F>(func: F) -> Self
    where
        F: Fn(&mut C) -> HandlerResult + Send + Sync + 'static,
    {
        Self::named(std::any::type_name::<F>(), func)
    }

    /// Wraps a function under an explicit name.
    pub fn named<F>(name: &'static str, func: F) -> Self
    where
        F: Fn(&mut C) -> HandlerResult + Send + Sync + 'static,
    {
        Self {
            name,
            func: Arc::new(func),
        }
    }

    /// Returns the handler's name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Runs the handler.
    ///
    /// # Errors
    ///
    /// Forwards the handler's [`Halt`](crate::Halt).
    pub fn call(&self, ctx: &mut C) -> HandlerResult {
        (self.func)(ctx)
    }
}

impl<C> Clone for Handler<C> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            func: Arc::clone(&self.func),
        }
    }
}

impl<C> fmt::Debug for Handler<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Handler").field(&self.name).finish()
    }
}

/// Wraps a function as a [`Handler`].
pub fn handler<C, F>(func: F) -> Handler<C>
where
    F: Fn(&mut C) -> HandlerResult + Send + Sync + 'static,
{
    Handler::new(func)
}

/// An immutable, shareable handler chain. The last element is the route
/// handler; everything before it is middleware.
pub type HandlersChain<C> = Arc<[Handler<C>]>;

/// Returns the name of the route handler at the end of a chain.
#[must_use]
pub fn last_name<C>(chain: &[Handler<C>]) -> &'static str {
    chain.last().map_or("", Handler::name)
}

/// Runs a handler chain for one context.
///
/// The cursor starts before the first handler. Each call to `next` on the
/// owning context advances it and runs the remaining handlers in order, so a
/// handler that calls `next` itself wraps everything after it.
pub struct Executor<C> {
    handlers: HandlersChain<C>,
    index: i8,
}

impl<C> Default for Executor<C> {
    fn default() -> Self {
        Self::new(Arc::from(Vec::new()))
    }
}

impl<C> Executor<C> {
    /// Creates an executor positioned before the first handler.
    #[must_use]
    pub const fn new(handlers: HandlersChain<C>) -> Self {
        Self {
            handlers,
            index: -1,
        }
    }

    /// Creates an aborted executor with no handlers.
    #[must_use]
    pub fn detached() -> Self {
        Self {
            handlers: Arc::from(Vec::new()),
            index: ABORT_INDEX,
        }
    }

    /// Returns the cursor.
    #[must_use]
    pub const fn index(&self) -> i8 {
        self.index
    }

    /// Moves the cursor. Values at or past [`ABORT_INDEX`] abort the chain.
    pub fn set_index(&mut self, index: i8) {
        self.index = index;
    }

    /// Moves the cursor one step forward.
    pub fn advance(&mut self) {
        self.index = self.index.saturating_add(1);
    }

    /// Returns the handler under the cursor, if any is left to run.
    #[must_use]
    pub fn current(&self) -> Option<Handler<C>> {
        if self.is_aborted() {
            return None;
        }
        usize::try_from(self.index)
            .ok()
            .and_then(|i| self.handlers.get(i))
            .cloned()
    }

    /// Stops the chain; no further handler runs.
    pub fn abort(&mut self) {
        self.index = ABORT_INDEX;
    }

    /// Returns whether the chain was aborted.
    #[must_use]
    pub const fn is_aborted(&self) -> bool {
        self.index >= ABORT_INDEX
    }

    /// Returns the chain.
    #[must_use]
    pub fn handlers(&self) -> &[Handler<C>] {
        &self.handlers
    }

    /// Returns the route handler, the last element of the chain.
    #[must_use]
    pub fn handler(&self) -> Option<&Handler<C>> {
        self.handlers.last()
    }

    /// Returns the name of the route handler.
    #[must_use]
    pub fn handler_name(&self) -> &'static str {
        last_name(&self.handlers)
    }

    /// Returns the names of every handler in the chain.
    #[must_use]
    pub fn handler_names(&self) -> Vec<&'static str> {
        self.handlers.iter().map(Handler::name).collect()
    }
}

impl<C> fmt::Debug for Executor<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Executor")
            .field("index", &self.index)
            .field("handlers", &self.handler_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Halt;

    struct Counter(u32);

    fn chain(n: usize) -> HandlersChain<Counter> {
        (0..n)
            .map(|_| {
                handler(|c: &mut Counter| {
                    c.0 += 1;
                    Ok(())
                })
            })
            .collect::<Vec<_>>()
            .into()
    }

    #[test]
    fn test_abort_index_value() {
        assert_eq!(ABORT_INDEX, 63);
        assert_eq!(MAX_CHAIN_LEN, 62);
    }

    #[test]
    fn test_cursor_walk() {
        let mut exec = Executor::new(chain(2));
        assert!(exec.current().is_none());
        exec.advance();
        assert!(exec.current().is_some());
        exec.advance();
        assert!(exec.current().is_some());
        exec.advance();
        assert!(exec.current().is_none());
        assert!(!exec.is_aborted());
    }

    #[test]
    fn test_abort_is_idempotent() {
        let mut exec = Executor::new(chain(3));
        exec.abort();
        exec.abort();
        assert!(exec.is_aborted());
        assert_eq!(exec.index(), ABORT_INDEX);
        exec.advance();
        assert!(exec.is_aborted());
        assert!(exec.current().is_none());
    }

    #[test]
    fn test_aborted_cursor_yields_nothing() {
        let mut exec = Executor::new(chain(70));
        exec.abort();
        assert!(exec.current().is_none());
        exec.advance();
        assert!(exec.current().is_none());
    }

    #[test]
    fn test_advance_saturates() {
        let mut exec = Executor::new(chain(1));
        exec.set_index(i8::MAX);
        exec.advance();
        assert_eq!(exec.index(), i8::MAX);
    }

    #[test]
    fn test_detached() {
        let exec = Executor::<Counter>::detached();
        assert!(exec.is_aborted());
        assert!(exec.handlers().is_empty());
        assert_eq!(exec.handler_name(), "");
    }

    #[test]
    fn test_handler_call_and_name() {
        let h = Handler::named("bump", |c: &mut Counter| {
            c.0 += 1;
            Err(Halt::Die)
        });
        let mut counter = Counter(0);
        assert_eq!(h.call(&mut counter), Err(Halt::Die));
        assert_eq!(counter.0, 1);
        assert_eq!(h.name(), "bump");
        assert!(handler(|_: &mut Counter| Ok(())).name().contains("tests"));
    }
}
