//! Free list of reusable contexts.

use parking_lot::Mutex;

use crate::context::RequestContext;

/// A free list of contexts, shared by every worker.
///
/// Contexts are reset when they come back, so whatever [`acquire`](Self::acquire)
/// hands out carries nothing from an earlier request.
#[derive(Debug)]
pub struct ContextPool<C> {
    free: Mutex<Vec<C>>,
}

impl<C: RequestContext> Default for ContextPool<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: RequestContext> ContextPool<C> {
    /// Creates an empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self {
            free: Mutex::new(Vec::new()),
        }
    }

    /// Takes a pooled context, or builds one with `make` when none is free.
    pub fn acquire(&self, make: impl FnOnce() -> C) -> C {
        let pooled = self.free.lock().pop();
        pooled.unwrap_or_else(make)
    }

    /// Resets a context and returns it to the pool.
    pub fn release(&self, mut ctx: C) {
        ctx.reset();
        self.free.lock().push(ctx);
    }

    /// Returns the number of idle contexts.
    #[must_use]
    pub fn idle(&self) -> usize {
        self.free.lock().len()
    }

    /// Drops every idle context.
    pub fn clear(&mut self) {
        self.free.get_mut().clear();
    }
}
