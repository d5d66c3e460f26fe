//! One route tree per HTTP method.

use oxide_tree::{InsertError, Node};

use crate::executor::{last_name, Handler, HandlersChain};

/// The route tree of one method.
pub struct MethodTree<C> {
    method: String,
    root: Node<HandlersChain<C>>,
}

impl<C> MethodTree<C> {
    /// Returns the method this tree serves.
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Returns the root node.
    #[must_use]
    pub const fn root(&self) -> &Node<HandlersChain<C>> {
        &self.root
    }
}

/// A registered route, as listed by [`Engine::routes`](crate::Engine::routes).
pub struct RouteInfo<C> {
    /// HTTP method.
    pub method: String,
    /// Route pattern.
    pub path: String,
    /// Name of the route handler.
    pub handler: &'static str,
    /// The route handler itself.
    pub handler_fn: Handler<C>,
}

impl<C> std::fmt::Debug for RouteInfo<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteInfo")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("handler", &self.handler)
            .finish_non_exhaustive()
    }
}

/// The route table: method trees in registration order.
pub struct MethodTrees<C> {
    trees: Vec<MethodTree<C>>,
}

impl<C> Default for MethodTrees<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> MethodTrees<C> {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            trees: Vec::with_capacity(9),
        }
    }

    /// Returns the root of the tree for `method`.
    #[must_use]
    pub fn get(&self, method: &str) -> Option<&Node<HandlersChain<C>>> {
        self.trees
            .iter()
            .find(|t| t.method == method)
            .map(|t| &t.root)
    }

    /// Registers `chain` under `method` and `path`, creating the method's
    /// tree on first use.
    ///
    /// # Errors
    ///
    /// Forwards the tree's rejection of the pattern.
    pub fn add_route(
        &mut self,
        method: &str,
        path: &str,
        chain: HandlersChain<C>,
    ) -> Result<(), InsertError> {
        let index = match self.trees.iter().position(|t| t.method == method) {
            Some(index) => index,
            None => {
                self.trees.push(MethodTree {
                    method: method.to_string(),
                    root: Node::new(),
                });
                self.trees.len() - 1
            }
        };
        self.trees[index].root.insert(path, chain)
    }

    /// Returns an iterator over the method trees.
    pub fn iter(&self) -> std::slice::Iter<'_, MethodTree<C>> {
        self.trees.iter()
    }

    /// Returns the number of methods with routes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.trees.len()
    }

    /// Returns whether no route was registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }

    /// Returns every registered route.
    #[must_use]
    pub fn routes(&self) -> Vec<RouteInfo<C>> {
        let mut routes = Vec::new();
        for tree in &self.trees {
            for (path, chain) in tree.root.routes() {
                if let Some(last) = chain.last() {
                    routes.push(RouteInfo {
                        method: tree.method.clone(),
                        path: path.to_string(),
                        handler: last_name(chain),
                        handler_fn: last.clone(),
                    });
                }
            }
        }
        routes
    }
}
