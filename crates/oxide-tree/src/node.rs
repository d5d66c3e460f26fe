//! The compressed prefix tree.
//!
//! Every node consumes a piece of the path: a literal prefix for static
//! nodes, one segment for parameter nodes and the remainder for catch-all
//! nodes. Static children are keyed by their first byte and kept sorted by
//! priority, the number of routes registered beneath them.
//!
//! Lookup prefers, at every node, the static child for the next byte, then
//! the parameter child, then the catch-all child. Alternatives that were not
//! taken are kept on a stack and tried when the preferred branch dead-ends,
//! so a static route never shadows a dynamic one deeper in the path.

use std::borrow::Cow;
use std::fmt;

use crate::error::{InsertError, Result};
use crate::params::Params;
use crate::path::{self, Piece};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeKind {
    Root,
    Static,
    Param,
    CatchAll,
}

/// A node of the route tree, holding an optional value of type `T`.
pub struct Node<T> {
    prefix: Vec<u8>,
    kind: NodeKind,
    indices: Vec<u8>,
    children: Vec<Node<T>>,
    param: Option<Box<Node<T>>>,
    catch_all: Option<Box<Node<T>>>,
    priority: u32,
    value: Option<T>,
    full_path: String,
}

/// A branch left behind during lookup, to be tried if the preferred one fails.
pub struct SkippedNode<'t, T> {
    node: &'t Node<T>,
    pos: usize,
    params_len: usize,
}

/// The outcome of a lookup.
pub struct NodeValue<'t, T> {
    /// The value registered for the matched pattern.
    pub value: Option<&'t T>,
    /// Set when there is no match, but adding or removing one trailing slash
    /// would produce one.
    pub tsr: bool,
    /// The matched pattern, empty when nothing matched.
    pub full_path: &'t str,
}

impl<T> Default for Node<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Node<T> {
    /// Creates an empty root node.
    #[must_use]
    pub fn new() -> Self {
        Self::with_kind(NodeKind::Root, Vec::new(), String::new())
    }

    fn with_kind(kind: NodeKind, prefix: Vec<u8>, full_path: String) -> Self {
        Self {
            prefix,
            kind,
            indices: Vec::new(),
            children: Vec::new(),
            param: None,
            catch_all: None,
            priority: 0,
            value: None,
            full_path,
        }
    }

    /// Returns the literal text this node consumes. Wildcard nodes return
    /// their pattern text, e.g. `:id`.
    #[must_use]
    pub fn prefix(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.prefix)
    }

    /// Returns the number of routes registered at or below this node.
    #[must_use]
    pub fn priority(&self) -> u32 {
        self.priority
    }

    /// Returns the value stored at this node.
    #[must_use]
    pub fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }

    /// Returns the route pattern text leading up to and including this node.
    #[must_use]
    pub fn full_path(&self) -> &str {
        &self.full_path
    }

    /// Returns the static children, highest priority first.
    #[must_use]
    pub fn children(&self) -> &[Node<T>] {
        &self.children
    }

    fn wildcard_name(&self) -> &str {
        std::str::from_utf8(&self.prefix[1..]).unwrap_or_default()
    }

    fn static_child(&self, first: u8) -> Option<&Node<T>> {
        self.indices
            .iter()
            .position(|&b| b == first)
            .map(|i| &self.children[i])
    }

    /// Registers `value` under `pattern`.
    ///
    /// # Errors
    ///
    /// Fails when the pattern is malformed, when a wildcard conflicts with a
    /// differently named one at the same position, or when the pattern is
    /// already registered.
    pub fn insert(&mut self, pattern: &str, value: T) -> Result<()> {
        let pieces = path::parse(pattern)?;
        self.insert_pieces(&pieces, pattern, 0, value)?;
        self.priority += 1;
        Ok(())
    }

    fn insert_pieces(
        &mut self,
        pieces: &[Piece<'_>],
        pattern: &str,
        consumed: usize,
        value: T,
    ) -> Result<()> {
        let Some((piece, rest)) = pieces.split_first() else {
            if self.value.is_some() {
                return Err(InsertError::DuplicateRoute(pattern.to_string()));
            }
            self.value = Some(value);
            self.full_path = pattern.to_string();
            return Ok(());
        };

        match *piece {
            Piece::Literal(text) => {
                self.insert_literal(text.as_bytes(), rest, pattern, consumed, value)
            }
            Piece::Param(name) => {
                let child = Self::wildcard_child(
                    &mut self.param,
                    NodeKind::Param,
                    format!(":{name}"),
                    pattern,
                    consumed,
                )?;
                let consumed = consumed + child.prefix.len();
                child.insert_pieces(rest, pattern, consumed, value)?;
                child.priority += 1;
                Ok(())
            }
            Piece::CatchAll(name) => {
                let child = Self::wildcard_child(
                    &mut self.catch_all,
                    NodeKind::CatchAll,
                    format!("*{name}"),
                    pattern,
                    consumed,
                )?;
                let consumed = consumed + child.prefix.len();
                child.insert_pieces(rest, pattern, consumed, value)?;
                child.priority += 1;
                Ok(())
            }
        }
    }

    fn wildcard_child<'n>(
        slot: &'n mut Option<Box<Node<T>>>,
        kind: NodeKind,
        segment: String,
        pattern: &str,
        consumed: usize,
    ) -> Result<&'n mut Node<T>> {
        if let Some(existing) = slot.as_deref() {
            if existing.prefix != segment.as_bytes() {
                return Err(InsertError::WildcardConflict {
                    segment,
                    existing: existing.prefix().into_owned(),
                    prefix: pattern[..consumed].to_string(),
                    path: pattern.to_string(),
                });
            }
        }

        let child = slot.get_or_insert_with(|| {
            let full_path = format!("{}{segment}", &pattern[..consumed]);
            Box::new(Node::with_kind(kind, segment.into_bytes(), full_path))
        });
        Ok(child)
    }

    fn insert_literal(
        &mut self,
        text: &[u8],
        rest: &[Piece<'_>],
        pattern: &str,
        consumed: usize,
        value: T,
    ) -> Result<()> {
        let first = text[0];
        let i = if let Some(i) = self.indices.iter().position(|&b| b == first) {
            let child = &mut self.children[i];
            let common = common_prefix_len(&child.prefix, text);
            if common < child.prefix.len() {
                child.split(common);
            }
            i
        } else {
            let full_path = String::from_utf8_lossy(&pattern.as_bytes()[..consumed + text.len()]);
            self.indices.push(first);
            self.children.push(Node::with_kind(
                NodeKind::Static,
                text.to_vec(),
                full_path.into_owned(),
            ));
            self.children.len() - 1
        };

        let child = &mut self.children[i];
        let taken = child.prefix.len();
        let consumed = consumed + taken;
        if taken == text.len() {
            child.insert_pieces(rest, pattern, consumed, value)?;
        } else {
            child.insert_literal(&text[taken..], rest, pattern, consumed, value)?;
        }
        child.priority += 1;
        self.reorder(i);
        Ok(())
    }

    /// Splits this static node so that it keeps only the first `at` bytes of
    /// its prefix; everything else moves into a single new child.
    fn split(&mut self, at: usize) {
        let suffix = self.prefix.split_off(at);
        let parent_full_len = self.full_path.len().saturating_sub(suffix.len());
        let parent_full_path =
            String::from_utf8_lossy(&self.full_path.as_bytes()[..parent_full_len]).into_owned();

        let child = Node {
            prefix: suffix,
            kind: NodeKind::Static,
            indices: std::mem::take(&mut self.indices),
            children: std::mem::take(&mut self.children),
            param: self.param.take(),
            catch_all: self.catch_all.take(),
            priority: self.priority,
            value: self.value.take(),
            full_path: std::mem::replace(&mut self.full_path, parent_full_path),
        };

        self.indices = vec![child.prefix[0]];
        self.children = vec![child];
    }

    /// Moves the child at `i` forward past siblings with a lower priority.
    fn reorder(&mut self, mut i: usize) {
        while i > 0 && self.children[i - 1].priority < self.children[i].priority {
            self.children.swap(i - 1, i);
            self.indices.swap(i - 1, i);
            i -= 1;
        }
    }

    /// Looks up the value registered for `path`, filling `params` with the
    /// captured parameters.
    ///
    /// `skipped` is scratch space for untried alternatives; it is cleared on
    /// entry. When `unescape` is set, parameter values are percent-decoded.
    pub fn get_value<'t>(
        &'t self,
        path: &str,
        params: &mut Params,
        skipped: &mut Vec<SkippedNode<'t, T>>,
        unescape: bool,
    ) -> NodeValue<'t, T> {
        match self.search(path, params, skipped, unescape) {
            Some(node) => NodeValue {
                value: node.value.as_ref(),
                tsr: false,
                full_path: &node.full_path,
            },
            None => NodeValue {
                value: None,
                tsr: self.trailing_slash_match(path),
                full_path: "",
            },
        }
    }

    /// Returns whether some route matches `path` exactly.
    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        let mut params = Params::new();
        let mut skipped = Vec::new();
        self.search(path, &mut params, &mut skipped, false).is_some()
    }

    fn search<'t>(
        &'t self,
        path: &str,
        params: &mut Params,
        skipped: &mut Vec<SkippedNode<'t, T>>,
        unescape: bool,
    ) -> Option<&'t Node<T>> {
        let bytes = path.as_bytes();
        let base = params.len();

        skipped.clear();
        skipped.push(SkippedNode {
            node: self,
            pos: 0,
            params_len: base,
        });

        while let Some(SkippedNode {
            node,
            pos,
            params_len,
        }) = skipped.pop()
        {
            params.truncate(params_len);
            let Some(end) = node.consume(path, pos, params, unescape) else {
                continue;
            };

            if end == bytes.len() && node.value.is_some() {
                return Some(node);
            }

            // Pushed in reverse preference: the static child is popped first.
            let params_len = params.len();
            if let Some(catch_all) = node.catch_all.as_deref() {
                skipped.push(SkippedNode {
                    node: catch_all,
                    pos: end,
                    params_len,
                });
            }
            if end < bytes.len() {
                if let Some(param) = node.param.as_deref() {
                    skipped.push(SkippedNode {
                        node: param,
                        pos: end,
                        params_len,
                    });
                }
                if let Some(child) = node.static_child(bytes[end]) {
                    skipped.push(SkippedNode {
                        node: child,
                        pos: end,
                        params_len,
                    });
                }
            }
        }

        params.truncate(base);
        None
    }

    /// Consumes this node's part of `path` starting at `pos`, returning the
    /// position after it.
    fn consume(
        &self,
        path: &str,
        pos: usize,
        params: &mut Params,
        unescape: bool,
    ) -> Option<usize> {
        let rest = &path.as_bytes()[pos..];
        match self.kind {
            NodeKind::Root | NodeKind::Static => {
                rest.starts_with(&self.prefix).then(|| pos + self.prefix.len())
            }
            NodeKind::Param => {
                let len = rest.iter().position(|&b| b == b'/').unwrap_or(rest.len());
                if len == 0 {
                    return None;
                }
                let value = path.get(pos..pos + len)?;
                params.push(self.wildcard_name(), decode(value, unescape));
                Some(pos + len)
            }
            NodeKind::CatchAll => {
                let value = path.get(pos..)?;
                params.push(self.wildcard_name(), decode(value, unescape));
                Some(path.len())
            }
        }
    }

    fn trailing_slash_match(&self, path: &str) -> bool {
        let alternative = match path.strip_suffix('/') {
            Some("") => return false,
            Some(stripped) => Cow::Borrowed(stripped),
            None => Cow::Owned(format!("{path}/")),
        };
        self.contains(&alternative)
    }

    /// Makes a case-insensitive lookup of `path` and returns the registered
    /// spelling of it.
    ///
    /// Parameter values keep the request's spelling. With
    /// `fix_trailing_slash`, a missing or superfluous trailing slash is
    /// corrected as well. Case folding covers ASCII letters only.
    #[must_use]
    pub fn find_case_insensitive_path(
        &self,
        path: &str,
        fix_trailing_slash: bool,
    ) -> Option<String> {
        let mut out = Vec::with_capacity(path.len() + 1);
        if self.find_insensitive(path.as_bytes(), &mut out, fix_trailing_slash) {
            String::from_utf8(out).ok()
        } else {
            None
        }
    }

    fn find_insensitive(&self, path: &[u8], out: &mut Vec<u8>, fix: bool) -> bool {
        let rest = match self.kind {
            NodeKind::Root | NodeKind::Static => {
                let n = self.prefix.len();
                if path.len() >= n && path[..n].eq_ignore_ascii_case(&self.prefix) {
                    out.extend_from_slice(&self.prefix);
                    &path[n..]
                } else {
                    // Only the trailing slash is missing.
                    let missing_slash = fix
                        && self.value.is_some()
                        && n == path.len() + 1
                        && self.prefix[n - 1] == b'/'
                        && path.eq_ignore_ascii_case(&self.prefix[..n - 1]);
                    if missing_slash {
                        out.extend_from_slice(&self.prefix);
                    }
                    return missing_slash;
                }
            }
            NodeKind::Param => {
                let len = path.iter().position(|&b| b == b'/').unwrap_or(path.len());
                if len == 0 {
                    return false;
                }
                out.extend_from_slice(&path[..len]);
                &path[len..]
            }
            NodeKind::CatchAll => {
                out.extend_from_slice(path);
                return true;
            }
        };

        if rest.is_empty() && self.value.is_some() {
            return true;
        }

        let mark = out.len();
        match rest.first() {
            Some(first) => {
                for child in &self.children {
                    if child.prefix[0].eq_ignore_ascii_case(first) {
                        if child.find_insensitive(rest, out, fix) {
                            return true;
                        }
                        out.truncate(mark);
                    }
                }
                if let Some(param) = self.param.as_deref() {
                    if param.find_insensitive(rest, out, fix) {
                        return true;
                    }
                    out.truncate(mark);
                }
            }
            None if fix => {
                if let Some(child) = self.static_child(b'/') {
                    if child.find_insensitive(rest, out, fix) {
                        return true;
                    }
                    out.truncate(mark);
                }
            }
            None => {}
        }

        if let Some(catch_all) = self.catch_all.as_deref() {
            if catch_all.find_insensitive(rest, out, fix) {
                return true;
            }
            out.truncate(mark);
        }

        // Only a superfluous trailing slash is left.
        fix && rest == b"/" && self.value.is_some()
    }

    /// Returns every registered pattern with its value.
    #[must_use]
    pub fn routes(&self) -> Vec<(&str, &T)> {
        let mut routes = Vec::new();
        self.collect_routes(&mut routes);
        routes
    }

    fn collect_routes<'t>(&'t self, routes: &mut Vec<(&'t str, &'t T)>) {
        if let Some(value) = &self.value {
            routes.push((&self.full_path, value));
        }
        for child in &self.children {
            child.collect_routes(routes);
        }
        if let Some(param) = self.param.as_deref() {
            param.collect_routes(routes);
        }
        if let Some(catch_all) = self.catch_all.as_deref() {
            catch_all.collect_routes(routes);
        }
    }
}

impl<T> fmt::Debug for Node<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("prefix", &self.prefix())
            .field("kind", &self.kind)
            .field("priority", &self.priority)
            .field("has_value", &self.value.is_some())
            .field("children", &self.children)
            .field("param", &self.param)
            .field("catch_all", &self.catch_all)
            .finish()
    }
}

fn common_prefix_len(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}

fn decode(value: &str, unescape: bool) -> String {
    if unescape {
        if let Ok(decoded) = urlencoding::decode(value) {
            return decoded.into_owned();
        }
    }
    value.to_string()
}
