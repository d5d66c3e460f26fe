//! Parameters captured while matching a path.

/// A single captured URL parameter, a key and a value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Param {
    /// Name of the wildcard in the route pattern.
    pub key: String,
    /// Text captured from the request path.
    pub value: String,
}

/// Path parameters extracted from the URL, in traversal order.
///
/// The first parameter of a pattern is the first in the list, so indexing is
/// safe and cheap. Keys are unique within one match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    params: Vec<Param>,
}

impl Params {
    /// Creates new empty path params.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates empty params with room for `capacity` entries.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            params: Vec::with_capacity(capacity),
        }
    }

    /// Appends a parameter.
    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.params.push(Param {
            key: key.into(),
            value: value.into(),
        });
    }

    /// Gets a parameter value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|p| p.key == key)
            .map(|p| p.value.as_str())
    }

    /// Returns the value of the first parameter with the given key, or an
    /// empty string.
    #[must_use]
    pub fn by_name(&self, key: &str) -> &str {
        self.get(key).unwrap_or_default()
    }

    /// Gets a parameter value or returns an error.
    pub fn require(&self, key: &str) -> Result<&str, String> {
        self.get(key)
            .ok_or_else(|| format!("Missing path parameter: {key}"))
    }

    /// Parses a parameter as a specific type.
    #[must_use]
    pub fn parse<T: std::str::FromStr>(&self, key: &str) -> Option<T> {
        self.get(key).and_then(|v| v.parse().ok())
    }

    /// Returns an iterator over the parameters.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params
            .iter()
            .map(|p| (p.key.as_str(), p.value.as_str()))
    }

    /// Returns the number of captured parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Returns whether nothing was captured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Returns the allocated capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.params.capacity()
    }

    /// Removes all parameters, keeping the allocation.
    pub fn clear(&mut self) {
        self.params.clear();
    }

    pub(crate) fn truncate(&mut self, len: usize) {
        self.params.truncate(len);
    }

    /// Returns the parameters as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[Param] {
        &self.params
    }
}

impl<'a> IntoIterator for &'a Params {
    type Item = &'a Param;
    type IntoIter = std::slice::Iter<'a, Param>;

    fn into_iter(self) -> Self::IntoIter {
        self.params.iter()
    }
}
