//! Application errors attached to a request by its handlers.

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

/// Boxed error type accepted by [`Error::new`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Who may see an error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ErrorType {
    /// Internal only; never sent to clients.
    #[default]
    Private,
    /// Safe to expose in a response.
    Public,
    /// No visibility was chosen.
    Unclassified,
}

/// An error attached to a request, with a visibility kind and optional
/// metadata.
#[derive(Debug, Clone)]
pub struct Error {
    err: Arc<dyn std::error::Error + Send + Sync>,
    kind: ErrorType,
    meta: Option<Value>,
}

impl Error {
    /// Wraps an error with the given visibility.
    ///
    /// # Panics
    ///
    /// Panics when the error's message is empty; attaching a blank error is a
    /// programming fault.
    #[track_caller]
    pub fn new(err: impl Into<BoxError>, kind: ErrorType) -> Self {
        let err: BoxError = err.into();
        assert!(!err.to_string().is_empty(), "err can not be empty");
        Self {
            err: Arc::from(err),
            kind,
            meta: None,
        }
    }

    /// Returns the visibility kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorType {
        self.kind
    }

    /// Changes the visibility kind.
    pub fn set_type(&mut self, kind: ErrorType) -> &mut Self {
        self.kind = kind;
        self
    }

    /// Attaches metadata, rendered alongside the message.
    pub fn set_meta(&mut self, meta: Value) -> &mut Self {
        self.meta = Some(meta);
        self
    }

    /// Returns the attached metadata.
    #[must_use]
    pub const fn meta(&self) -> Option<&Value> {
        self.meta.as_ref()
    }

    /// Returns whether this error has the given kind.
    #[must_use]
    pub fn is_type(&self, kind: ErrorType) -> bool {
        self.kind == kind
    }

    /// Returns the wrapped error.
    #[must_use]
    pub fn inner(&self) -> &(dyn std::error::Error + Send + Sync) {
        self.err.as_ref()
    }

    /// Renders the error as a JSON object.
    ///
    /// Object metadata is merged into the result; any other metadata lands
    /// under `"meta"`. The message is stored under `"error"` unless the
    /// metadata already provides one.
    #[must_use]
    pub fn json(&self) -> Value {
        let mut data = Map::new();
        match &self.meta {
            Some(Value::Object(fields)) => data.extend(fields.clone()),
            Some(other) => {
                data.insert("meta".to_string(), other.clone());
            }
            None => {}
        }
        data.entry("error")
            .or_insert_with(|| Value::String(self.err.to_string()));
        Value::Object(data)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.err)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.err.as_ref())
    }
}

/// The errors attached to one request, in attachment order.
#[derive(Debug, Clone, Default)]
pub struct Errors(Vec<Error>);

impl Errors {
    /// Creates an empty list.
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Appends an error and returns it for further decoration.
    pub fn push(&mut self, err: Error) -> &mut Error {
        self.0.push(err);
        let last = self.0.len() - 1;
        &mut self.0[last]
    }

    /// Returns the most recent error.
    #[must_use]
    pub fn last(&self) -> Option<&Error> {
        self.0.last()
    }

    /// Returns the errors of one kind.
    #[must_use]
    pub fn by_type(&self, kind: ErrorType) -> Vec<&Error> {
        self.0.iter().filter(|e| e.is_type(kind)).collect()
    }

    /// Returns every error message.
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.0.iter().map(ToString::to_string).collect()
    }

    /// Renders the list as JSON: `null` when empty, the single object for one
    /// error, an array otherwise.
    #[must_use]
    pub fn json(&self) -> Value {
        match self.0.as_slice() {
            [] => Value::Null,
            [only] => only.json(),
            all => Value::Array(all.iter().map(Error::json).collect()),
        }
    }

    /// Returns an iterator over the errors.
    pub fn iter(&self) -> std::slice::Iter<'_, Error> {
        self.0.iter()
    }

    /// Returns the number of errors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns whether no error was attached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Removes all errors, keeping the allocation.
    pub fn clear(&mut self) {
        self.0.clear();
    }
}

impl fmt::Display for Errors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.0.iter().enumerate() {
            writeln!(f, "Error #{:02}: {}", i + 1, err)?;
            if let Some(meta) = &err.meta {
                writeln!(f, "     Meta: {meta}")?;
            }
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a Errors {
    type Item = &'a Error;
    type IntoIter = std::slice::Iter<'a, Error>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
