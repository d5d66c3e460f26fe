//! HTTP response type and the writer handlers fill it through.

use std::collections::HashMap;

use tracing::warn;

const NOT_WRITTEN: i64 = -1;

/// Status used until a handler picks one.
pub const DEFAULT_STATUS: u16 = 200;

/// A finished HTTP response.
#[derive(Debug, Clone)]
pub struct Response {
    /// HTTP status code.
    pub status: u16,
    /// Response headers.
    pub headers: HashMap<String, String>,
    /// Response body.
    pub body: Vec<u8>,
}

impl Response {
    /// Creates a new response with the given status.
    #[must_use]
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: Vec::new(),
        }
    }

    /// Gets a header value.
    #[must_use]
    pub fn get_header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Returns the body as a string.
    #[must_use]
    pub fn body_string(&self) -> Option<String> {
        String::from_utf8(self.body.clone()).ok()
    }

    /// Returns the status text for the current status code.
    #[must_use]
    pub const fn status_text(&self) -> &'static str {
        match self.status {
            200 => "OK",
            201 => "Created",
            204 => "No Content",
            301 => "Moved Permanently",
            302 => "Found",
            304 => "Not Modified",
            307 => "Temporary Redirect",
            308 => "Permanent Redirect",
            400 => "Bad Request",
            401 => "Unauthorized",
            403 => "Forbidden",
            404 => "Not Found",
            405 => "Method Not Allowed",
            409 => "Conflict",
            422 => "Unprocessable Entity",
            500 => "Internal Server Error",
            502 => "Bad Gateway",
            503 => "Service Unavailable",
            _ => "Unknown",
        }
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new(DEFAULT_STATUS)
    }
}

/// Buffers the response of one request.
///
/// The status and headers stay mutable until they are flushed, either
/// explicitly with [`write_header_now`](Self::write_header_now) or by the
/// first body write. Later changes are ignored with a warning.
#[derive(Debug)]
pub struct ResponseWriter {
    status: u16,
    size: i64,
    headers: HashMap<String, String>,
    body: Vec<u8>,
}

impl Default for ResponseWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseWriter {
    /// Creates an unwritten writer with status 200.
    #[must_use]
    pub fn new() -> Self {
        Self {
            status: DEFAULT_STATUS,
            size: NOT_WRITTEN,
            headers: HashMap::new(),
            body: Vec::new(),
        }
    }

    /// Returns the pending or flushed status.
    #[must_use]
    pub const fn status(&self) -> u16 {
        self.status
    }

    /// Returns the number of body bytes written, or -1 before the headers
    /// were flushed.
    #[must_use]
    pub const fn size(&self) -> i64 {
        self.size
    }

    /// Returns whether the headers were flushed.
    #[must_use]
    pub const fn written(&self) -> bool {
        self.size != NOT_WRITTEN
    }

    /// Sets the status to send. Ignored once the headers were flushed.
    pub fn write_header(&mut self, code: u16) {
        if code == 0 || self.status == code {
            return;
        }
        if self.written() {
            warn!(
                from = self.status,
                to = code,
                "Headers were already written, status change ignored"
            );
            return;
        }
        self.status = code;
    }

    /// Flushes the status and headers if that did not happen yet.
    pub fn write_header_now(&mut self) {
        if !self.written() {
            self.size = 0;
        }
    }

    /// Appends to the body, flushing the headers first. Returns the number of
    /// bytes written.
    pub fn write(&mut self, data: &[u8]) -> usize {
        self.write_header_now();
        self.body.extend_from_slice(data);
        self.size += i64::try_from(data.len()).unwrap_or(i64::MAX);
        data.len()
    }

    /// Appends a string to the body.
    pub fn write_string(&mut self, s: &str) -> usize {
        self.write(s.as_bytes())
    }

    /// Sets a header. Ignored once the headers were flushed.
    pub fn set_header(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        if self.written() {
            warn!(header = %key, "Headers were already written, header change ignored");
            return;
        }
        self.remove_key(&key);
        self.headers.insert(key, value.into());
    }

    /// Removes a header. Ignored once the headers were flushed.
    pub fn remove_header(&mut self, key: &str) {
        if self.written() {
            warn!(header = %key, "Headers were already written, header removal ignored");
            return;
        }
        self.remove_key(key);
    }

    fn remove_key(&mut self, key: &str) {
        self.headers.retain(|k, _| !k.eq_ignore_ascii_case(key));
    }

    /// Gets a pending or flushed header.
    #[must_use]
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Returns the body written so far.
    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Moves the buffered response out, leaving the writer empty.
    pub fn take_response(&mut self) -> Response {
        Response {
            status: self.status,
            headers: std::mem::take(&mut self.headers),
            body: std::mem::take(&mut self.body),
        }
    }

    /// Returns the writer to its unwritten state.
    pub fn reset(&mut self) {
        self.status = DEFAULT_STATUS;
        self.size = NOT_WRITTEN;
        self.headers.clear();
        self.body.clear();
    }
}
