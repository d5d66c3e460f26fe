//! HTTP request type.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Instant;

/// An inbound HTTP request as handed over by the transport.
#[derive(Debug, Clone, Default)]
pub struct Request {
    /// HTTP method token.
    pub method: String,
    /// Decoded request path.
    pub path: String,
    /// Path as sent on the wire, when it differs from the decoded one.
    pub raw_path: Option<String>,
    /// Query string without the leading `?`.
    pub raw_query: String,
    /// Request headers.
    pub headers: HashMap<String, String>,
    /// Request body.
    pub body: Vec<u8>,
    /// Address of the connected peer.
    pub remote_addr: Option<SocketAddr>,
    /// Deadline set by the transport, if any.
    pub deadline: Option<Instant>,
}

impl Request {
    /// Creates a new request. A query string in `target` is split off into
    /// [`Request::raw_query`].
    pub fn new(method: impl AsRef<str>, target: impl Into<String>) -> Self {
        let mut path = target.into();
        let raw_query = path
            .find('?')
            .map(|at| {
                let query = path[at + 1..].to_string();
                path.truncate(at);
                query
            })
            .unwrap_or_default();

        Self {
            method: method.as_ref().to_string(),
            path,
            raw_query,
            ..Self::default()
        }
    }

    /// Creates a GET request.
    pub fn get(target: impl Into<String>) -> Self {
        Self::new("GET", target)
    }

    /// Creates a POST request.
    pub fn post(target: impl Into<String>) -> Self {
        Self::new("POST", target)
    }

    /// Sets a header.
    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Sets the body.
    #[must_use]
    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Sets a URL-encoded form body.
    #[must_use]
    pub fn form(self, body: impl Into<Vec<u8>>) -> Self {
        self.header("Content-Type", "application/x-www-form-urlencoded")
            .body(body)
    }

    /// Sets the undecoded path.
    #[must_use]
    pub fn raw_path(mut self, raw_path: impl Into<String>) -> Self {
        self.raw_path = Some(raw_path.into());
        self
    }

    /// Sets the peer address.
    #[must_use]
    pub fn remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    /// Sets the deadline.
    #[must_use]
    pub fn deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Gets a header value.
    #[must_use]
    pub fn get_header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Returns the media type of the body, without parameters.
    #[must_use]
    pub fn content_type(&self) -> &str {
        self.get_header("Content-Type")
            .and_then(|v| v.split(';').next())
            .map_or("", str::trim)
    }

    /// Returns the path followed by the query string, if any.
    #[must_use]
    pub fn uri(&self) -> String {
        if self.raw_query.is_empty() {
            self.path.clone()
        } else {
            format!("{}?{}", self.path, self.raw_query)
        }
    }

    /// Parses the query string into ordered key/value pairs.
    #[must_use]
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        parse_urlencoded(&self.raw_query)
    }

    /// Parses a URL-encoded form body into ordered key/value pairs.
    ///
    /// Bodies of any other content type yield no pairs.
    #[must_use]
    pub fn form_pairs(&self) -> Vec<(String, String)> {
        if self.content_type() != "application/x-www-form-urlencoded" {
            return Vec::new();
        }
        std::str::from_utf8(&self.body)
            .map(parse_urlencoded)
            .unwrap_or_default()
    }

    /// Returns the body as a string.
    #[must_use]
    pub fn body_string(&self) -> Option<String> {
        String::from_utf8(self.body.clone()).ok()
    }

    /// Parses the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns an error when the body is not valid JSON for `T`.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

/// Parses `application/x-www-form-urlencoded` text, keeping pair order and
/// repeated keys.
#[must_use]
pub fn parse_urlencoded(input: &str) -> Vec<(String, String)> {
    input
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (decode_component(key), decode_component(value))
        })
        .collect()
}

fn decode_component(s: &str) -> String {
    let spaced = s.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => spaced,
    }
}
