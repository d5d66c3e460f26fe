//! HTTP request methods.

use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Result, RouterError};

static METHOD_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new("^[A-Z]+$").expect("method token pattern is valid"));

/// The standard HTTP methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// GET method
    Get,
    /// POST method
    Post,
    /// PUT method
    Put,
    /// PATCH method
    Patch,
    /// DELETE method
    Delete,
    /// HEAD method
    Head,
    /// OPTIONS method
    Options,
    /// CONNECT method
    Connect,
    /// TRACE method
    Trace,
}

impl Method {
    /// Every method registered by `any`.
    pub const ALL: [Self; 9] = [
        Self::Get,
        Self::Post,
        Self::Put,
        Self::Patch,
        Self::Head,
        Self::Options,
        Self::Delete,
        Self::Connect,
        Self::Trace,
    ];

    /// Returns the method as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
            Self::Connect => "CONNECT",
            Self::Trace => "TRACE",
        }
    }
}

impl FromStr for Method {
    type Err = RouterError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| RouterError::InvalidMethod(s.to_string()))
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AsRef<str> for Method {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

/// Checks that a method token may be used for registration.
///
/// Any upper-case ASCII token is accepted, so extension methods such as
/// `PROPFIND` can be routed too.
///
/// # Errors
///
/// Returns an error when the token is empty or not upper-case letters only.
pub fn validate(method: &str) -> Result<()> {
    if method.is_empty() {
        return Err(RouterError::EmptyMethod);
    }
    if !METHOD_TOKEN.is_match(method) {
        return Err(RouterError::InvalidMethod(method.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_parsing() {
        assert_eq!("GET".parse::<Method>().ok(), Some(Method::Get));
        assert_eq!("TRACE".parse::<Method>().ok(), Some(Method::Trace));
        assert!("get".parse::<Method>().is_err());
    }

    #[test]
    fn test_validate_tokens() {
        assert!(validate("GET").is_ok());
        assert!(validate("PROPFIND").is_ok());
        assert!(matches!(validate(""), Err(RouterError::EmptyMethod)));
        assert!(matches!(validate("get"), Err(RouterError::InvalidMethod(_))));
        assert!(matches!(validate("GE T"), Err(RouterError::InvalidMethod(_))));
    }
}
