//! Route pattern parsing and path helpers.

use crate::error::{InsertError, Result};

/// A piece of a parsed route pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Piece<'a> {
    /// Literal text, possibly spanning several segments.
    Literal(&'a str),
    /// A `:name` parameter, matching one segment.
    Param(&'a str),
    /// A `*name` catch-all, matching the rest of the path.
    CatchAll(&'a str),
}

/// Splits a route pattern into literal and wildcard pieces.
///
/// Pattern syntax:
/// - `/users` - Literal path
/// - `/users/:id` - Path with parameter
/// - `/files/*path` - Catch-all (matches remainder of path)
pub(crate) fn parse(pattern: &str) -> Result<Vec<Piece<'_>>> {
    if !pattern.starts_with('/') {
        return Err(InsertError::MissingLeadingSlash(pattern.to_string()));
    }

    let mut pieces = Vec::new();
    let mut names: Vec<&str> = Vec::new();
    let mut rest = pattern;

    while let Some(start) = rest.find([':', '*']) {
        if start > 0 {
            pieces.push(Piece::Literal(&rest[..start]));
        }

        let marker = rest.as_bytes()[start];
        let wildcard = &rest[start..];
        let end = wildcard.find('/').unwrap_or(wildcard.len());
        let name = &wildcard[1..end];

        if name.is_empty() {
            return Err(InsertError::EmptyWildcardName(pattern.to_string()));
        }
        if name.contains([':', '*']) {
            return Err(InsertError::MultipleWildcards {
                segment: wildcard[..end].to_string(),
                path: pattern.to_string(),
            });
        }
        if names.contains(&name) {
            return Err(InsertError::DuplicateParamName {
                name: name.to_string(),
                path: pattern.to_string(),
            });
        }
        names.push(name);

        if marker == b'*' {
            if end != wildcard.len() {
                return Err(InsertError::CatchAllNotLast(pattern.to_string()));
            }
            if !rest[..start].ends_with('/') {
                return Err(InsertError::CatchAllWithoutSlash(pattern.to_string()));
            }
            pieces.push(Piece::CatchAll(name));
        } else {
            pieces.push(Piece::Param(name));
        }

        rest = &wildcard[end..];
    }

    if !rest.is_empty() {
        pieces.push(Piece::Literal(rest));
    }

    Ok(pieces)
}

/// Counts the wildcards (`:` and `*`) in a pattern.
#[must_use]
pub fn count_params(path: &str) -> u16 {
    let n = path.bytes().filter(|&b| b == b':' || b == b'*').count();
    u16::try_from(n).unwrap_or(u16::MAX)
}

/// Counts the path sections (`/`) in a pattern.
#[must_use]
pub fn count_sections(path: &str) -> u16 {
    let n = path.bytes().filter(|&b| b == b'/').count();
    u16::try_from(n).unwrap_or(u16::MAX)
}

/// Returns the canonical form of a URL path.
///
/// Repeated slashes collapse into one, `.` elements are dropped and `..`
/// elements remove the preceding element. The result always starts with `/`
/// and keeps a trailing slash when the input had one.
///
/// # Example
///
/// ```
/// use oxide_tree::clean_path;
///
/// assert_eq!(clean_path("//a/./b/../c/"), "/a/c/");
/// assert_eq!(clean_path(""), "/");
/// ```
#[must_use]
pub fn clean_path(path: &str) -> String {
    if path.is_empty() {
        return "/".to_string();
    }

    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }

    let mut cleaned = String::with_capacity(path.len() + 1);
    for part in &parts {
        cleaned.push('/');
        cleaned.push_str(part);
    }

    if cleaned.is_empty() || (path.ends_with('/') && !parts.is_empty()) {
        cleaned.push('/');
    }

    cleaned
}
