//! Engine configuration.

use serde::Deserialize;

use crate::error::Result;

/// Routing behaviour of an [`Engine`](crate::Engine).
///
/// Every field has a default, so a configuration document only needs to list
/// what it changes.
///
/// # Example
///
/// ```
/// use oxide_dispatch::EngineConfig;
///
/// let config = EngineConfig::from_json(r#"{"handle_method_not_allowed": true}"#).unwrap();
/// assert!(config.handle_method_not_allowed);
/// assert!(config.redirect_trailing_slash);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
#[allow(clippy::struct_excessive_bools)]
pub struct EngineConfig {
    /// Redirect to the same path with the trailing slash added or removed
    /// when only that variant is registered.
    pub redirect_trailing_slash: bool,
    /// Redirect to the cleaned, case-corrected path when it is registered.
    pub redirect_fixed_path: bool,
    /// Answer 405 with an `Allow` header when the path exists under other
    /// methods.
    pub handle_method_not_allowed: bool,
    /// Route on the undecoded path when the request carries one.
    pub use_raw_path: bool,
    /// Percent-decode parameter values captured from the undecoded path.
    pub unescape_path_values: bool,
    /// Collapse repeated slashes and dot segments before routing.
    pub remove_extra_slash: bool,
    /// How the client address is derived.
    pub client_ip: ClientIpConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            redirect_trailing_slash: true,
            redirect_fixed_path: false,
            handle_method_not_allowed: false,
            use_raw_path: false,
            unescape_path_values: true,
            remove_extra_slash: false,
            client_ip: ClientIpConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Parses a configuration from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error when the document is not valid JSON or a field has
    /// the wrong type.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Where the client address comes from.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientIpConfig {
    /// Read the address from `remote_ip_headers` when the peer is trusted.
    pub forwarded_by_client_ip: bool,
    /// Headers carrying the client address, tried in order.
    pub remote_ip_headers: Vec<String>,
    /// Proxies allowed to set those headers, as addresses or CIDR ranges.
    pub trusted_proxies: Vec<String>,
    /// Header set by a hosting platform that always wins, e.g.
    /// `CF-Connecting-IP`.
    pub trusted_platform: Option<String>,
}

impl Default for ClientIpConfig {
    fn default() -> Self {
        Self {
            forwarded_by_client_ip: true,
            remote_ip_headers: vec!["X-Forwarded-For".to_string(), "X-Real-IP".to_string()],
            trusted_proxies: vec!["0.0.0.0/0".to_string(), "::/0".to_string()],
            trusted_platform: None,
        }
    }
}
