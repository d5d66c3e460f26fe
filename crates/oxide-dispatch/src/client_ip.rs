//! Client address resolution behind trusted proxies.

use std::net::IpAddr;

use ipnetwork::IpNetwork;

use crate::config::ClientIpConfig;
use crate::error::{Result, RouterError};
use crate::request::Request;

/// Resolves the address of the client that sent a request.
#[derive(Debug, Clone)]
pub struct ClientIpResolver {
    forwarded_by_client_ip: bool,
    remote_ip_headers: Vec<String>,
    trusted_proxies: Vec<IpNetwork>,
    trusted_platform: Option<String>,
}

impl Default for ClientIpResolver {
    fn default() -> Self {
        let config = ClientIpConfig::default();
        Self {
            forwarded_by_client_ip: config.forwarded_by_client_ip,
            remote_ip_headers: config.remote_ip_headers,
            trusted_proxies: config
                .trusted_proxies
                .iter()
                .filter_map(|entry| parse_proxy(entry).ok())
                .collect(),
            trusted_platform: config.trusted_platform,
        }
    }
}

impl ClientIpResolver {
    /// Builds a resolver, parsing the trusted proxy list.
    ///
    /// # Errors
    ///
    /// Returns an error when a trusted proxy entry is neither an IP address
    /// nor a CIDR range.
    pub fn from_config(config: &ClientIpConfig) -> Result<Self> {
        let trusted_proxies = config
            .trusted_proxies
            .iter()
            .map(|entry| parse_proxy(entry))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            forwarded_by_client_ip: config.forwarded_by_client_ip,
            remote_ip_headers: config.remote_ip_headers.clone(),
            trusted_proxies,
            trusted_platform: config.trusted_platform.clone(),
        })
    }

    /// Returns whether `ip` belongs to a trusted proxy.
    #[must_use]
    pub fn is_trusted(&self, ip: IpAddr) -> bool {
        self.trusted_proxies.iter().any(|net| net.contains(ip))
    }

    /// Returns the client address of `request`.
    ///
    /// A trusted platform header wins outright. Otherwise, when the peer is a
    /// trusted proxy, each remote-ip header is walked from its last entry
    /// back, stopping at the first address not owned by a trusted proxy.
    /// Anything malformed falls back to the peer address.
    #[must_use]
    pub fn client_ip(&self, request: &Request) -> String {
        if let Some(platform) = &self.trusted_platform {
            if let Some(addr) = request.get_header(platform).filter(|v| !v.is_empty()) {
                return addr.to_string();
            }
        }

        let Some(peer) = request.remote_addr.map(|addr| addr.ip()) else {
            return String::new();
        };

        if self.forwarded_by_client_ip && self.is_trusted(peer) {
            for name in &self.remote_ip_headers {
                if let Some(ip) = request
                    .get_header(name)
                    .and_then(|value| self.forwarded_client(value))
                {
                    return ip;
                }
            }
        }

        peer.to_string()
    }

    fn forwarded_client(&self, header: &str) -> Option<String> {
        let items: Vec<&str> = header.split(',').collect();
        for (i, item) in items.iter().enumerate().rev() {
            let item = item.trim();
            let ip: IpAddr = item.parse().ok()?;
            if i == 0 || !self.is_trusted(ip) {
                return Some(item.to_string());
            }
        }
        None
    }
}

/// Returns the peer address of `request`, without the port.
#[must_use]
pub fn remote_ip(request: &Request) -> String {
    request
        .remote_addr
        .map(|addr| addr.ip().to_string())
        .unwrap_or_default()
}

fn parse_proxy(entry: &str) -> Result<IpNetwork> {
    let invalid = |reason: String| RouterError::InvalidProxy {
        entry: entry.to_string(),
        reason,
    };

    if entry.contains('/') {
        entry.parse::<IpNetwork>().map_err(|e| invalid(e.to_string()))
    } else {
        entry
            .parse::<IpAddr>()
            .map(IpNetwork::from)
            .map_err(|e| invalid(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver(trusted: &[&str]) -> ClientIpResolver {
        let config = ClientIpConfig {
            trusted_proxies: trusted.iter().map(ToString::to_string).collect(),
            ..ClientIpConfig::default()
        };
        ClientIpResolver::from_config(&config).unwrap()
    }

    fn request(peer: &str) -> Request {
        Request::get("/").remote_addr(peer.parse().unwrap())
    }

    #[test]
    fn test_trusts_everything_by_default() {
        let resolver = ClientIpResolver::default();
        assert!(resolver.is_trusted("10.1.2.3".parse().unwrap()));
        assert!(resolver.is_trusted("::1".parse().unwrap()));

        let req = request("10.0.0.1:4000").header("X-Forwarded-For", "20.20.20.20, 30.30.30.30");
        assert_eq!(resolver.client_ip(&req), "30.30.30.30");
    }

    #[test]
    fn test_walks_past_trusted_hops() {
        let resolver = resolver(&["10.0.0.0/8"]);
        let req = request("10.0.0.1:4000")
            .header("X-Forwarded-For", "1.1.1.1, 20.20.20.20, 10.0.0.2");
        assert_eq!(resolver.client_ip(&req), "20.20.20.20");

        let req = request("10.0.0.1:4000").header("X-Forwarded-For", "10.0.0.3, 10.0.0.2");
        assert_eq!(resolver.client_ip(&req), "10.0.0.3");
    }

    #[test]
    fn test_untrusted_peer_ignores_headers() {
        let resolver = resolver(&["10.0.0.0/8"]);
        let req = request("8.8.8.8:4000").header("X-Forwarded-For", "1.1.1.1");
        assert_eq!(resolver.client_ip(&req), "8.8.8.8");
    }

    #[test]
    fn test_malformed_header_falls_back() {
        let resolver = resolver(&["10.0.0.1"]);
        let req = request("10.0.0.1:4000")
            .header("X-Forwarded-For", "not-an-ip")
            .header("X-Real-IP", "40.40.40.40");
        assert_eq!(resolver.client_ip(&req), "40.40.40.40");

        let req = request("10.0.0.1:4000").header("X-Forwarded-For", "garbage");
        assert_eq!(resolver.client_ip(&req), "10.0.0.1");
    }

    #[test]
    fn test_trusted_platform_wins() {
        let config = ClientIpConfig {
            trusted_platform: Some("CF-Connecting-IP".to_string()),
            ..ClientIpConfig::default()
        };
        let resolver = ClientIpResolver::from_config(&config).unwrap();
        let req = request("10.0.0.1:4000")
            .header("CF-Connecting-IP", "50.50.50.50")
            .header("X-Forwarded-For", "1.1.1.1");
        assert_eq!(resolver.client_ip(&req), "50.50.50.50");
    }

    #[test]
    fn test_invalid_proxy_entry() {
        let config = ClientIpConfig {
            trusted_proxies: vec!["10.0.0.0/99".to_string()],
            ..ClientIpConfig::default()
        };
        assert!(matches!(
            ClientIpResolver::from_config(&config),
            Err(RouterError::InvalidProxy { .. })
        ));

        let config = ClientIpConfig {
            trusted_proxies: vec!["proxy.local".to_string()],
            ..ClientIpConfig::default()
        };
        assert!(ClientIpResolver::from_config(&config).is_err());
    }

    #[test]
    fn test_remote_ip_strips_port() {
        assert_eq!(remote_ip(&request("[::1]:8080")), "::1");
        assert_eq!(remote_ip(&Request::get("/")), "");
    }
}
