//! Swarm endpoint parsing
//!
//! Accepts the same shapes as Docker's `-H` flag: a bare host, `host:port`,
//! `tcp://host:port`, `http(s)://host:port`. A `version` query parameter
//! overrides the API version, e.g. `manager:2375?version=v1.41`.

use url::Url;

use crate::error::{Result, SwarmError};

/// Default Docker daemon port for plain TCP
pub const DEFAULT_PORT: u16 = 2375;

/// Docker Engine API version used unless overridden
pub const DEFAULT_API_VERSION: &str = "v1.37";

/// Where a Swarm manager's API can be reached
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwarmEndpoint {
    pub scheme: String,
    pub host: String,
    pub port: u16,
    pub version: String,
}

impl SwarmEndpoint {
    /// Parse an endpoint string
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        let invalid = |reason: &str| SwarmError::InvalidEndpoint {
            endpoint: input.to_string(),
            reason: reason.to_string(),
        };

        if input.is_empty() {
            return Err(invalid("endpoint is empty"));
        }

        let normalized = if input.contains("://") {
            input.to_string()
        } else {
            format!("http://{}", input)
        };
        let url = Url::parse(&normalized).map_err(|e| invalid(&e.to_string()))?;

        let scheme = match url.scheme() {
            "http" | "tcp" => "http",
            "https" => "https",
            other => return Err(invalid(&format!("unsupported scheme '{}'", other))),
        };

        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| invalid("missing host"))?
            .to_string();

        // `Url` hides ports equal to the scheme default; keep them only when written out.
        let port = match url.port() {
            Some(port) => port,
            None => match url.port_or_known_default() {
                Some(known) if input.contains(&format!(":{}", known)) => known,
                _ => DEFAULT_PORT,
            },
        };

        let version = url
            .query_pairs()
            .find(|(key, _)| key == "version")
            .map(|(_, value)| normalize_version(&value))
            .unwrap_or_else(|| DEFAULT_API_VERSION.to_string());

        Ok(Self {
            scheme: scheme.to_string(),
            host,
            port,
            version,
        })
    }

    /// Base URL for API calls, including the version prefix
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}/{}", self.scheme, self.host, self.port, self.version)
    }
}

impl std::fmt::Display for SwarmEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}://{}:{}", self.scheme, self.host, self.port)
    }
}

fn normalize_version(version: &str) -> String {
    if version.starts_with('v') {
        version.to_string()
    } else {
        format!("v{}", version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_host() {
        let endpoint = SwarmEndpoint::parse("manager").unwrap();
        assert_eq!(endpoint.scheme, "http");
        assert_eq!(endpoint.host, "manager");
        assert_eq!(endpoint.port, DEFAULT_PORT);
        assert_eq!(endpoint.version, DEFAULT_API_VERSION);
        assert_eq!(endpoint.base_url(), "http://manager:2375/v1.37");
    }

    #[test]
    fn test_host_and_port() {
        let endpoint = SwarmEndpoint::parse("localhost:32768").unwrap();
        assert_eq!(endpoint.host, "localhost");
        assert_eq!(endpoint.port, 32768);
    }

    #[test]
    fn test_tcp_scheme_maps_to_http() {
        let endpoint = SwarmEndpoint::parse("tcp://10.0.0.5:2377").unwrap();
        assert_eq!(endpoint.scheme, "http");
        assert_eq!(endpoint.host, "10.0.0.5");
        assert_eq!(endpoint.port, 2377);
    }

    #[test]
    fn test_explicit_default_port_is_kept() {
        let endpoint = SwarmEndpoint::parse("http://proxy:80").unwrap();
        assert_eq!(endpoint.port, 80);

        let endpoint = SwarmEndpoint::parse("https://secure").unwrap();
        assert_eq!(endpoint.scheme, "https");
        assert_eq!(endpoint.port, DEFAULT_PORT);
    }

    #[test]
    fn test_version_override() {
        let endpoint = SwarmEndpoint::parse("manager:2375?version=v1.41").unwrap();
        assert_eq!(endpoint.version, "v1.41");

        let endpoint = SwarmEndpoint::parse("manager?version=1.40").unwrap();
        assert_eq!(endpoint.version, "v1.40");
        assert_eq!(endpoint.base_url(), "http://manager:2375/v1.40");
    }

    #[test]
    fn test_rejects_unix_socket_and_empty() {
        assert!(matches!(
            SwarmEndpoint::parse("unix:///var/run/docker.sock"),
            Err(SwarmError::InvalidEndpoint { .. })
        ));
        assert!(matches!(
            SwarmEndpoint::parse("   "),
            Err(SwarmError::InvalidEndpoint { .. })
        ));
    }
}
