//! Candidate connection targets.

use std::fmt;

use url::Url;

use crate::error::NetError;

/// A connection target: scheme, host, port and path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    scheme: String,
    host: String,
    port: u16,
    path: String,
}

impl Endpoint {
    /// Build an endpoint from parts. The path is normalized to start with `/`.
    pub fn new(
        scheme: impl Into<String>,
        host: impl Into<String>,
        port: u16,
        path: impl AsRef<str>,
    ) -> Self {
        Self {
            scheme: scheme.into(),
            host: host.into(),
            port,
            path: normalize_path(path.as_ref()),
        }
    }

    /// Parse a `ws://`, `wss://`, `http://` or `https://` URL.
    ///
    /// HTTP schemes are mapped onto their WebSocket counterparts. A missing
    /// port falls back to the scheme default.
    pub fn parse(input: &str) -> Result<Self, NetError> {
        let invalid = |reason: &str| NetError::InvalidEndpoint {
            url: input.to_string(),
            reason: reason.to_string(),
        };

        let url = Url::parse(input).map_err(|e| invalid(&e.to_string()))?;
        let scheme = match url.scheme() {
            "ws" | "http" => "ws",
            "wss" | "https" => "wss",
            _ => return Err(invalid("unsupported scheme")),
        };
        let host = url.host_str().ok_or_else(|| invalid("missing host"))?;
        let port = url
            .port_or_known_default()
            .ok_or_else(|| invalid("missing port"))?;

        Ok(Self::new(scheme, host, port, url.path()))
    }

    /// Parse `base_url` and replace its path with `path` when one is given.
    pub fn from_base(base_url: &str, path: &str) -> Result<Self, NetError> {
        let endpoint = Self::parse(base_url)?;
        if path.is_empty() {
            Ok(endpoint)
        } else {
            Ok(endpoint.with_path(path))
        }
    }

    /// Copy of this endpoint with a different path.
    pub fn with_path(&self, path: &str) -> Self {
        Self {
            path: normalize_path(path),
            ..self.clone()
        }
    }

    /// URL scheme (`ws` or `wss`).
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Host name or address.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// TCP port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Request path, always starting with `/`.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Full URL string.
    pub fn url(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}{}", self.scheme, self.host, self.port, self.path)
    }
}

fn normalize_path(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}
