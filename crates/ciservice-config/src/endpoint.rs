use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Address of the call-information server the daemon connects to.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, Hash)]
pub struct ServerEndpoint {
    /// Host name or IP literal.
    pub host: String,
    /// TCP port.
    pub port: u16,
}

impl ServerEndpoint {
    /// Builds an endpoint from its parts.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Host name or IP literal.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// TCP port.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for ServerEndpoint {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "tcp://{}:{}", self.host, self.port)
    }
}

impl FromStr for ServerEndpoint {
    type Err = EndpointParseError;

    /// Accepts `tcp://host:port` URLs as well as bare `host:port` pairs.
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let candidate = if input.contains("://") {
            input.to_owned()
        } else {
            format!("tcp://{input}")
        };
        let url = Url::parse(&candidate)?;
        if url.scheme() != "tcp" {
            return Err(EndpointParseError::UnsupportedScheme(
                url.scheme().to_owned(),
            ));
        }
        let host = url
            .host_str()
            .ok_or_else(|| EndpointParseError::MissingHost(input.to_owned()))?;
        let port = url
            .port()
            .ok_or_else(|| EndpointParseError::MissingPort(input.to_owned()))?;
        Ok(Self::new(host, port))
    }
}

/// Errors encountered while parsing a [`ServerEndpoint`] from text.
#[derive(Debug, Error)]
pub enum EndpointParseError {
    /// Scheme was not `tcp`.
    #[error("unsupported endpoint scheme '{0}'")]
    UnsupportedScheme(String),
    /// Host name was missing.
    #[error("missing host in '{0}'")]
    MissingHost(String),
    /// Port was missing from the address.
    #[error("missing port in '{0}'")]
    MissingPort(String),
    /// URL failed to parse.
    #[error(transparent)]
    Url(#[from] url::ParseError),
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn display_uses_tcp_scheme() {
        let endpoint = ServerEndpoint::new("pbx.local", 63690);
        assert_eq!(endpoint.to_string(), "tcp://pbx.local:63690");
    }

    #[rstest]
    #[case::url("tcp://127.0.0.1:9000", "127.0.0.1", 9000)]
    #[case::bare("pbx.local:4000", "pbx.local", 4000)]
    fn parses_endpoints(#[case] input: &str, #[case] host: &str, #[case] port: u16) {
        let endpoint: ServerEndpoint = input.parse().expect("endpoint should parse");
        assert_eq!(endpoint, ServerEndpoint::new(host, port));
    }

    #[test]
    fn rejects_foreign_scheme() {
        let error = "unix:///tmp/ci.sock"
            .parse::<ServerEndpoint>()
            .expect_err("unix endpoints are not supported");
        assert!(matches!(error, EndpointParseError::UnsupportedScheme(_)));
    }

    #[test]
    fn rejects_missing_port() {
        let error = "tcp://pbx.local"
            .parse::<ServerEndpoint>()
            .expect_err("port is required");
        assert!(matches!(error, EndpointParseError::MissingPort(_)));
    }
}
