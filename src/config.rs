use crate::error::{Error, Result};
use std::time::Duration;

/// Which gateway environment to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endpoint {
    #[default]
    Production,
    Sandbox,
}

impl Endpoint {
    pub const fn host(self) -> &'static str {
        match self {
            Self::Production => "api.push.apple.com",
            Self::Sandbox => "api.sandbox.push.apple.com",
        }
    }
}

/// Constructor-time configuration for a [`Client`](crate::Client).
///
/// `team_id`, `key_id` and `signing_key` are required; everything else has a
/// sensible default for the production gateway.
#[derive(Clone)]
pub struct ClientConfig {
    /// Issuer identity (Apple developer team) placed in token claims.
    pub team_id: String,
    /// Identifier of the signing key, carried in the token header.
    pub key_id: String,
    /// PEM-encoded PKCS#8 EC P-256 private key used to sign provider tokens.
    pub signing_key: Vec<u8>,
    /// Topic used when a notification does not carry its own.
    pub default_topic: Option<String>,
    pub endpoint: Endpoint,
    /// Overrides the endpoint's hostname; used for local gateways in tests.
    pub host: Option<String>,
    pub port: u16,
    /// Maximum number of live gateway connections, each multiplexing many
    /// request streams.
    pub max_connections: usize,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    /// Idle sessions older than this fail the acquire-time liveness check.
    pub idle_timeout: Duration,
    /// How often the cached provider token is re-signed. The gateway rejects
    /// tokens older than an hour, so keep this below that.
    pub token_refresh_interval: Duration,
    /// Capacity of each event broadcast channel.
    pub event_channel_capacity: usize,
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("team_id", &self.team_id)
            .field("key_id", &self.key_id)
            .field("signing_key", &"<redacted>")
            .field("default_topic", &self.default_topic)
            .field("endpoint", &self.endpoint)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("max_connections", &self.max_connections)
            .finish_non_exhaustive()
    }
}

impl ClientConfig {
    pub fn new(
        team_id: impl Into<String>,
        key_id: impl Into<String>,
        signing_key: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            team_id: team_id.into(),
            key_id: key_id.into(),
            signing_key: signing_key.into(),
            default_topic: None,
            endpoint: Endpoint::default(),
            host: None,
            port: 443,
            max_connections: 10,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(10),
            idle_timeout: Duration::from_secs(30 * 60),
            token_refresh_interval: Duration::from_secs(50 * 60),
            event_channel_capacity: 16,
        }
    }

    #[must_use]
    pub fn with_default_topic(mut self, topic: impl Into<String>) -> Self {
        self.default_topic = Some(topic.into());
        self
    }

    #[must_use]
    pub const fn with_endpoint(mut self, endpoint: Endpoint) -> Self {
        self.endpoint = endpoint;
        self
    }

    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    #[must_use]
    pub const fn with_max_connections(mut self, max_connections: usize) -> Self {
        self.max_connections = max_connections;
        self
    }

    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    #[must_use]
    pub const fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    #[must_use]
    pub const fn with_token_refresh_interval(mut self, interval: Duration) -> Self {
        self.token_refresh_interval = interval;
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.team_id.is_empty() {
            return Err(Error::Config("team_id must not be empty".into()));
        }
        if self.key_id.is_empty() {
            return Err(Error::Config("key_id must not be empty".into()));
        }
        if self.signing_key.is_empty() {
            return Err(Error::Config("signing_key must not be empty".into()));
        }
        if self.max_connections == 0 {
            return Err(Error::Config("max_connections must be at least 1".into()));
        }
        if self.token_refresh_interval >= Duration::from_secs(60 * 60) {
            tracing::warn!(
                interval_secs = self.token_refresh_interval.as_secs(),
                "token_refresh_interval is at or above one hour; the gateway may reject stale tokens"
            );
        }
        Ok(())
    }

    pub(crate) fn gateway_host(&self) -> &str {
        self.host.as_deref().unwrap_or_else(|| self.endpoint.host())
    }
}
