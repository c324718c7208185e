use crate::{env_list, env_or_default, env_parse, ConfigError, FromEnv};
use std::net::Ipv4Addr;
use std::time::Duration;

pub const DEFAULT_GRPC_PORT: u16 = 9001;
pub const DEFAULT_GATEWAY_PORT: u16 = 8000;
pub const DEFAULT_GRACEFUL_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// Configuration for a process serving a gRPC endpoint and an HTTP gateway
/// in front of it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub grpc_port: u16,
    pub gateway_port: u16,
    /// CORS origins accepted by the gateway. Empty means any origin.
    pub allowed_origins: Vec<String>,
    pub graceful_shutdown_timeout: Duration,
}

impl ServerConfig {
    pub fn new(host: impl Into<String>, grpc_port: u16, gateway_port: u16) -> Self {
        Self {
            host: host.into(),
            grpc_port,
            gateway_port,
            ..Self::default()
        }
    }

    /// Get the gRPC address as "host:port"
    pub fn grpc_address(&self) -> String {
        format!("{}:{}", self.host, self.grpc_port)
    }

    /// Get the gateway address as "host:port"
    pub fn gateway_address(&self) -> String {
        format!("{}:{}", self.host, self.gateway_port)
    }

    /// Address an in-process client dials to reach the gRPC listener;
    /// wildcard hosts map to loopback.
    pub fn loopback_grpc_address(&self) -> String {
        match self.host.as_str() {
            "0.0.0.0" | "" => format!("127.0.0.1:{}", self.grpc_port),
            "::" | "[::]" => format!("[::1]:{}", self.grpc_port),
            _ => self.grpc_address(),
        }
    }

    /// Reads `{prefix}_HOST`, `{prefix}_GRPC_PORT`, `{prefix}_GATEWAY_PORT`,
    /// `{prefix}_GATEWAY_ALLOWED_ORIGINS` and
    /// `{prefix}_GRACEFUL_SHUTDOWN_TIMEOUT_SECS`.
    pub fn from_env_with_prefix(prefix: &str) -> Result<Self, ConfigError> {
        Self::from_env_with_defaults(prefix, Self::default())
    }

    /// Like [`ServerConfig::from_env_with_prefix`], falling back to
    /// `defaults` for unset variables.
    pub fn from_env_with_defaults(prefix: &str, defaults: ServerConfig) -> Result<Self, ConfigError> {
        let key = |name: &str| format!("{prefix}_{name}");

        let host = env_or_default(&key("HOST"), &defaults.host);
        let grpc_port = env_parse(&key("GRPC_PORT"), defaults.grpc_port)?;
        let gateway_port = env_parse(&key("GATEWAY_PORT"), defaults.gateway_port)?;
        let mut allowed_origins = env_list(&key("GATEWAY_ALLOWED_ORIGINS"));
        if allowed_origins.is_empty() {
            allowed_origins = defaults.allowed_origins;
        }
        let timeout_secs = env_parse(
            &key("GRACEFUL_SHUTDOWN_TIMEOUT_SECS"),
            defaults.graceful_shutdown_timeout.as_secs(),
        )?;

        Ok(Self {
            host,
            grpc_port,
            gateway_port,
            allowed_origins,
            graceful_shutdown_timeout: Duration::from_secs(timeout_secs),
        })
    }
}

impl FromEnv for ServerConfig {
    /// Reads the `SERVER_*` variables, see [`ServerConfig::from_env_with_prefix`].
    fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_with_prefix("SERVER")
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: Ipv4Addr::UNSPECIFIED.to_string(),
            grpc_port: DEFAULT_GRPC_PORT,
            gateway_port: DEFAULT_GATEWAY_PORT,
            allowed_origins: Vec::new(),
            graceful_shutdown_timeout: Duration::from_secs(DEFAULT_GRACEFUL_SHUTDOWN_TIMEOUT_SECS),
        }
    }
}
