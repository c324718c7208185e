use core_config::server::ServerConfig;
use core_config::{ConfigError, FromEnv, env_optional};
use domain_rag::OpenAIConfig;

/// Prefix of the listener variables, e.g. `VECTORSTORE_SERVER_GRPC_PORT`.
pub const SERVER_ENV_PREFIX: &str = "VECTORSTORE_SERVER";

pub const DEFAULT_GRPC_PORT: u16 = 9091;
pub const DEFAULT_GATEWAY_PORT: u16 = 8080;

/// Listener defaults; they differ from the RAG server's so both run side by side.
pub fn server_defaults() -> ServerConfig {
    ServerConfig {
        grpc_port: DEFAULT_GRPC_PORT,
        gateway_port: DEFAULT_GATEWAY_PORT,
        ..ServerConfig::default()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub server: ServerConfig,
    /// Only the embedding settings are used.
    pub openai: OpenAIConfig,
    /// JSON-lines file indexed at startup
    pub seed_file: Option<String>,
}

impl FromEnv for AppConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            server: ServerConfig::from_env_with_defaults(SERVER_ENV_PREFIX, server_defaults())?,
            openai: OpenAIConfig::embeddings_from_env()?,
            seed_file: env_optional("VECTORSTORE_SERVER_SEED_FILE"),
        })
    }
}
