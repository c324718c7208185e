use core_config::server::ServerConfig;
use core_config::{ConfigError, FromEnv};
use domain_rag::{OpenAIConfig, RerankerConfig, RetrievalPolicy, VectorStoreConfig};

/// Prefix of the listener variables, e.g. `RAG_SERVER_GRPC_PORT`.
pub const SERVER_ENV_PREFIX: &str = "RAG_SERVER";

/// Everything the process reads from the environment at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub openai: OpenAIConfig,
    pub reranker: RerankerConfig,
    pub vector_store: VectorStoreConfig,
    pub retrieval: RetrievalPolicy,
}

impl FromEnv for AppConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            server: ServerConfig::from_env_with_prefix(SERVER_ENV_PREFIX)?,
            openai: OpenAIConfig::from_env()?,
            reranker: RerankerConfig::from_env()?,
            vector_store: VectorStoreConfig::from_env()?,
            retrieval: RetrievalPolicy::from_env()?,
        })
    }
}
