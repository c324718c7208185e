use core_config::{ConfigError, FromEnv, env_optional, env_or_default, env_parse, env_required};

use crate::models::{DEFAULT_MIN_SCORE, DEFAULT_RERANK_TOP_N, DEFAULT_TOP_K, RetrievalPolicy};

pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// OpenAI-compatible API used for chat completions and embeddings
#[derive(Debug, Clone, PartialEq)]
pub struct OpenAIConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub embedding_model: String,
}

impl OpenAIConfig {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            base_url: trim_base_url(base_url.into()),
            api_key: api_key.into(),
            model: model.into(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
        }
    }

    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = model.into();
        self
    }
}

impl FromEnv for OpenAIConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self::new(
            env_required("OPENAI_BASE_URL")?,
            env_required("OPENAI_API_KEY")?,
            env_required("OPENAI_MODEL")?,
        )
        .with_embedding_model(env_or_default(
            "OPENAI_EMBEDDING_MODEL",
            DEFAULT_EMBEDDING_MODEL,
        )))
    }
}

impl OpenAIConfig {
    /// Reads only what embedding needs; `OPENAI_MODEL` may be unset.
    pub fn embeddings_from_env() -> Result<Self, ConfigError> {
        Ok(Self::new(
            env_required("OPENAI_BASE_URL")?,
            env_required("OPENAI_API_KEY")?,
            env_optional("OPENAI_MODEL").unwrap_or_default(),
        )
        .with_embedding_model(env_or_default(
            "OPENAI_EMBEDDING_MODEL",
            DEFAULT_EMBEDDING_MODEL,
        )))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RerankerConfig {
    pub base_url: String,
    /// Omitted from requests when unset; the service picks its default.
    pub model: Option<String>,
}

impl RerankerConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: trim_base_url(base_url.into()),
            model: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

impl FromEnv for RerankerConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: trim_base_url(env_required("RERANKER_BASE_URL")?),
            model: env_optional("RERANKER_MODEL"),
        })
    }
}

/// Where retrieval runs: a remote vector store service, or in process.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VectorStoreConfig {
    pub url: Option<String>,
    /// JSON-lines file loaded into the in-memory store at startup
    pub seed_file: Option<String>,
}

impl FromEnv for VectorStoreConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            url: env_optional("VECTORSTORE_URL"),
            seed_file: env_optional("RAG_VECTORSTORE_SEED_FILE"),
        })
    }
}

impl FromEnv for RetrievalPolicy {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            top_k: env_parse("RAG_RETRIEVAL_TOP_K", DEFAULT_TOP_K)?,
            min_score: env_parse("RAG_RETRIEVAL_MIN_SCORE", DEFAULT_MIN_SCORE)?,
            rerank_top_n: env_parse("RAG_RERANK_TOP_N", DEFAULT_RERANK_TOP_N)?,
        })
    }
}

fn trim_base_url(url: String) -> String {
    url.trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const OPENAI_VARS: [&str; 4] = [
        "OPENAI_BASE_URL",
        "OPENAI_API_KEY",
        "OPENAI_MODEL",
        "OPENAI_EMBEDDING_MODEL",
    ];

    #[test]
    fn test_openai_config_from_env() {
        temp_env::with_vars(
            [
                (OPENAI_VARS[0], Some("http://llm.local/v1/")),
                (OPENAI_VARS[1], Some("sk-test")),
                (OPENAI_VARS[2], Some("gpt-4o-mini")),
                (OPENAI_VARS[3], None),
            ],
            || {
                let config = OpenAIConfig::from_env().unwrap();
                assert_eq!(config.base_url, "http://llm.local/v1");
                assert_eq!(config.model, "gpt-4o-mini");
                assert_eq!(config.embedding_model, DEFAULT_EMBEDDING_MODEL);
            },
        );
    }

    #[test]
    fn test_openai_config_requires_key() {
        temp_env::with_vars(
            [
                (OPENAI_VARS[0], Some("http://llm.local/v1")),
                (OPENAI_VARS[1], None),
                (OPENAI_VARS[2], Some("gpt-4o-mini")),
            ],
            || {
                assert_eq!(
                    OpenAIConfig::from_env().unwrap_err(),
                    ConfigError::MissingEnvVar("OPENAI_API_KEY".into())
                );
            },
        );
    }

    #[test]
    fn test_embeddings_config_needs_no_chat_model() {
        temp_env::with_vars(
            [
                (OPENAI_VARS[0], Some("http://llm.local/v1")),
                (OPENAI_VARS[1], Some("sk-test")),
                (OPENAI_VARS[2], None),
                (OPENAI_VARS[3], Some("nomic-embed-text")),
            ],
            || {
                let config = OpenAIConfig::embeddings_from_env().unwrap();
                assert_eq!(config.model, "");
                assert_eq!(config.embedding_model, "nomic-embed-text");
                assert!(OpenAIConfig::from_env().is_err());
            },
        );
    }

    #[test]
    fn test_reranker_model_is_optional() {
        temp_env::with_vars(
            [
                ("RERANKER_BASE_URL", Some("http://rerank:8080")),
                ("RERANKER_MODEL", None),
            ],
            || {
                let config = RerankerConfig::from_env().unwrap();
                assert_eq!(config, RerankerConfig::new("http://rerank:8080"));
            },
        );
    }

    #[test]
    fn test_retrieval_policy_defaults_and_overrides() {
        temp_env::with_vars(
            [
                ("RAG_RETRIEVAL_TOP_K", None::<&str>),
                ("RAG_RETRIEVAL_MIN_SCORE", None),
                ("RAG_RERANK_TOP_N", None),
            ],
            || assert_eq!(RetrievalPolicy::from_env().unwrap(), RetrievalPolicy::default()),
        );

        temp_env::with_vars(
            [
                ("RAG_RETRIEVAL_TOP_K", Some("10")),
                ("RAG_RETRIEVAL_MIN_SCORE", Some("0.25")),
                ("RAG_RERANK_TOP_N", Some("3")),
            ],
            || {
                let policy = RetrievalPolicy::from_env().unwrap();
                assert_eq!(policy.top_k, 10);
                assert_eq!(policy.min_score, 0.25);
                assert_eq!(policy.rerank_top_n, 3);
            },
        );
    }

    #[test]
    fn test_retrieval_policy_rejects_garbage() {
        temp_env::with_var("RAG_RETRIEVAL_TOP_K", Some("-1"), || {
            assert!(matches!(
                RetrievalPolicy::from_env(),
                Err(ConfigError::ParseError { .. })
            ));
        });
    }

    #[test]
    fn test_vector_store_defaults_to_in_memory() {
        temp_env::with_vars(
            [("VECTORSTORE_URL", None::<&str>), ("RAG_VECTORSTORE_SEED_FILE", None)],
            || assert_eq!(VectorStoreConfig::from_env().unwrap(), VectorStoreConfig::default()),
        );
    }
}
