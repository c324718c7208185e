use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::error::RagError;
use crate::metadata::Metadata;

/// Speaker of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Unspecified,
    System,
    Assistant,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Unspecified => "unspecified",
            Role::System => "system",
            Role::Assistant => "assistant",
            Role::User => "user",
        }
    }
}

/// One turn of a chat transcript
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }
}

/// A question plus the conversation it belongs to
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct QueryInput {
    /// The user's question, 2 to 2000 characters
    #[validate(length(min = 2, max = 2000))]
    pub query: String,
    /// Prior turns, oldest first
    #[serde(default)]
    pub messages: Vec<Message>,
}

/// Streaming queries take the same shape as unary ones.
pub type QueryStreamInput = QueryInput;

impl QueryInput {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            messages: Vec::new(),
        }
    }
}

/// Aggregated answer of a non-streaming query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct QueryResult {
    pub content: String,
    /// Time between the first and the last generated chunk
    pub created_in_ms: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum StopReason {
    #[default]
    Unspecified,
    Done,
    Error,
}

/// One event of a streaming query.
///
/// Chunk events carry `StopReason::Unspecified`. Every stream ends with
/// exactly one `Done` or `Error` event.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryStreamResultEvent {
    pub content: String,
    pub created_at_ms: i64,
    pub stop_reason: StopReason,
    pub error: Option<RagError>,
}

impl QueryStreamResultEvent {
    pub fn chunk(content: impl Into<String>, created_at_ms: i64) -> Self {
        Self {
            content: content.into(),
            created_at_ms,
            stop_reason: StopReason::Unspecified,
            error: None,
        }
    }

    pub fn done(created_at_ms: i64) -> Self {
        Self {
            content: String::new(),
            created_at_ms,
            stop_reason: StopReason::Done,
            error: None,
        }
    }

    pub fn failed(err: RagError, created_at_ms: i64) -> Self {
        Self {
            content: String::new(),
            created_at_ms,
            stop_reason: StopReason::Error,
            error: Some(err),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.stop_reason != StopReason::Unspecified
    }
}

// ===== Retrieval =====

/// Retrieval knobs applied to every query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetrievalPolicy {
    pub top_k: u32,
    pub min_score: f32,
    pub rerank_top_n: u32,
}

pub const DEFAULT_TOP_K: u32 = 5;
pub const DEFAULT_MIN_SCORE: f32 = 0.4;
pub const DEFAULT_RERANK_TOP_N: u32 = 1;

impl Default for RetrievalPolicy {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            min_score: DEFAULT_MIN_SCORE,
            rerank_top_n: DEFAULT_RERANK_TOP_N,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Validate)]
pub struct SearchQuery {
    #[validate(length(min = 1))]
    pub text: String,
    #[validate(range(min = 1, max = 100))]
    pub top_k: u32,
    pub min_score: f32,
    /// Equality constraints on metadata keys; empty matches everything
    pub filter: Metadata,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub text: String,
    /// Similarity in `[0, 1]`, ordered by the store
    pub score: f32,
    pub metadata: Metadata,
}

/// A text to index, with its metadata
#[derive(Debug, Clone, PartialEq, Default, Serialize, Validate)]
pub struct Document {
    /// 2 to 2500 characters
    #[validate(length(min = 2, max = 2500))]
    pub text: String,
    pub metadata: Metadata,
}

impl Document {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            metadata: Metadata::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// One batch of texts for the index
#[derive(Debug, Clone, PartialEq, Default, Validate)]
pub struct InsertTextsInput {
    #[validate(length(min = 1), nested)]
    pub texts: Vec<Document>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RerankQuery {
    pub query: String,
    pub documents: Vec<String>,
    pub top_n: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RerankResult {
    /// Position in [`RerankQuery::documents`]
    pub index: usize,
    pub document: String,
    pub score: f32,
}
