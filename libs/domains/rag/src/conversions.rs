use rpc::rag::{
    Message as ProtoMessage, QueryRequest, QueryResponse, QueryStreamRequest, QueryStreamResponse,
    Role as ProtoRole, StopReason as ProtoStopReason,
};
use rpc::vectorstore::{
    InsertTextsRequest, SearchTextRequest, insert_texts_request, search_text_response::SimilarText,
};

use crate::metadata::{metadata_from_proto, metadata_to_proto};
use crate::models::{
    Document, InsertTextsInput, Message, QueryInput, QueryResult, QueryStreamResultEvent, Role, SearchQuery,
    SearchResult, StopReason,
};

// ===== Messages =====

pub fn role_from_proto(proto: i32) -> Role {
    match ProtoRole::try_from(proto) {
        Ok(ProtoRole::System) => Role::System,
        Ok(ProtoRole::Assistant) => Role::Assistant,
        Ok(ProtoRole::User) => Role::User,
        _ => Role::Unspecified,
    }
}

pub fn role_to_proto(role: Role) -> i32 {
    match role {
        Role::Unspecified => ProtoRole::Unspecified as i32,
        Role::System => ProtoRole::System as i32,
        Role::Assistant => ProtoRole::Assistant as i32,
        Role::User => ProtoRole::User as i32,
    }
}

impl From<ProtoMessage> for Message {
    fn from(proto: ProtoMessage) -> Self {
        Message {
            role: role_from_proto(proto.role),
            content: proto.content,
        }
    }
}

impl From<Message> for ProtoMessage {
    fn from(message: Message) -> Self {
        ProtoMessage {
            role: role_to_proto(message.role),
            content: message.content,
        }
    }
}

// ===== Queries =====

impl From<QueryRequest> for QueryInput {
    fn from(proto: QueryRequest) -> Self {
        QueryInput {
            query: proto.query,
            messages: proto.messages.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<QueryStreamRequest> for QueryInput {
    fn from(proto: QueryStreamRequest) -> Self {
        QueryInput {
            query: proto.query,
            messages: proto.messages.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<QueryInput> for QueryRequest {
    fn from(input: QueryInput) -> Self {
        QueryRequest {
            query: input.query,
            messages: input.messages.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<QueryInput> for QueryStreamRequest {
    fn from(input: QueryInput) -> Self {
        QueryStreamRequest {
            query: input.query,
            messages: input.messages.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<QueryResult> for QueryResponse {
    fn from(result: QueryResult) -> Self {
        QueryResponse {
            content: result.content,
            created_in_ms: result.created_in_ms,
        }
    }
}

impl From<QueryResponse> for QueryResult {
    fn from(proto: QueryResponse) -> Self {
        QueryResult {
            content: proto.content,
            created_in_ms: proto.created_in_ms,
        }
    }
}

pub fn stop_reason_from_proto(proto: i32) -> StopReason {
    match ProtoStopReason::try_from(proto) {
        Ok(ProtoStopReason::Done) => StopReason::Done,
        Ok(ProtoStopReason::Error) => StopReason::Error,
        _ => StopReason::Unspecified,
    }
}

pub fn stop_reason_to_proto(reason: StopReason) -> i32 {
    match reason {
        StopReason::Unspecified => ProtoStopReason::Unspecified as i32,
        StopReason::Done => ProtoStopReason::Done as i32,
        StopReason::Error => ProtoStopReason::Error as i32,
    }
}

/// Errors travel in-band as their display text.
impl From<QueryStreamResultEvent> for QueryStreamResponse {
    fn from(event: QueryStreamResultEvent) -> Self {
        QueryStreamResponse {
            content: event.content,
            created_at_ms: event.created_at_ms,
            stop_reason: stop_reason_to_proto(event.stop_reason),
            error: event.error.map(|e| e.to_string()).unwrap_or_default(),
        }
    }
}

// ===== Vector store =====

impl From<SearchQuery> for SearchTextRequest {
    fn from(query: SearchQuery) -> Self {
        SearchTextRequest {
            text: query.text,
            top_k: i64::from(query.top_k),
            filter: Some(metadata_to_proto(query.filter)),
            min_score: query.min_score,
        }
    }
}

/// Out-of-range `top_k` values saturate and are rejected by validation.
impl From<SearchTextRequest> for SearchQuery {
    fn from(proto: SearchTextRequest) -> Self {
        SearchQuery {
            text: proto.text,
            top_k: u32::try_from(proto.top_k.max(0)).unwrap_or(u32::MAX),
            min_score: proto.min_score,
            filter: proto.filter.map(metadata_from_proto).unwrap_or_default(),
        }
    }
}

impl From<SearchResult> for SimilarText {
    fn from(result: SearchResult) -> Self {
        SimilarText {
            text: result.text,
            score: result.score,
            metadata: Some(metadata_to_proto(result.metadata)),
        }
    }
}

impl From<SimilarText> for SearchResult {
    fn from(proto: SimilarText) -> Self {
        SearchResult {
            text: proto.text,
            score: proto.score,
            metadata: proto.metadata.map(metadata_from_proto).unwrap_or_default(),
        }
    }
}

impl From<Document> for insert_texts_request::Text {
    fn from(document: Document) -> Self {
        insert_texts_request::Text {
            text: document.text,
            metadata: Some(metadata_to_proto(document.metadata)),
        }
    }
}

impl From<insert_texts_request::Text> for Document {
    fn from(proto: insert_texts_request::Text) -> Self {
        Document {
            text: proto.text,
            metadata: proto.metadata.map(metadata_from_proto).unwrap_or_default(),
        }
    }
}

impl From<InsertTextsRequest> for InsertTextsInput {
    fn from(proto: InsertTextsRequest) -> Self {
        InsertTextsInput {
            texts: proto.texts.into_iter().map(Into::into).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RagError;
    use crate::metadata::MetadataValue;

    #[test]
    fn test_unknown_role_is_unspecified() {
        assert_eq!(role_from_proto(ProtoRole::Assistant as i32), Role::Assistant);
        assert_eq!(role_from_proto(42), Role::Unspecified);
    }

    #[test]
    fn test_stream_request_keeps_history_order() {
        let proto = QueryStreamRequest {
            query: "why?".into(),
            messages: vec![
                ProtoMessage {
                    role: ProtoRole::User as i32,
                    content: "first".into(),
                },
                ProtoMessage {
                    role: ProtoRole::Assistant as i32,
                    content: "second".into(),
                },
            ],
        };

        let input = QueryInput::from(proto);
        assert_eq!(input.query, "why?");
        assert_eq!(input.messages, vec![Message::user("first"), Message::assistant("second")]);
    }

    #[test]
    fn test_error_event_to_proto() {
        let event = QueryStreamResultEvent::failed(RagError::Completion("model overloaded".into()), 77);
        let proto = QueryStreamResponse::from(event);

        assert_eq!(proto.stop_reason, ProtoStopReason::Error as i32);
        assert_eq!(proto.error, "Completion error: model overloaded");
        assert_eq!(proto.created_at_ms, 77);
        assert!(proto.content.is_empty());
    }

    #[test]
    fn test_similar_text_metadata() {
        let mut fields = std::collections::BTreeMap::new();
        fields.insert(
            "page".to_string(),
            prost_types::Value {
                kind: Some(prost_types::value::Kind::NumberValue(12.0)),
            },
        );
        let proto = SimilarText {
            text: "passage".into(),
            score: 0.8,
            metadata: Some(prost_types::Struct { fields }),
        };

        let result = SearchResult::from(proto);
        assert_eq!(result.metadata["page"], MetadataValue::Int(12));

        let bare = SearchResult::from(SimilarText {
            text: "x".into(),
            score: 0.1,
            metadata: None,
        });
        assert!(bare.metadata.is_empty());
    }

    #[test]
    fn test_search_request_carries_empty_filter() {
        let request = SearchTextRequest::from(SearchQuery {
            text: "q".into(),
            top_k: 5,
            min_score: 0.4,
            filter: Default::default(),
        });
        assert_eq!(request.top_k, 5);
        assert_eq!(request.filter, Some(prost_types::Struct::default()));
    }

    #[test]
    fn test_search_request_top_k_saturates() {
        let request = |top_k| SearchTextRequest {
            text: "q".into(),
            top_k,
            filter: None,
            min_score: 0.0,
        };

        assert_eq!(SearchQuery::from(request(7)).top_k, 7);
        assert_eq!(SearchQuery::from(request(-3)).top_k, 0);
        assert_eq!(SearchQuery::from(request(i64::MAX)).top_k, u32::MAX);
        assert!(SearchQuery::from(request(-3)).filter.is_empty());
    }

    #[test]
    fn test_insert_request_keeps_text_order() {
        let input = InsertTextsInput::from(InsertTextsRequest {
            texts: vec![
                insert_texts_request::Text {
                    text: "first".into(),
                    metadata: None,
                },
                insert_texts_request::Text {
                    text: "second".into(),
                    metadata: Some(metadata_to_proto(
                        [("lang".to_string(), MetadataValue::from("en"))].into(),
                    )),
                },
            ],
        });

        assert_eq!(input.texts[0], Document::new("first"));
        assert_eq!(input.texts[1].metadata["lang"], MetadataValue::from("en"));
    }
}
