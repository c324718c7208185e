//! JSON mapping of `vectorstore.v1.VectorStoreService`.
//!
//! Metadata and filters are plain JSON objects here and protobuf `Struct`s
//! on the wire.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use axum_helpers::{AppError, ErrorResponse};
use rpc::vectorstore::{
    InsertTextsRequest, SearchTextRequest, insert_texts_request, search_text_response::SimilarText,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use super::VectorStoreGatewayState;
use super::grpc::GatewayResult;
use crate::metadata::{MetadataValue, metadata_from_json, metadata_from_proto, metadata_to_proto};

// ===== HTTP Request/Response Types =====

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TextBody {
    pub text: String,
    /// JSON object; omitted means no metadata
    #[serde(default)]
    #[schema(value_type = Object)]
    pub metadata: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct InsertTextsBody {
    pub texts: Vec<TextBody>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct InsertTextsReply {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SearchTextBody {
    pub text: String,
    pub top_k: i64,
    /// Equality constraints on metadata keys
    #[serde(default)]
    #[schema(value_type = Object)]
    pub filter: Value,
    #[serde(default)]
    pub min_score: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SimilarTextBody {
    pub text: String,
    pub score: f32,
    #[schema(value_type = Object)]
    pub metadata: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SearchTextReply {
    pub similar_texts: Vec<SimilarTextBody>,
}

fn struct_from_json(field: &str, value: Value) -> Result<prost_types::Struct, AppError> {
    metadata_from_json(value)
        .map(metadata_to_proto)
        .ok_or_else(|| AppError::BadRequest(format!("{field} must be a JSON object")))
}

impl From<SimilarText> for SimilarTextBody {
    fn from(proto: SimilarText) -> Self {
        let metadata = proto.metadata.map(metadata_from_proto).unwrap_or_default();
        Self {
            text: proto.text,
            score: proto.score,
            metadata: MetadataValue::Map(metadata).into(),
        }
    }
}

// ===== Handler Functions =====

/// Embed and index a batch of texts
#[utoipa::path(
    post,
    path = "/v1/texts",
    tag = "vectorstore",
    request_body = InsertTextsBody,
    responses(
        (status = 200, description = "Texts indexed", body = InsertTextsReply),
        (status = 400, description = "Invalid texts", body = ErrorResponse),
        (status = 502, description = "Embedding or storage failed", body = ErrorResponse)
    )
)]
pub async fn insert_texts(
    State(mut state): State<VectorStoreGatewayState>,
    payload: Result<Json<InsertTextsBody>, JsonRejection>,
) -> GatewayResult<Json<InsertTextsReply>> {
    let Json(body) = payload?;

    let texts = body
        .texts
        .into_iter()
        .map(|text| {
            Ok(insert_texts_request::Text {
                text: text.text,
                metadata: Some(struct_from_json("metadata", text.metadata)?),
            })
        })
        .collect::<Result<Vec<_>, AppError>>()?;

    state.client.insert_texts(InsertTextsRequest { texts }).await?;

    Ok(Json(InsertTextsReply {}))
}

/// Find the texts most similar to a query text
#[utoipa::path(
    post,
    path = "/v1/texts/search",
    tag = "vectorstore",
    request_body = SearchTextBody,
    responses(
        (status = 200, description = "Matches, most similar first", body = SearchTextReply),
        (status = 400, description = "Invalid query", body = ErrorResponse),
        (status = 502, description = "Embedding or search failed", body = ErrorResponse)
    )
)]
pub async fn search_text(
    State(mut state): State<VectorStoreGatewayState>,
    payload: Result<Json<SearchTextBody>, JsonRejection>,
) -> GatewayResult<Json<SearchTextReply>> {
    let Json(body) = payload?;

    let request = SearchTextRequest {
        text: body.text,
        top_k: body.top_k,
        filter: Some(struct_from_json("filter", body.filter)?),
        min_score: body.min_score,
    };
    let response = state.client.search_text(request).await?.into_inner();

    Ok(Json(SearchTextReply {
        similar_texts: response.similar_texts.into_iter().map(Into::into).collect(),
    }))
}
