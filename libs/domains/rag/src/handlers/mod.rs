mod grpc;
mod health;
mod vectorstore;

use axum::{
    Json, Router,
    extract::FromRef,
    routing::{get, post},
};
use axum_helpers::ErrorResponse;
use rpc::rag::rag_service_client::RagServiceClient;
use rpc::vectorstore::vector_store_service_client::VectorStoreServiceClient;
use tonic::transport::Channel;
use utoipa::OpenApi;

use crate::models::{Message, QueryInput, QueryResult, Role, StopReason};

// Re-export HTTP model types
pub use grpc::{GatewayResult, QueryStreamEvent};
pub use health::HealthResponse;
pub use vectorstore::{
    InsertTextsBody, InsertTextsReply, SearchTextBody, SearchTextReply, SimilarTextBody, TextBody,
};

/// OpenAPI documentation for the RAG gateway
#[derive(OpenApi)]
#[openapi(
    paths(grpc::query, grpc::query_stream, health::healthz),
    components(
        schemas(
            QueryInput, Message, Role,
            QueryResult, QueryStreamEvent, StopReason,
            HealthResponse, ErrorResponse
        )
    ),
    tags(
        (name = "rag", description = "Retrieval-augmented question answering"),
        (name = "health", description = "Liveness of the gRPC backend")
    )
)]
pub struct RagApiDoc;

/// OpenAPI documentation for the vector store gateway
#[derive(OpenApi)]
#[openapi(
    paths(vectorstore::insert_texts, vectorstore::search_text, health::healthz),
    components(
        schemas(
            InsertTextsBody, TextBody, InsertTextsReply,
            SearchTextBody, SearchTextReply, SimilarTextBody,
            HealthResponse, ErrorResponse
        )
    ),
    tags(
        (name = "vectorstore", description = "Text indexing and similarity search"),
        (name = "health", description = "Liveness of the gRPC backend")
    )
)]
pub struct VectorStoreApiDoc;

/// Shared by every RAG gateway handler
#[derive(Clone)]
pub struct GatewayState {
    client: RagServiceClient<Channel>,
    channel: Channel,
}

impl GatewayState {
    pub fn new(channel: Channel) -> Self {
        Self {
            client: RagServiceClient::new(channel.clone()),
            channel,
        }
    }
}

impl FromRef<GatewayState> for Channel {
    fn from_ref(state: &GatewayState) -> Self {
        state.channel.clone()
    }
}

/// Shared by every vector store gateway handler
#[derive(Clone)]
pub struct VectorStoreGatewayState {
    client: VectorStoreServiceClient<Channel>,
    channel: Channel,
}

impl VectorStoreGatewayState {
    pub fn new(channel: Channel) -> Self {
        Self {
            client: VectorStoreServiceClient::new(channel.clone()),
            channel,
        }
    }
}

impl FromRef<VectorStoreGatewayState> for Channel {
    fn from_ref(state: &VectorStoreGatewayState) -> Self {
        state.channel.clone()
    }
}

/// Create router for the gRPC-backed gateway.
///
/// Every route forwards over `channel`; nothing here calls the pipeline
/// directly.
pub fn grpc_router(channel: Channel) -> Router {
    Router::new()
        .route("/v1/query", post(grpc::query))
        .route("/v1/query/stream", post(grpc::query_stream))
        .route("/healthz", get(health::healthz))
        .route("/v1/openapi.json", get(openapi::<RagApiDoc>))
        .with_state(GatewayState::new(channel))
}

/// Create router for the vector store gateway, forwarding over `channel`.
pub fn vectorstore_router(channel: Channel) -> Router {
    Router::new()
        .route("/v1/texts", post(vectorstore::insert_texts))
        .route("/v1/texts/search", post(vectorstore::search_text))
        .route("/healthz", get(health::healthz))
        .route("/v1/openapi.json", get(openapi::<VectorStoreApiDoc>))
        .with_state(VectorStoreGatewayState::new(channel))
}

async fn openapi<D: OpenApi>() -> Json<utoipa::openapi::OpenApi> {
    Json(D::openapi())
}
