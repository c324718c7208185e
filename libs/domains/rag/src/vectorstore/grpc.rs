use async_trait::async_trait;
use grpc_client::{GrpcError, ServingStatus, check_health, create_channel};
use rpc::vectorstore::vector_store_service_client::VectorStoreServiceClient;
use rpc::vectorstore::{InsertTextsRequest, SearchTextRequest};
use tonic::transport::Channel;
use tracing::{debug, info};

use crate::error::{RagError, RagResult};
use crate::models::{Document, SearchQuery, SearchResult};
use crate::provider::VectorStore;

/// Client of a remote `vectorstore.v1.VectorStoreService`
#[derive(Clone)]
pub struct GrpcVectorStore {
    client: VectorStoreServiceClient<Channel>,
}

impl GrpcVectorStore {
    pub fn new(channel: Channel) -> Self {
        Self {
            client: VectorStoreServiceClient::new(channel),
        }
    }

    /// Connects to `url` and refuses to start unless the store reports SERVING.
    pub async fn connect(url: &str) -> RagResult<Self> {
        let channel = create_channel(url).await.map_err(store_error)?;

        let status = check_health(channel.clone(), "").await.map_err(store_error)?;
        if status != ServingStatus::Serving {
            return Err(RagError::VectorStore(format!(
                "vector store health status: {}",
                status.as_str_name()
            )));
        }

        info!(url, "Connected to vector store");
        Ok(Self::new(channel))
    }
}

fn store_error(err: GrpcError) -> RagError {
    RagError::VectorStore(err.to_string())
}

fn status_error(status: tonic::Status) -> RagError {
    RagError::VectorStore(format!("{:?}: {}", status.code(), status.message()))
}

#[async_trait]
impl VectorStore for GrpcVectorStore {
    async fn search(&self, query: SearchQuery) -> RagResult<Vec<SearchResult>> {
        let request = SearchTextRequest::from(query);

        // Tonic clients are cheap to clone and need `&mut self`.
        let response = self
            .client
            .clone()
            .search_text(request)
            .await
            .map_err(status_error)?
            .into_inner();

        debug!(results = response.similar_texts.len(), "Vector store search answered");
        Ok(response.similar_texts.into_iter().map(Into::into).collect())
    }

    async fn insert(&self, documents: Vec<Document>) -> RagResult<()> {
        let request = InsertTextsRequest {
            texts: documents.into_iter().map(Into::into).collect(),
        };

        self.client
            .clone()
            .insert_texts(request)
            .await
            .map_err(status_error)?;
        Ok(())
    }
}
