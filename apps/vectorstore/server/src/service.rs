//! Vector store gRPC service implementation
//!
//! Requests are converted with the `From` impls in `domain_rag::conversions`
//! and handed to the [`TextIndex`], which validates them.

use domain_rag::{InsertTextsInput, SearchQuery, TextIndex};
use rpc::vectorstore::{
    InsertTextsRequest, InsertTextsResponse, SearchTextRequest, SearchTextResponse,
    vector_store_service_server::VectorStoreService,
};
use tonic::{Request, Response, Status};
use tracing::warn;

/// gRPC service implementation for `vectorstore.v1.VectorStoreService`
#[derive(Clone)]
pub struct VectorStoreServiceImpl {
    index: TextIndex,
}

impl VectorStoreServiceImpl {
    pub fn new(index: TextIndex) -> Self {
        Self { index }
    }
}

#[tonic::async_trait]
impl VectorStoreService for VectorStoreServiceImpl {
    async fn insert_texts(
        &self,
        request: Request<InsertTextsRequest>,
    ) -> Result<Response<InsertTextsResponse>, Status> {
        let input = InsertTextsInput::from(request.into_inner());

        self.index.insert_texts(input).await.map_err(|err| {
            warn!(error = %err, "Insert failed");
            Status::from(err)
        })?;

        Ok(Response::new(InsertTextsResponse {}))
    }

    async fn search_text(
        &self,
        request: Request<SearchTextRequest>,
    ) -> Result<Response<SearchTextResponse>, Status> {
        let query = SearchQuery::from(request.into_inner());

        let results = self.index.search_text(query).await.map_err(|err| {
            warn!(error = %err, "Search failed");
            Status::from(err)
        })?;

        Ok(Response::new(SearchTextResponse {
            similar_texts: results.into_iter().map(Into::into).collect(),
        }))
    }
}
