//! RAG gRPC service implementation
//!
//! Handlers convert between proto and domain types with the `From` impls in
//! `domain_rag::conversions` and delegate to the [`QueryPipeline`].

use core_lifecycle::Context;
use domain_rag::{QueryInput, QueryPipeline, QueryStreamInput};
use futures::StreamExt;
use futures::stream::BoxStream;
use rpc::rag::{
    QueryRequest, QueryResponse, QueryStreamRequest, QueryStreamResponse,
    rag_service_server::RagService,
};
use tonic::{Request, Response, Status};
use tracing::debug;

type QueryEventStream = BoxStream<'static, Result<QueryStreamResponse, Status>>;

/// gRPC service implementation for `rag.v1.RagService`
#[derive(Clone)]
pub struct RagServiceImpl {
    pipeline: QueryPipeline,
}

impl RagServiceImpl {
    pub fn new(pipeline: QueryPipeline) -> Self {
        Self { pipeline }
    }
}

#[tonic::async_trait]
impl RagService for RagServiceImpl {
    async fn query(&self, request: Request<QueryRequest>) -> Result<Response<QueryResponse>, Status> {
        let input = QueryInput::from(request.into_inner());

        // Tonic drops this future when the client goes away.
        let ctx = Context::background().child();
        let _cancel = ctx.drop_guard();

        let result = self.pipeline.run(ctx, input).await.map_err(Status::from)?;

        Ok(Response::new(result.into()))
    }

    type QueryStreamStream = QueryEventStream;

    /// Pipeline failures travel as a final in-band event, never as a status.
    async fn query_stream(
        &self,
        request: Request<QueryStreamRequest>,
    ) -> Result<Response<Self::QueryStreamStream>, Status> {
        let input = QueryStreamInput::from(request.into_inner());

        let ctx = Context::background().child();
        let cancel = ctx.drop_guard();
        let mut events = self.pipeline.stream(ctx, input);

        let responses = async_stream::stream! {
            // Lives as long as the response stream does.
            let _cancel = cancel;

            while let Some(event) = events.next().await {
                if let Some(err) = &event.error {
                    debug!(error = %err, "Query stream ended with an error event");
                }
                yield Ok(QueryStreamResponse::from(event));
            }
        };

        Ok(Response::new(Box::pin(responses)))
    }
}
