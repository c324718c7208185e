//! Process wiring and lifecycle
//!
//! This module handles all server setup:
//! - Tracing initialization
//! - Collaborator construction (vector store, reranker, chat model)
//! - gRPC routes with the health service (grpc.health.v1.Health)
//! - HTTP gateway bridged to the gRPC endpoint over a lazy channel
//! - Supervised serving until SIGINT/SIGTERM, then a bounded drain

use std::future::Future;
use std::sync::Arc;

use axum_helpers::{create_router, shutdown_signal};
use core_config::server::ServerConfig;
use core_config::{Environment, FromEnv};
use core_lifecycle::{AppLifecycle, Context, ServerSupervisor, SupervisorConfig};
use domain_rag::{
    GrpcVectorStore, HttpReranker, InMemoryVectorStore, OpenAICompletion, OpenAIEmbedder,
    QueryPipeline, SystemClock, VectorStore, grpc_router,
};
use eyre::{Result, WrapErr};
use grpc_client::{GrpcServer, create_channel_lazy, create_health_service};
use rpc::rag::rag_service_server::{RagServiceServer, SERVICE_NAME};
use tonic::codec::CompressionEncoding;
use tonic::service::Routes;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::service::RagServiceImpl;

/// Run the server until the process is asked to stop.
///
/// # Errors
///
/// Returns an error if:
/// - configuration is missing or malformed
/// - the vector store or reranker cannot be reached at startup
/// - a listener cannot be bound
/// - draining exceeds the graceful shutdown timeout
pub async fn run() -> Result<()> {
    let environment = Environment::from_env();
    core_config::tracing::init_tracing(&environment);

    let config = AppConfig::from_env().wrap_err("Failed to load configuration")?;
    let pipeline = build_pipeline(&config).await?;
    let app = build_app(&config.server, pipeline).await?;

    serve_until(Arc::new(app), shutdown_signal()).await
}

/// Builds the pipeline and its collaborators from configuration.
pub async fn build_pipeline(config: &AppConfig) -> Result<QueryPipeline> {
    let vector_store: Arc<dyn VectorStore> = match &config.vector_store.url {
        Some(url) => {
            info!("Connecting to vector store at {}...", url);
            let store = GrpcVectorStore::connect(url)
                .await
                .wrap_err("Failed to connect to vector store")?;
            Arc::new(store)
        }
        None => {
            let embedder = OpenAIEmbedder::new(config.openai.clone());
            let store = InMemoryVectorStore::new(Arc::new(embedder));
            match &config.vector_store.seed_file {
                Some(path) => {
                    store
                        .seed_from_file(path)
                        .await
                        .wrap_err_with(|| format!("Failed to seed vector store from {}", path))?;
                }
                None => warn!("No VECTORSTORE_URL or seed file configured, retrieval starts empty"),
            }
            Arc::new(store)
        }
    };

    let reranker = HttpReranker::new(config.reranker.clone());
    reranker
        .probe()
        .await
        .wrap_err_with(|| format!("Reranker at {} is not ready", config.reranker.base_url))?;
    info!("Reranker ready at {}", config.reranker.base_url);

    Ok(QueryPipeline::new(
        vector_store,
        Arc::new(reranker),
        Arc::new(OpenAICompletion::new(config.openai.clone())),
        Arc::new(SystemClock),
    )
    .with_policy(config.retrieval))
}

/// Wires both endpoints around `pipeline` into a startable application.
pub async fn build_app(server: &ServerConfig, pipeline: QueryPipeline) -> Result<AppLifecycle> {
    let (health_reporter, health_service) = create_health_service();
    GrpcServer::setup_health_multiple(&health_reporter, &[SERVICE_NAME]).await;

    let rag_service = RagServiceServer::new(RagServiceImpl::new(pipeline))
        .accept_compressed(CompressionEncoding::Zstd)
        .send_compressed(CompressionEncoding::Zstd);
    let routes = Routes::new(health_service).add_service(rag_service);

    // The gateway is a client of our own gRPC endpoint.
    let bridge = create_channel_lazy(format!("http://{}", server.loopback_grpc_address()))
        .wrap_err("Failed to create gateway channel")?;
    let gateway = create_router(grpc_router(bridge.clone()), &server.allowed_origins)
        .wrap_err("Invalid gateway allowed origin")?;

    GrpcServer::log_startup(&server.grpc_address(), &[SERVICE_NAME]);
    info!("Gateway will listen on {}", server.gateway_address());

    let supervisor = Arc::new(
        ServerSupervisor::new(
            SupervisorConfig {
                grpc_addr: server.grpc_address(),
                gateway_addr: server.gateway_address(),
                graceful_shutdown_timeout: server.graceful_shutdown_timeout,
            },
            routes,
            gateway,
        )
        .with_bridge(bridge),
    );

    Ok(AppLifecycle::new(move |ctx: Context| {
        let supervisor = supervisor.clone();
        let health_reporter = health_reporter.clone();

        async move {
            let draining = ctx.clone();
            tokio::spawn(async move {
                draining.done().await;
                GrpcServer::mark_not_serving(&health_reporter, &[SERVICE_NAME]).await;
            });

            supervisor.run(ctx).await
        }
    }))
}

/// Starts `app` and shuts it down once `signal` completes.
///
/// Returns early if the app stops on its own, e.g. a listener failed.
pub async fn serve_until<F>(app: Arc<AppLifecycle>, signal: F) -> Result<()>
where
    F: Future<Output = ()>,
{
    app.run_until(signal)
        .await
        .wrap_err("Application stopped with an error")
}
