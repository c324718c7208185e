//! Process wiring and lifecycle
//!
//! This module handles all server setup:
//! - Tracing initialization
//! - In-memory index with OpenAI-compatible embeddings, optionally seeded
//! - gRPC routes with the health service (grpc.health.v1.Health)
//! - HTTP gateway bridged to the gRPC endpoint over a lazy channel
//! - Supervised serving until SIGINT/SIGTERM, then a bounded drain

use std::future::Future;
use std::sync::Arc;

use axum_helpers::{create_router, shutdown_signal};
use core_config::server::ServerConfig;
use core_config::{Environment, FromEnv};
use core_lifecycle::{AppLifecycle, Context, ServerSupervisor, SupervisorConfig};
use domain_rag::{InMemoryVectorStore, OpenAIEmbedder, TextIndex, vectorstore_router};
use eyre::{Result, WrapErr};
use grpc_client::{GrpcServer, create_channel_lazy, create_health_service};
use rpc::vectorstore::vector_store_service_server::{SERVICE_NAME, VectorStoreServiceServer};
use tonic::codec::CompressionEncoding;
use tonic::service::Routes;
use tracing::info;

use crate::config::AppConfig;
use crate::service::VectorStoreServiceImpl;

/// Run the server until the process is asked to stop.
///
/// # Errors
///
/// Returns an error if:
/// - configuration is missing or malformed
/// - the seed file cannot be read or embedded
/// - a listener cannot be bound
/// - draining exceeds the graceful shutdown timeout
pub async fn run() -> Result<()> {
    let environment = Environment::from_env();
    core_config::tracing::init_tracing(&environment);

    let config = AppConfig::from_env().wrap_err("Failed to load configuration")?;
    let index = build_index(&config).await?;
    let app = build_app(&config.server, index)?;

    serve_until(Arc::new(app), shutdown_signal()).await
}

/// Builds the in-memory index, seeding it when a seed file is configured.
pub async fn build_index(config: &AppConfig) -> Result<TextIndex> {
    let embedder = OpenAIEmbedder::new(config.openai.clone());
    let store = InMemoryVectorStore::new(Arc::new(embedder));

    if let Some(path) = &config.seed_file {
        store
            .seed_from_file(path)
            .await
            .wrap_err_with(|| format!("Failed to seed index from {}", path))?;
    }

    Ok(TextIndex::new(Arc::new(store)))
}

/// Wires both endpoints around `index` into a startable application.
pub fn build_app(server: &ServerConfig, index: TextIndex) -> Result<AppLifecycle> {
    let (health_reporter, health_service) = create_health_service();

    let vectorstore_service = VectorStoreServiceServer::new(VectorStoreServiceImpl::new(index))
        .accept_compressed(CompressionEncoding::Zstd)
        .send_compressed(CompressionEncoding::Zstd);
    let routes = Routes::new(health_service).add_service(vectorstore_service);

    let bridge = create_channel_lazy(format!("http://{}", server.loopback_grpc_address()))
        .wrap_err("Failed to create gateway channel")?;
    let gateway = create_router(vectorstore_router(bridge.clone()), &server.allowed_origins)
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
            GrpcServer::setup_health_multiple(&health_reporter, &[SERVICE_NAME]).await;

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
pub async fn serve_until<F>(app: Arc<AppLifecycle>, signal: F) -> Result<()>
where
    F: Future<Output = ()>,
{
    app.run_until(signal)
        .await
        .wrap_err("Application stopped with an error")
}
