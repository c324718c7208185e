use std::fmt::Display;
use tracing::info;

/// Helper for setting up gRPC servers with health checks.
pub struct GrpcServer;

impl GrpcServer {
    /// Log server startup information.
    pub fn log_startup(addr: &impl Display, service_names: &[&str]) {
        info!(
            addr = %addr,
            services = ?service_names,
            "gRPC server starting"
        );
        info!("Health check service enabled (grpc.health.v1.Health)");
    }

    /// Set up health reporting for multiple services.
    ///
    /// Marks all specified services and the empty service name as serving
    /// (empty is used by k8s default health checks).
    pub async fn setup_health_multiple(
        health_reporter: &tonic_health::server::HealthReporter,
        service_names: &[&str],
    ) {
        for service_name in service_names {
            health_reporter
                .set_service_status(*service_name, tonic_health::ServingStatus::Serving)
                .await;
        }

        health_reporter
            .set_service_status("", tonic_health::ServingStatus::Serving)
            .await;

        info!(services = ?service_names, "Services marked as serving");
    }

    /// Mark every service as not serving, used while draining.
    pub async fn mark_not_serving(
        health_reporter: &tonic_health::server::HealthReporter,
        service_names: &[&str],
    ) {
        for service_name in service_names.iter().copied().chain([""]) {
            health_reporter
                .set_service_status(service_name, tonic_health::ServingStatus::NotServing)
                .await;
        }
    }
}

pub use tonic_health::server::health_reporter as create_health_service;
