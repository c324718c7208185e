use crate::error::GrpcResult;
use tonic::transport::Channel;
use tonic_health::pb::HealthCheckRequest;
use tonic_health::pb::health_client::HealthClient;

pub use tonic_health::pb::health_check_response::ServingStatus;

/// Calls `grpc.health.v1.Health/Check` for `service` over `channel`.
///
/// An empty service name asks for the overall server status.
pub async fn check_health(channel: Channel, service: &str) -> GrpcResult<ServingStatus> {
  let mut client = HealthClient::new(channel);
  let response = client
    .check(HealthCheckRequest {
      service: service.to_string(),
    })
    .await?;

  let status = response.into_inner().status();
  tracing::debug!(target: "grpc_client", service, ?status, "Health check answered");
  Ok(status)
}
