pub mod config;

pub use config::ChannelConfig;

use crate::error::{GrpcError, GrpcResult};
use tonic::transport::{Channel, Endpoint};

/// Creates a gRPC channel with the default [`ChannelConfig`] and connects eagerly.
///
/// ## Example
/// ```ignore
/// use grpc_client::create_channel;
/// use rpc::vectorstore::vector_store_service_client::VectorStoreServiceClient;
///
/// let channel = create_channel("http://vectorstore:9002").await?;
/// let client = VectorStoreServiceClient::new(channel);
/// ```
pub async fn create_channel(addr: impl Into<String>) -> GrpcResult<Channel> {
  create_channel_with_config(addr, ChannelConfig::default()).await
}

/// Creates a lazy gRPC channel that connects on first request
///
/// Returns immediately without establishing a connection. The gateway uses
/// this to reach the primary endpoint of the same process, which may not be
/// accepting yet when the gateway is wired up.
///
/// ## Example
/// ```ignore
/// use grpc_client::create_channel_lazy;
/// use rpc::rag::rag_service_client::RagServiceClient;
///
/// // Returns immediately, no connection attempt yet
/// let channel = create_channel_lazy("http://127.0.0.1:9001")?;
/// let client = RagServiceClient::new(channel);
/// ```
pub fn create_channel_lazy(addr: impl Into<String>) -> GrpcResult<Channel> {
  create_channel_lazy_with_config(addr, ChannelConfig::default())
}

/// Creates a lazy gRPC channel with custom configuration
pub fn create_channel_lazy_with_config(
  addr: impl Into<String>,
  config: ChannelConfig,
) -> GrpcResult<Channel> {
  let addr_string = addr.into();
  let endpoint = endpoint(&addr_string, config)?;

  tracing::debug!(
    target: "grpc_client",
    addr = %addr_string,
    "Creating lazy gRPC channel (connects on first request)"
  );

  Ok(endpoint.connect_lazy())
}

/// Creates a gRPC channel with custom configuration and connects eagerly
pub async fn create_channel_with_config(
  addr: impl Into<String>,
  config: ChannelConfig,
) -> GrpcResult<Channel> {
  let addr_string = addr.into();
  let endpoint = endpoint(&addr_string, config)?;

  tracing::debug!(target: "grpc_client", addr = %addr_string, "Creating gRPC channel");

  endpoint.connect().await.map_err(|e| {
    tracing::error!(
      target: "grpc_client",
      addr = %addr_string,
      error = ?e,
      "Failed to connect to gRPC service"
    );
    GrpcError::ConnectionFailed(e)
  })
}

fn endpoint(addr: &str, config: ChannelConfig) -> GrpcResult<Endpoint> {
  let endpoint = Endpoint::from_shared(addr.to_string()).map_err(|e| {
    tracing::error!(target: "grpc_client", addr = %addr, error = ?e, "Invalid URI");
    GrpcError::InvalidUri(e)
  })?;

  Ok(config.apply_to_endpoint(endpoint))
}
