//! # gRPC plumbing
//!
//! Channel creation with HTTP/2 tuning, health service setup and health
//! probing, shared by the servers and their HTTP gateways.
//!
//! ## Quick Start
//!
//! ```ignore
//! use grpc_client::{create_channel_lazy, check_health};
//! use rpc::rag::rag_service_client::RagServiceClient;
//!
//! // Returns immediately; connects on the first RPC.
//! let channel = create_channel_lazy("http://127.0.0.1:9001")?;
//! let client = RagServiceClient::new(channel.clone());
//!
//! let status = check_health(channel, "").await?;
//! ```

pub mod channel;
pub mod error;
pub mod health;
pub mod probe;
pub mod server;

pub use channel::{
  ChannelConfig, create_channel, create_channel_lazy, create_channel_lazy_with_config,
  create_channel_with_config,
};
pub use error::{GrpcError, GrpcResult};
pub use health::{ServingStatus, check_health};
pub use server::{GrpcServer, create_health_service};
