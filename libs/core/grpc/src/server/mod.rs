//! gRPC server helpers
//!
//! Health reporting and startup logging for tonic servers.
//!
//! ```ignore
//! use grpc_client::server::{GrpcServer, create_health_service};
//! use rpc::rag::rag_service_server::SERVICE_NAME;
//!
//! let (health_reporter, health_service) = create_health_service();
//! GrpcServer::setup_health_multiple(&health_reporter, &[SERVICE_NAME]).await;
//! GrpcServer::log_startup(&addr, &[SERVICE_NAME]);
//! ```

mod builder;

pub use builder::{GrpcServer, create_health_service};
