//! Process lifecycle for services that expose gRPC plus an HTTP gateway.
//!
//! - [`Context`]: cancellation and deadline tree shared by everything below
//! - [`ServerSupervisor`]: runs both endpoints and drains them on cancel
//! - [`AppLifecycle`]: start-once, shutdown-idempotent state machine
//!
//! ```ignore
//! let supervisor = Arc::new(ServerSupervisor::new(config, routes, gateway).with_bridge(channel));
//! let app = Arc::new(AppLifecycle::new(move |ctx| {
//!     let supervisor = supervisor.clone();
//!     async move { supervisor.run(ctx).await }
//! }));
//!
//! tokio::spawn({
//!     let app = app.clone();
//!     async move {
//!         shutdown_signal().await;
//!         app.shutdown(&Context::background()).await
//!     }
//! });
//! app.start(&Context::background()).await?;
//! ```

pub mod app;
pub mod context;
pub mod error;
pub mod supervisor;

pub use app::{AppLifecycle, AppState};
pub use context::{CancelCause, Context, DropGuard};
pub use error::{BoxError, LifecycleError, SupervisorError, is_canceled};
pub use supervisor::{
    ConnectionBridge, GRPC_ENDPOINT, HTTP_ENDPOINT, ServerSupervisor, SupervisorConfig,
};
