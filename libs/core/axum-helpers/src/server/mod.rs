//! Server infrastructure: router defaults and OS shutdown signals.

pub mod app;
pub mod shutdown;

pub use app::create_router;
pub use shutdown::shutdown_signal;
