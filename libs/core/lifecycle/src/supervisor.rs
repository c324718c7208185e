//! Runs the gRPC endpoint and its HTTP gateway as one unit.
//!
//! Both endpoints start together and stop together. The first serve error
//! from either one ends [`ServerSupervisor::run`]; canceling the context
//! passed to `run` drains both within the configured shutdown timeout.
//! Whatever is still running once it elapses, down to individual
//! connections and HTTP/2 streams, is dropped.

use std::future::Future;
use std::io;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use axum::Router;
use hyper::rt::Executor;
use hyper_util::rt::TokioIo;
use hyper_util::server::conn::auto;
use hyper_util::server::graceful::GracefulShutdown;
use hyper_util::service::TowerToHyperService;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tonic::service::Routes;
use tonic::transport::Channel;
use tracing::{debug, info, warn};

use crate::context::Context;
use crate::error::{BoxError, SupervisorError};

pub const GRPC_ENDPOINT: &str = "gRPC";
pub const HTTP_ENDPOINT: &str = "HTTP";

#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub grpc_addr: String,
    pub gateway_addr: String,
    pub graceful_shutdown_timeout: Duration,
}

/// Client-side connection the gateway uses to reach the gRPC endpoint.
///
/// Released once when [`ServerSupervisor::run`] returns.
pub trait ConnectionBridge: Send {
    fn close(self: Box<Self>) -> Result<(), BoxError>;
}

impl ConnectionBridge for Channel {
    fn close(self: Box<Self>) -> Result<(), BoxError> {
        drop(self);
        Ok(())
    }
}

pub struct ServerSupervisor {
    config: SupervisorConfig,
    routes: Routes,
    gateway: Router,
    bridge: Mutex<Option<Box<dyn ConnectionBridge>>>,
}

/// A spawned server task and the signals that drain or kill it.
struct Endpoint {
    name: &'static str,
    stop: Option<oneshot::Sender<()>>,
    /// Parent of every connection task the endpoint spawned.
    kill: Context,
    handle: JoinHandle<()>,
}

impl Endpoint {
    fn signal(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }

    /// Drains the endpoint, killing its task and connections if `deadline`
    /// ends first.
    async fn stop(mut self, deadline: &Context) -> Option<SupervisorError> {
        self.signal();

        tokio::select! {
            joined = &mut self.handle => match joined {
                Ok(()) => {
                    info!(endpoint = self.name, "server stopped");
                    None
                }
                Err(err) if err.is_panic() => Some(SupervisorError::Panicked { endpoint: self.name }),
                Err(_) => None,
            },
            cause = deadline.done() => {
                warn!(endpoint = self.name, %cause, "graceful shutdown did not finish in time, forcing stop");
                self.kill.cancel();
                self.handle.abort();
                Some(SupervisorError::ShutdownTimeout { endpoint: self.name, cause })
            }
        }
    }
}

/// Spawns connection and HTTP/2 stream tasks that end when `kill` does.
#[derive(Clone)]
struct ConnectionExecutor {
    kill: Context,
}

impl<F> Executor<F> for ConnectionExecutor
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    fn execute(&self, fut: F) {
        let kill = self.kill.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = fut => {}
                _ = kill.done() => {}
            }
        });
    }
}

/// Per-connection accept failures that leave the listener usable.
fn is_connection_error(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
    )
}

/// Serves `router` on `listener` until `stopped` fires, then waits for open
/// connections to finish.
///
/// Connections run on tasks owned by `kill`, which is canceled when this
/// future returns or is dropped.
async fn serve_connections(
    endpoint: &'static str,
    listener: TcpListener,
    router: Router,
    mut stopped: oneshot::Receiver<()>,
    kill: Context,
) -> Result<(), SupervisorError> {
    let _kill_on_exit = kill.drop_guard();

    let executor = ConnectionExecutor { kill };
    let builder = auto::Builder::new(executor.clone());
    let graceful = GracefulShutdown::new();
    let service = TowerToHyperService::new(router);

    info!(endpoint, addr = ?listener.local_addr().ok(), "starting server");

    loop {
        let (stream, peer) = tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok(accepted) => accepted,
                Err(err) if is_connection_error(&err) => {
                    debug!(endpoint, error = %err, "accept failed");
                    continue;
                }
                Err(err) => {
                    return Err(SupervisorError::Serve {
                        endpoint,
                        source: Box::new(err),
                    });
                }
            },
            _ = &mut stopped => break,
        };

        if let Err(err) = stream.set_nodelay(true) {
            debug!(endpoint, %peer, error = %err, "failed to set TCP_NODELAY");
        }

        let connection = builder.serve_connection_with_upgrades(TokioIo::new(stream), service.clone());
        let connection = graceful.watch(connection.into_owned());
        executor.execute(async move {
            if let Err(err) = connection.await {
                debug!(endpoint, %peer, error = %err, "connection ended with an error");
            }
        });
    }

    drop(listener);
    graceful.shutdown().await;
    Ok(())
}

impl ServerSupervisor {
    pub fn new(config: SupervisorConfig, routes: Routes, gateway: Router) -> Self {
        Self {
            config,
            routes,
            gateway,
            bridge: Mutex::new(None),
        }
    }

    pub fn with_bridge(self, bridge: impl ConnectionBridge + 'static) -> Self {
        *self.bridge.lock().unwrap_or_else(PoisonError::into_inner) = Some(Box::new(bridge));
        self
    }

    /// Serves both endpoints until `ctx` is canceled or one of them fails.
    ///
    /// Returns `Ok(())` only when both endpoints drained before the shutdown
    /// deadline and the bridge closed cleanly.
    pub async fn run(&self, ctx: Context) -> Result<(), SupervisorError> {
        let result = self.serve(&ctx).await;

        match (result, self.release_bridge()) {
            (result, None) => result,
            (Ok(()), Some(err)) => Err(err),
            (Err(err), Some(bridge)) => Err(err.join(bridge)),
        }
    }

    async fn serve(&self, ctx: &Context) -> Result<(), SupervisorError> {
        let grpc_listener = TcpListener::bind(&self.config.grpc_addr)
            .await
            .map_err(|source| SupervisorError::Bind {
                endpoint: GRPC_ENDPOINT,
                addr: self.config.grpc_addr.clone(),
                source,
            })?;

        // One slot per endpoint, so a failing task never blocks on send.
        let (errors, mut failures) = mpsc::channel(2);

        let grpc = self.spawn_grpc(grpc_listener, errors.clone());
        let gateway = self.spawn_gateway(errors);

        let failure = tokio::select! {
            Some(err) = failures.recv() => {
                warn!(error = %err, "server failed, stopping both endpoints");
                Some(err)
            }
            cause = ctx.done() => {
                info!(
                    %cause,
                    timeout = ?self.config.graceful_shutdown_timeout,
                    "shutting down servers"
                );
                None
            }
        };

        let deadline = Context::background().with_timeout(self.config.graceful_shutdown_timeout);
        let (grpc_stopped, gateway_stopped) =
            tokio::join!(grpc.stop(&deadline), gateway.stop(&deadline));

        let mut stopped: Vec<SupervisorError> =
            [grpc_stopped, gateway_stopped].into_iter().flatten().collect();
        while let Ok(err) = failures.try_recv() {
            stopped.push(err);
        }

        match failure {
            Some(err) => Err(stopped.into_iter().fold(err, SupervisorError::join)),
            None if stopped.is_empty() => Ok(()),
            None => Err(SupervisorError::Shutdown(stopped)),
        }
    }

    fn spawn_grpc(&self, listener: TcpListener, errors: mpsc::Sender<SupervisorError>) -> Endpoint {
        let (stop, stopped) = oneshot::channel::<()>();
        let kill = Context::background().child();
        let router = self.routes.clone().into_axum_router();

        let handle = tokio::spawn({
            let kill = kill.clone();
            async move {
                if let Err(err) = serve_connections(GRPC_ENDPOINT, listener, router, stopped, kill).await {
                    let _ = errors.send(err).await;
                }
            }
        });

        Endpoint {
            name: GRPC_ENDPOINT,
            stop: Some(stop),
            kill,
            handle,
        }
    }

    fn spawn_gateway(&self, errors: mpsc::Sender<SupervisorError>) -> Endpoint {
        let (stop, stopped) = oneshot::channel::<()>();
        let kill = Context::background().child();
        let router = self.gateway.clone();
        let addr = self.config.gateway_addr.clone();

        let handle = tokio::spawn({
            let kill = kill.clone();
            async move {
                let listener = match TcpListener::bind(&addr).await {
                    Ok(listener) => listener,
                    Err(source) => {
                        let _ = errors
                            .send(SupervisorError::Bind {
                                endpoint: HTTP_ENDPOINT,
                                addr,
                                source,
                            })
                            .await;
                        return;
                    }
                };

                if let Err(err) = serve_connections(HTTP_ENDPOINT, listener, router, stopped, kill).await {
                    let _ = errors.send(err).await;
                }
            }
        });

        Endpoint {
            name: HTTP_ENDPOINT,
            stop: Some(stop),
            kill,
            handle,
        }
    }

    fn release_bridge(&self) -> Option<SupervisorError> {
        let bridge = self
            .bridge
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()?;

        bridge.close().err().map(SupervisorError::Bridge)
    }
}

impl std::fmt::Debug for ServerSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerSupervisor")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
