use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::{Router, routing::get};
use core_lifecycle::{
    AppLifecycle, AppState, BoxError, CancelCause, ConnectionBridge, Context, GRPC_ENDPOINT,
    HTTP_ENDPOINT, ServerSupervisor, SupervisorConfig, SupervisorError,
};
use tokio::sync::Notify;
use tonic::service::Routes;
use tonic::transport::Channel;
use tonic_health::pb::{HealthCheckRequest, health_check_response::ServingStatus, health_client::HealthClient};

fn free_addr() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().to_string()
}

fn config(grpc_addr: String, gateway_addr: String, timeout: Duration) -> SupervisorConfig {
    SupervisorConfig {
        grpc_addr,
        gateway_addr,
        graceful_shutdown_timeout: timeout,
    }
}

fn health_routes() -> Routes {
    let (_reporter, health) = tonic_health::server::health_reporter();
    Routes::new(health)
}

fn gateway() -> Router {
    Router::new().route("/ping", get(|| async { "pong" }))
}

struct FlagBridge {
    closed: Arc<AtomicBool>,
    fail: bool,
}

impl ConnectionBridge for FlagBridge {
    fn close(self: Box<Self>) -> Result<(), BoxError> {
        self.closed.store(true, Ordering::SeqCst);
        if self.fail {
            Err("connection reset".into())
        } else {
            Ok(())
        }
    }
}

async fn health_client(grpc_addr: &str) -> HealthClient<Channel> {
    let channel = Channel::from_shared(format!("http://{grpc_addr}"))
        .unwrap()
        .connect()
        .await
        .unwrap();
    HealthClient::new(channel)
}

fn shutdown_timeouts(err: &SupervisorError) -> Vec<(&'static str, CancelCause)> {
    err.errors()
        .into_iter()
        .filter_map(|e| match e {
            SupervisorError::ShutdownTimeout { endpoint, cause } => Some((*endpoint, *cause)),
            _ => None,
        })
        .collect()
}

async fn wait_for_gateway(addr: &str) {
    let url = format!("http://{addr}/ping");
    for _ in 0..100 {
        if let Ok(response) = reqwest::get(&url).await {
            assert_eq!(response.text().await.unwrap(), "pong");
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("gateway at {addr} never came up");
}

#[tokio::test]
async fn serves_both_endpoints_until_canceled() {
    let grpc_addr = free_addr();
    let gateway_addr = free_addr();
    let closed = Arc::new(AtomicBool::new(false));

    let supervisor = Arc::new(
        ServerSupervisor::new(
            config(grpc_addr.clone(), gateway_addr.clone(), Duration::from_secs(5)),
            health_routes(),
            gateway(),
        )
        .with_bridge(FlagBridge {
            closed: closed.clone(),
            fail: false,
        }),
    );

    let ctx = Context::background().child();
    let run = {
        let supervisor = supervisor.clone();
        let ctx = ctx.clone();
        tokio::spawn(async move { supervisor.run(ctx).await })
    };

    wait_for_gateway(&gateway_addr).await;

    let mut health = health_client(&grpc_addr).await;
    let status = health
        .check(HealthCheckRequest { service: String::new() })
        .await
        .unwrap()
        .into_inner()
        .status();
    assert_eq!(status, ServingStatus::Serving);
    drop(health);

    ctx.cancel();

    let result = tokio::time::timeout(Duration::from_secs(5), run).await.unwrap().unwrap();
    assert!(result.is_ok(), "unexpected error: {result:?}");
    assert!(closed.load(Ordering::SeqCst));
}

#[tokio::test]
async fn grpc_bind_failure_never_starts_gateway() {
    let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let grpc_addr = taken.local_addr().unwrap().to_string();
    let gateway_addr = free_addr();
    let closed = Arc::new(AtomicBool::new(false));

    let supervisor = ServerSupervisor::new(
        config(grpc_addr.clone(), gateway_addr.clone(), Duration::from_secs(5)),
        health_routes(),
        gateway(),
    )
    .with_bridge(FlagBridge {
        closed: closed.clone(),
        fail: false,
    });

    let err = supervisor.run(Context::background()).await.unwrap_err();
    match err {
        SupervisorError::Bind { endpoint, addr, .. } => {
            assert_eq!(endpoint, GRPC_ENDPOINT);
            assert_eq!(addr, grpc_addr);
        }
        other => panic!("expected bind error, got {other}"),
    }

    // The gateway port is still free.
    std::net::TcpListener::bind(&gateway_addr).unwrap();
    assert!(closed.load(Ordering::SeqCst));
}

#[tokio::test]
async fn gateway_failure_ends_run_without_cancel() {
    let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let gateway_addr = taken.local_addr().unwrap().to_string();
    let grpc_addr = free_addr();

    let supervisor = ServerSupervisor::new(
        config(grpc_addr.clone(), gateway_addr, Duration::from_secs(5)),
        health_routes(),
        gateway(),
    );

    let err = tokio::time::timeout(Duration::from_secs(5), supervisor.run(Context::background()))
        .await
        .unwrap()
        .unwrap_err();

    assert!(
        matches!(err, SupervisorError::Bind { endpoint, .. } if endpoint == HTTP_ENDPOINT),
        "unexpected error: {err}"
    );
    // The gRPC endpoint was stopped before run returned.
    std::net::TcpListener::bind(&grpc_addr).unwrap();
}

#[tokio::test]
async fn in_flight_request_past_deadline_forces_stop() {
    let grpc_addr = free_addr();
    let gateway_addr = free_addr();
    let entered = Arc::new(Notify::new());
    let finished = Arc::new(AtomicBool::new(false));

    let router = gateway().route(
        "/slow",
        get({
            let entered = entered.clone();
            let finished = finished.clone();
            move || {
                let entered = entered.clone();
                let finished = finished.clone();
                async move {
                    entered.notify_one();
                    tokio::time::sleep(Duration::from_millis(600)).await;
                    finished.store(true, Ordering::SeqCst);
                    "late"
                }
            }
        }),
    );

    let supervisor = Arc::new(ServerSupervisor::new(
        config(grpc_addr, gateway_addr.clone(), Duration::from_millis(100)),
        health_routes(),
        router,
    ));

    let ctx = Context::background().child();
    let run = {
        let supervisor = supervisor.clone();
        let ctx = ctx.clone();
        tokio::spawn(async move { supervisor.run(ctx).await })
    };

    wait_for_gateway(&gateway_addr).await;
    let slow = tokio::spawn(reqwest::get(format!("http://{gateway_addr}/slow")));
    entered.notified().await;

    ctx.cancel();

    let err = tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .unwrap()
        .unwrap()
        .unwrap_err();

    assert_eq!(
        shutdown_timeouts(&err),
        vec![(HTTP_ENDPOINT, CancelCause::DeadlineExceeded)]
    );
    assert!(err.to_string().contains("HTTP server shutdown timeout"));

    // The handler was dropped with its connection, so it never completes.
    let response = tokio::time::timeout(Duration::from_secs(2), slow)
        .await
        .unwrap()
        .unwrap();
    assert!(response.is_err(), "request outlived the forced stop: {response:?}");
    tokio::time::sleep(Duration::from_millis(800)).await;
    assert!(!finished.load(Ordering::SeqCst));
}

#[tokio::test]
async fn open_grpc_stream_past_deadline_forces_stop() {
    let grpc_addr = free_addr();
    let gateway_addr = free_addr();

    let supervisor = Arc::new(ServerSupervisor::new(
        config(grpc_addr.clone(), gateway_addr.clone(), Duration::from_millis(100)),
        health_routes(),
        gateway(),
    ));

    let ctx = Context::background().child();
    let run = {
        let supervisor = supervisor.clone();
        let ctx = ctx.clone();
        tokio::spawn(async move { supervisor.run(ctx).await })
    };
    wait_for_gateway(&gateway_addr).await;

    // Health watch streams stay open until the client or server ends them.
    let mut health = health_client(&grpc_addr).await;
    let mut updates = health
        .watch(HealthCheckRequest { service: String::new() })
        .await
        .unwrap()
        .into_inner();
    let first = updates.message().await.unwrap().unwrap();
    assert_eq!(first.status(), ServingStatus::Serving);

    ctx.cancel();

    let err = tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .unwrap()
        .unwrap()
        .unwrap_err();
    assert_eq!(
        shutdown_timeouts(&err),
        vec![(GRPC_ENDPOINT, CancelCause::DeadlineExceeded)]
    );

    let next = tokio::time::timeout(Duration::from_secs(2), updates.message())
        .await
        .expect("stream stayed open after the forced stop");
    assert!(!matches!(next, Ok(Some(_))), "unexpected update: {next:?}");
}

#[tokio::test]
async fn bridge_close_failure_is_reported() {
    let gateway_addr = free_addr();
    let closed = Arc::new(AtomicBool::new(false));

    let supervisor = Arc::new(
        ServerSupervisor::new(
            config(free_addr(), gateway_addr.clone(), Duration::from_secs(5)),
            health_routes(),
            gateway(),
        )
        .with_bridge(FlagBridge {
            closed: closed.clone(),
            fail: true,
        }),
    );

    let ctx = Context::background().child();
    let run = {
        let supervisor = supervisor.clone();
        let ctx = ctx.clone();
        tokio::spawn(async move { supervisor.run(ctx).await })
    };
    wait_for_gateway(&gateway_addr).await;

    ctx.cancel();

    let err = run.await.unwrap().unwrap_err();
    assert!(matches!(err, SupervisorError::Bridge(_)), "unexpected error: {err}");
    assert_eq!(
        err.to_string(),
        "gRPC client connection close error: connection reset"
    );
    assert!(closed.load(Ordering::SeqCst));
}

#[tokio::test]
async fn lifecycle_shutdown_drains_supervisor() {
    let gateway_addr = free_addr();
    let supervisor = Arc::new(ServerSupervisor::new(
        config(free_addr(), gateway_addr.clone(), Duration::from_secs(5)),
        health_routes(),
        gateway(),
    ));

    let app = Arc::new(AppLifecycle::new(move |ctx| {
        let supervisor = supervisor.clone();
        async move { supervisor.run(ctx).await }
    }));

    let started = {
        let app = app.clone();
        tokio::spawn(async move { app.start(&Context::background()).await })
    };
    wait_for_gateway(&gateway_addr).await;
    assert_eq!(app.state(), AppState::Running);

    app.shutdown(&Context::background()).await.unwrap();
    app.shutdown(&Context::background()).await.unwrap();

    tokio::time::timeout(Duration::from_secs(5), started)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(app.state(), AppState::Shutdown);
    assert!(reqwest::get(format!("http://{gateway_addr}/ping")).await.is_err());
}
