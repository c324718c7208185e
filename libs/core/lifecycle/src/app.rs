//! Start-once, shutdown-idempotent wrapper around a long-running callback.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU8, Ordering};

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::watch;
use tracing::info;

use crate::context::Context;
use crate::error::{BoxError, LifecycleError, is_canceled};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AppState {
    New = 0,
    Starting = 1,
    Running = 2,
    Shutdown = 3,
}

impl AppState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => AppState::New,
            1 => AppState::Starting,
            2 => AppState::Running,
            _ => AppState::Shutdown,
        }
    }
}

type RunFn = Box<dyn Fn(Context) -> BoxFuture<'static, Result<(), BoxError>> + Send + Sync>;

/// Drives `run` through `New -> Starting -> Running -> Shutdown`.
///
/// `start` blocks for as long as `run` does. `shutdown` cancels the context
/// handed to `run`, which is expected to wind down and return.
pub struct AppLifecycle {
    run: RunFn,
    state: AtomicU8,
    done: watch::Sender<bool>,
}

impl AppLifecycle {
    pub fn new<F, Fut, E>(run: F) -> Self
    where
        F: Fn(Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Into<BoxError>,
    {
        let run: RunFn = Box::new(move |ctx| {
            let fut = run(ctx);
            async move { fut.await.map_err(Into::into) }.boxed()
        });
        let (done, _) = watch::channel(false);

        Self {
            run,
            state: AtomicU8::new(AppState::New as u8),
            done,
        }
    }

    pub fn state(&self) -> AppState {
        AppState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Runs the callback until it returns.
    ///
    /// A callback ending with a cancellation error counts as a clean stop.
    /// Any other failure, or a panic, puts the state back to `New`.
    pub async fn start(&self, ctx: &Context) -> Result<(), LifecycleError> {
        if let Err(current) = self.state.compare_exchange(
            AppState::New as u8,
            AppState::Starting as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            return Err(match AppState::from_u8(current) {
                AppState::Starting => LifecycleError::StartInProgress,
                AppState::Running => LifecycleError::AlreadyStarted,
                _ => LifecycleError::AlreadyShutdown,
            });
        }

        let run_ctx = ctx.child();
        let _cancel = run_ctx.drop_guard();

        self.state.store(AppState::Running as u8, Ordering::Release);

        let mut done = self.done.subscribe();
        let watcher = run_ctx.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = done.wait_for(|closed| *closed) => {}
                _ = watcher.done() => {}
            }
            info!("initiating graceful shutdown");
            watcher.cancel();
        });

        match AssertUnwindSafe((self.run)(run_ctx.clone())).catch_unwind().await {
            Err(panic) => {
                self.state.store(AppState::New as u8, Ordering::Release);
                std::panic::resume_unwind(panic);
            }
            Ok(Err(err)) if !is_canceled(err.as_ref()) => {
                self.state.store(AppState::New as u8, Ordering::Release);
                return Err(LifecycleError::Start(err));
            }
            Ok(_) => {}
        }

        info!("shutdown completed");
        Ok(())
    }

    /// Signals a running callback to stop. Safe to call from many tasks.
    pub async fn shutdown(&self, ctx: &Context) -> Result<(), LifecycleError> {
        if let Some(cause) = ctx.err() {
            return Err(cause.into());
        }

        loop {
            match self.state() {
                AppState::New | AppState::Starting => return Err(LifecycleError::NotRunning),
                AppState::Shutdown => return Ok(()),
                AppState::Running => {
                    if self
                        .state
                        .compare_exchange(
                            AppState::Running as u8,
                            AppState::Shutdown as u8,
                            Ordering::AcqRel,
                            Ordering::Acquire,
                        )
                        .is_ok()
                    {
                        self.done.send_replace(true);
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Runs the callback until it returns or `signal` completes, then shuts
    /// it down and waits for it.
    ///
    /// A `signal` that is already complete still sees the app started first.
    pub async fn run_until<F>(&self, signal: F) -> Result<(), LifecycleError>
    where
        F: Future<Output = ()>,
    {
        let background = Context::background();
        let started = self.start(&background);
        tokio::pin!(started);

        // `start` leaves `New` on its first poll, before it ever yields.
        tokio::select! {
            biased;
            result = &mut started => return result,
            _ = signal => {}
        }

        self.shutdown(&background).await?;
        started.await
    }

    #[cfg(test)]
    fn force_state(&self, state: AppState) {
        self.state.store(state as u8, Ordering::Release);
    }
}

impl std::fmt::Debug for AppLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppLifecycle")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use super::*;
    use crate::context::CancelCause;

    fn idle() -> AppLifecycle {
        AppLifecycle::new(|_ctx| async { Ok::<_, BoxError>(()) })
    }

    /// Callback that blocks until its context ends, then reports the cause.
    fn until_canceled() -> AppLifecycle {
        AppLifecycle::new(|ctx: Context| async move {
            let cause = ctx.done().await;
            Err::<(), _>(cause)
        })
    }

    async fn wait_for_state(app: &AppLifecycle, want: AppState) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while app.state() != want {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("state never became {want:?}, is {:?}", app.state()));
    }

    #[tokio::test]
    async fn test_start_rejected_by_state() {
        let cases = [
            (AppState::Starting, "app start is already in progress"),
            (AppState::Running, "app is already started"),
            (AppState::Shutdown, "app has been shut down, create a new instance to start again"),
        ];

        for (state, message) in cases {
            let app = idle();
            app.force_state(state);

            let err = app.start(&Context::background()).await.unwrap_err();
            assert_eq!(err.to_string(), message, "start from {state:?}");
            assert_eq!(app.state(), state);
        }
    }

    #[tokio::test]
    async fn test_shutdown_by_state() {
        for state in [AppState::New, AppState::Starting] {
            let app = idle();
            app.force_state(state);
            let err = app.shutdown(&Context::background()).await.unwrap_err();
            assert!(matches!(err, LifecycleError::NotRunning), "shutdown from {state:?}");
        }

        let app = idle();
        app.force_state(AppState::Shutdown);
        assert!(app.shutdown(&Context::background()).await.is_ok());
    }

    #[tokio::test]
    async fn test_start_then_shutdown() {
        let app = Arc::new(until_canceled());

        let runner = {
            let app = app.clone();
            tokio::spawn(async move { app.start(&Context::background()).await })
        };
        wait_for_state(&app, AppState::Running).await;

        app.shutdown(&Context::background()).await.unwrap();

        runner.await.unwrap().unwrap();
        assert_eq!(app.state(), AppState::Shutdown);
    }

    #[tokio::test]
    async fn test_failed_start_resets_to_new() {
        let calls = Arc::new(AtomicUsize::new(0));
        let app = {
            let calls = calls.clone();
            AppLifecycle::new(move |_ctx| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), BoxError>("port in use".into()) }
            })
        };

        let err = app.start(&Context::background()).await.unwrap_err();
        assert_eq!(err.to_string(), "failed to start application: port in use");
        assert_eq!(app.state(), AppState::New);

        // A reset app can be started again.
        assert!(app.start(&Context::background()).await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_second_start_is_rejected_while_running() {
        let app = Arc::new(until_canceled());
        let runner = {
            let app = app.clone();
            tokio::spawn(async move { app.start(&Context::background()).await })
        };
        wait_for_state(&app, AppState::Running).await;

        let err = app.start(&Context::background()).await.unwrap_err();
        assert!(matches!(err, LifecycleError::AlreadyStarted));

        app.shutdown(&Context::background()).await.unwrap();
        runner.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_with_canceled_context() {
        let app = Arc::new(until_canceled());
        let runner = {
            let app = app.clone();
            tokio::spawn(async move { app.start(&Context::background()).await })
        };
        wait_for_state(&app, AppState::Running).await;

        let canceled = Context::background().child();
        canceled.cancel();
        let err = app.shutdown(&canceled).await.unwrap_err();
        assert!(matches!(err, LifecycleError::Canceled(CancelCause::Canceled)));
        assert_eq!(app.state(), AppState::Running);

        app.shutdown(&Context::background()).await.unwrap();
        runner.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_parent_cancel_stops_callback() {
        let app = Arc::new(until_canceled());
        let parent = Context::background().child();
        let runner = {
            let app = app.clone();
            let parent = parent.clone();
            tokio::spawn(async move { app.start(&parent).await })
        };
        wait_for_state(&app, AppState::Running).await;

        parent.cancel();

        runner.await.unwrap().unwrap();
        // Only an explicit shutdown moves the state out of Running.
        assert_eq!(app.state(), AppState::Running);
    }

    #[tokio::test]
    async fn test_panic_resets_state_and_propagates() {
        let app = Arc::new(AppLifecycle::new(|_ctx| async {
            if true {
                panic!("callback exploded");
            }
            Ok::<_, BoxError>(())
        }));

        let joined = {
            let app = app.clone();
            tokio::spawn(async move { app.start(&Context::background()).await }).await
        };

        let err = joined.unwrap_err();
        assert!(err.is_panic());
        assert_eq!(app.state(), AppState::New);
    }

    #[tokio::test]
    async fn test_concurrent_shutdown() {
        let app = Arc::new(until_canceled());
        let runner = {
            let app = app.clone();
            tokio::spawn(async move { app.start(&Context::background()).await })
        };
        wait_for_state(&app, AppState::Running).await;

        let callers: Vec<_> = (0..5)
            .map(|_| {
                let app = app.clone();
                tokio::spawn(async move { app.shutdown(&Context::background()).await })
            })
            .collect();

        for caller in callers {
            match caller.await.unwrap() {
                Ok(()) | Err(LifecycleError::NotRunning) => {}
                Err(other) => panic!("unexpected shutdown error: {other}"),
            }
        }

        runner.await.unwrap().unwrap();
        assert_eq!(app.state(), AppState::Shutdown);
    }

    #[tokio::test]
    async fn test_start_shutdown_race() {
        for _ in 0..20 {
            let app = Arc::new(until_canceled());

            let runner = {
                let app = app.clone();
                tokio::spawn(async move { app.start(&Context::background()).await })
            };
            let stopper = {
                let app = app.clone();
                tokio::spawn(async move {
                    loop {
                        match app.shutdown(&Context::background()).await {
                            Ok(()) => break,
                            Err(LifecycleError::NotRunning) => tokio::task::yield_now().await,
                            Err(other) => panic!("unexpected shutdown error: {other}"),
                        }
                    }
                })
            };

            tokio::time::timeout(Duration::from_secs(2), stopper)
                .await
                .expect("shutdown never observed a running app")
                .unwrap();
            runner.await.unwrap().unwrap();
            assert_eq!(app.state(), AppState::Shutdown);
        }
    }

    #[tokio::test]
    async fn test_run_until_with_completed_signal() {
        let app = until_canceled();

        app.run_until(std::future::ready(())).await.unwrap();

        assert_eq!(app.state(), AppState::Shutdown);
    }

    #[tokio::test]
    async fn test_run_until_returns_callback_failure() {
        let app = AppLifecycle::new(|_ctx| async { Err::<(), BoxError>("port in use".into()) });

        let err = app.run_until(std::future::pending()).await.unwrap_err();

        assert!(matches!(err, LifecycleError::Start(_)));
        assert_eq!(app.state(), AppState::New);
    }
}
