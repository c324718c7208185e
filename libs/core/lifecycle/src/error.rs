use std::error::Error as StdError;
use std::fmt;

use thiserror::Error;

use crate::context::CancelCause;

pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Failures of the dual-endpoint server.
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("failed to listen on {addr} for the {endpoint} server: {source}")]
    Bind {
        endpoint: &'static str,
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{endpoint} server error: {source}")]
    Serve {
        endpoint: &'static str,
        #[source]
        source: BoxError,
    },

    #[error("{endpoint} server shutdown timeout: {cause}")]
    ShutdownTimeout {
        endpoint: &'static str,
        cause: CancelCause,
    },

    #[error("{endpoint} server task panicked")]
    Panicked { endpoint: &'static str },

    #[error("gRPC client connection close error: {0}")]
    Bridge(#[source] BoxError),

    /// Every failure collected while stopping, in the order observed.
    #[error("{}", JoinedDisplay(.0))]
    Shutdown(Vec<SupervisorError>),
}

impl SupervisorError {
    /// Flattened view over nested [`SupervisorError::Shutdown`] lists.
    pub fn errors(&self) -> Vec<&SupervisorError> {
        match self {
            SupervisorError::Shutdown(all) => all.iter().flat_map(SupervisorError::errors).collect(),
            other => vec![other],
        }
    }

    /// Folds `other` into `self`, keeping a single flat joined error.
    pub fn join(self, other: SupervisorError) -> SupervisorError {
        let mut all = match self {
            SupervisorError::Shutdown(all) => all,
            single => vec![single],
        };
        match other {
            SupervisorError::Shutdown(more) => all.extend(more),
            single => all.push(single),
        }
        SupervisorError::Shutdown(all)
    }
}

struct JoinedDisplay<'a>(&'a [SupervisorError]);

impl fmt::Display for JoinedDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{err}")?;
        }
        Ok(())
    }
}

/// State machine contract violations and start failures.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("app is already started")]
    AlreadyStarted,

    #[error("app has been shut down, create a new instance to start again")]
    AlreadyShutdown,

    #[error("app is not running, call start() first")]
    NotRunning,

    #[error("app start is already in progress")]
    StartInProgress,

    #[error(transparent)]
    Canceled(#[from] CancelCause),

    #[error("failed to start application: {0}")]
    Start(#[source] BoxError),
}

/// True when `err`, or anything in its source chain, is a plain
/// [`CancelCause::Canceled`].
pub fn is_canceled(err: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(err) = current {
        if err.downcast_ref::<CancelCause>() == Some(&CancelCause::Canceled) {
            return true;
        }
        current = err.source();
    }
    false
}
