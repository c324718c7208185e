//! One-shot health probes for container runtimes.
//!
//! `--probe http` checks the local gateway's `/healthz`, `--probe grpc` calls
//! `grpc.health.v1.Health/Check`. The process exits 0 when the target is
//! serving and 1 otherwise.

use std::time::Duration;

use thiserror::Error;

use crate::channel::{ChannelConfig, create_channel_with_config};
use crate::health::{ServingStatus, check_health};

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeKind {
  Http,
  Grpc,
}

impl ProbeKind {
  /// Case-insensitive; anything else means "run the server".
  pub fn parse(value: &str) -> Option<Self> {
    match value.to_ascii_lowercase().as_str() {
      "http" => Some(ProbeKind::Http),
      "grpc" => Some(ProbeKind::Grpc),
      _ => None,
    }
  }
}

#[derive(Debug, Error)]
pub enum ProbeError {
  #[error("http request failed: {0}")]
  Request(#[from] reqwest::Error),

  #[error("{0}")]
  Unhealthy(String),

  #[error("grpc check failed: {0}")]
  Grpc(#[from] crate::GrpcError),
}

/// Runs one probe against the loopback listeners on `grpc_port` and
/// `gateway_port`.
pub async fn run_probe(kind: ProbeKind, grpc_port: u16, gateway_port: u16) -> Result<String, ProbeError> {
  match kind {
    ProbeKind::Http => http_probe(gateway_port).await,
    ProbeKind::Grpc => grpc_probe(grpc_port).await,
  }
}

async fn http_probe(port: u16) -> Result<String, ProbeError> {
  let client = reqwest::Client::builder().timeout(PROBE_TIMEOUT).build()?;
  let response = client
    .get(format!("http://127.0.0.1:{}/healthz", port))
    .send()
    .await?;

  let status = response.status();
  let body = response.text().await?;
  if !status.is_success() {
    return Err(ProbeError::Unhealthy(body));
  }
  Ok(body)
}

async fn grpc_probe(port: u16) -> Result<String, ProbeError> {
  let config = ChannelConfig::new()
    .with_connect_timeout(PROBE_TIMEOUT)
    .with_request_timeout(PROBE_TIMEOUT);
  let channel = create_channel_with_config(format!("http://127.0.0.1:{}", port), config).await?;

  let status = check_health(channel, "").await?;
  let body = serde_json::json!({ "status": status.as_str_name() }).to_string();
  if status != ServingStatus::Serving {
    return Err(ProbeError::Unhealthy(body));
  }
  Ok(body)
}

/// Prints the outcome unless muted and returns the process exit code.
pub fn report(result: &Result<String, ProbeError>, mute: bool) -> i32 {
  let timestamp = chrono::Utc::now().timestamp();

  match result {
    Ok(body) => {
      if !mute {
        println!("probe successful at {}: {}", timestamp, body.trim_end_matches('\n'));
      }
      0
    }
    Err(err) => {
      if !mute {
        eprintln!("probe failed at {}: {}", timestamp, err);
      }
      1
    }
  }
}
