//! Vector Store Server - Entry Point
//!
//! Either runs a one-shot health probe or starts the server.

use clap::Parser;
use core_config::server::ServerConfig;
use core_config::tracing::install_color_eyre;
use eyre::{Result, WrapErr};
use grpc_client::probe::{ProbeKind, report, run_probe};
use vectorstore_server::config::{SERVER_ENV_PREFIX, server_defaults};

#[derive(Parser)]
#[command(name = "vectorstore-server")]
#[command(about = "Text embedding index with a gRPC endpoint and HTTP gateway")]
struct Cli {
    /// Probe type (http or grpc); other values skip the probe and run the server
    #[arg(long, default_value = "")]
    probe: String,

    /// Mute probe output
    #[arg(long)]
    mute: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    install_color_eyre();

    let cli = Cli::parse();

    if let Some(kind) = ProbeKind::parse(&cli.probe) {
        let server = ServerConfig::from_env_with_defaults(SERVER_ENV_PREFIX, server_defaults())
            .wrap_err("Failed to load server configuration")?;
        let result = run_probe(kind, server.grpc_port, server.gateway_port).await;
        std::process::exit(report(&result, cli.mute));
    }

    vectorstore_server::run().await
}
