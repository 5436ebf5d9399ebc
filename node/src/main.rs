// Copyright (c) 2026 TrustBridge Labs. MIT License.
// See LICENSE for details.

//! # Novax Node
//!
//! Binary entry point. `run` starts the devnet chain with the five
//! protocol contracts, wires the contract gateway to it, and serves the
//! REST API and Prometheus metrics until SIGINT/SIGTERM. `status` probes
//! a running node and prints its `/status` response. `version` prints
//! build information.

mod api;
mod cli;
mod logging;
mod metrics;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use novax_contracts::chain::LocalChain;
use novax_protocol::chain::ChainProvider;
use novax_protocol::gateway::{AddressBook, ContractService};

use crate::api::{create_router, AppState};
use crate::cli::{Commands, NovaxNodeCli, RunArgs, StatusArgs};
use crate::logging::{init_logging, LogFormat};
use crate::metrics::{metrics_handler, MeteredProvider, NodeMetrics, SharedMetrics};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = NovaxNodeCli::parse();
    match cli.command {
        Commands::Run(args) => run_node(args).await,
        Commands::Status(args) => query_status(args).await,
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

async fn run_node(args: RunArgs) -> anyhow::Result<()> {
    init_logging("info", LogFormat::from_str_lossy(&args.log_format));

    let addresses = AddressBook::devnet();
    let chain = Arc::new(LocalChain::new(addresses.clone(), args.amc_address.clone()));
    let node_metrics: SharedMetrics = Arc::new(NodeMetrics::new());
    let provider: Arc<dyn ChainProvider> =
        Arc::new(MeteredProvider::new(chain.clone(), node_metrics.clone()));

    let service = Arc::new(ContractService::new(addresses));
    service.initialize(provider, args.amc_address.as_str()).await;

    tracing::info!(
        amc = %args.amc_address,
        api_port = args.api_port,
        metrics_port = args.metrics_port,
        "starting novax-node"
    );

    let state = AppState {
        service,
        chain,
        metrics: node_metrics.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };
    let api_router = create_router(state);
    let metrics_router = axum::Router::new()
        .route("/metrics", axum::routing::get(metrics_handler))
        .with_state(node_metrics);

    let api_listener = TcpListener::bind(("0.0.0.0", args.api_port))
        .await
        .with_context(|| format!("failed to bind api port {}", args.api_port))?;
    let metrics_listener = TcpListener::bind(("0.0.0.0", args.metrics_port))
        .await
        .with_context(|| format!("failed to bind metrics port {}", args.metrics_port))?;

    tracing::info!("api listening on {}", api_listener.local_addr()?);
    tracing::info!("metrics listening on {}", metrics_listener.local_addr()?);

    tokio::select! {
        result = axum::serve(api_listener, api_router) => {
            result.context("api server exited")?;
        }
        result = axum::serve(metrics_listener, metrics_router) => {
            result.context("metrics server exited")?;
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received, stopping");
        }
    }

    Ok(())
}

/// Resolves on SIGINT or, on unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install sigterm handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

async fn query_status(args: StatusArgs) -> anyhow::Result<()> {
    let endpoint = format!("{}/status", args.api_url.trim_end_matches('/'));
    let body = http_get(&endpoint)
        .await
        .with_context(|| format!("failed to reach {endpoint}"))?;
    let status: serde_json::Value =
        serde_json::from_str(&body).context("node returned malformed status")?;

    println!("novax-node status");
    println!("  network:      {}", field(&status, "network"));
    println!("  chain id:     {}", field(&status, "chain_id"));
    println!("  block height: {}", status["block_height"]);
    println!("  version:      {}", field(&status, "version"));
    Ok(())
}

fn field<'a>(value: &'a serde_json::Value, key: &str) -> &'a str {
    value[key].as_str().unwrap_or("unknown")
}

/// Minimal HTTP/1.1 GET over a raw socket. Keeps the binary free of an
/// HTTP client dependency for a single localhost probe.
async fn http_get(url: &str) -> anyhow::Result<String> {
    let parsed = url::parse(url)?;
    let mut stream = TcpStream::connect((parsed.host.as_str(), parsed.port)).await?;
    let request = format!(
        "GET {} HTTP/1.1\r\nHost: {}\r\nAccept: application/json\r\nConnection: close\r\n\r\n",
        parsed.path, parsed.host
    );
    stream.write_all(request.as_bytes()).await?;

    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await?;
    let text = String::from_utf8(raw).context("response was not utf-8")?;
    let (_, body) = text
        .split_once("\r\n\r\n")
        .context("malformed http response")?;
    Ok(body.trim().to_string())
}

/// Just enough URL parsing for `http://host[:port][/path]`.
mod url {
    use anyhow::Context;

    pub struct Parsed {
        pub host: String,
        pub port: u16,
        pub path: String,
    }

    pub fn parse(url: &str) -> anyhow::Result<Parsed> {
        let rest = url
            .strip_prefix("http://")
            .context("only http:// urls are supported")?;
        let (authority, path) = match rest.find('/') {
            Some(i) => (&rest[..i], rest[i..].to_string()),
            None => (rest, "/".to_string()),
        };
        let (host, port) = match authority.split_once(':') {
            Some((host, port)) => (host.to_string(), port.parse().context("invalid port")?),
            None => (authority.to_string(), 80),
        };
        Ok(Parsed { host, port, path })
    }
}

fn print_version() {
    println!("novax-node {}", env!("CARGO_PKG_VERSION"));
    println!("protocol crate: novax-protocol {}", env!("CARGO_PKG_VERSION"));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_parsing_handles_port_and_path() {
        let parsed = url::parse("http://127.0.0.1:8480/status").unwrap();
        assert_eq!(parsed.host, "127.0.0.1");
        assert_eq!(parsed.port, 8480);
        assert_eq!(parsed.path, "/status");
    }

    #[test]
    fn url_parsing_defaults() {
        let parsed = url::parse("http://localhost").unwrap();
        assert_eq!(parsed.port, 80);
        assert_eq!(parsed.path, "/");

        assert!(url::parse("https://localhost").is_err());
    }
}
