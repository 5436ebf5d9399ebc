//! # CLI Interface
//!
//! Command-line argument structure for `novax-node` using `clap` derive.
//! Three subcommands: `run`, `status`, and `version`. Every flag has an
//! environment-variable fallback so the node can be configured entirely
//! from a container environment.

use clap::{Parser, Subcommand};

use novax_protocol::config::{DEFAULT_API_PORT, DEFAULT_METRICS_PORT};

/// Novax devnet node.
///
/// Hosts the five protocol contracts on an in-process chain, exposes the
/// contract gateway over a REST API, and serves Prometheus metrics. The
/// deployed network remains the source of truth; this node is the
/// deployable stand-in for development and integration testing.
#[derive(Parser, Debug)]
#[command(
    name = "novax-node",
    about = "Novax devnet node",
    version,
    propagate_version = true
)]
pub struct NovaxNodeCli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands for the node binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the node.
    Run(RunArgs),
    /// Query the status of a running node via its REST endpoint.
    Status(StatusArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Port for the REST API.
    #[arg(long, env = "NOVAX_API_PORT", default_value_t = DEFAULT_API_PORT)]
    pub api_port: u16,

    /// Port for the Prometheus metrics endpoint.
    #[arg(long, env = "NOVAX_METRICS_PORT", default_value_t = DEFAULT_METRICS_PORT)]
    pub metrics_port: u16,

    /// Address of the asset management company account.
    ///
    /// This account verifies receivables, opens pools, and records
    /// repayments. On the devnet chain it is also the NVX issuer.
    #[arg(long, env = "NOVAX_AMC_ADDRESS", default_value = "0xa11c0000000000000000000000000000000amc01")]
    pub amc_address: String,

    /// Log output format: "pretty" or "json".
    #[arg(long, env = "NOVAX_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,
}

/// Arguments for the `status` subcommand.
#[derive(Parser, Debug)]
pub struct StatusArgs {
    /// REST endpoint of the running node.
    #[arg(long, default_value = "http://127.0.0.1:8480")]
    pub api_url: String,
}
