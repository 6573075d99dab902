//! # CLI Interface
//!
//! Defines the command-line argument structure for `lien-node` using
//! `clap` derive. Supports four subcommands: `run`, `init`, `status`,
//! and `version`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// LIEN Protocol lending node.
///
/// A single-operator deployment of the LIEN lending protocol. Hosts the
/// asset ledger, proposal engine, and loan engine in one process, serves
/// the REST API, and exposes Prometheus metrics.
#[derive(Parser, Debug)]
#[command(
    name = "lien-node",
    about = "LIEN Protocol lending node",
    version,
    propagate_version = true
)]
pub struct LienNodeCli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands for the LIEN node binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the lending node.
    Run(RunArgs),
    /// Initialize a new node — creates the data directory and generates
    /// a fresh operator keypair.
    Init(InitArgs),
    /// Query the status of a running node via its REST endpoint.
    Status(StatusArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Path to the node data directory where the operator key lives.
    ///
    /// Created by `lien-node init`; the node runs with an ephemeral
    /// operator key if the directory holds none.
    #[arg(long, short = 'd', env = "LIEN_DATA_DIR", default_value = "~/.lien")]
    pub data_dir: PathBuf,

    /// Port for the REST API.
    #[arg(
        long,
        env = "LIEN_RPC_PORT",
        default_value_t = lien_protocol::config::DEFAULT_RPC_PORT
    )]
    pub rpc_port: u16,

    /// Port for the Prometheus metrics endpoint.
    #[arg(
        long,
        env = "LIEN_METRICS_PORT",
        default_value_t = lien_protocol::config::DEFAULT_METRICS_PORT
    )]
    pub metrics_port: u16,

    /// Log output format: "pretty" or "json".
    #[arg(long, env = "LIEN_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,

    /// Hex-encoded Ed25519 operator private key.
    ///
    /// If not provided, the node reads the key from the data directory.
    /// **Never pass this flag in production** — use a key file or vault instead.
    #[arg(long, env = "LIEN_OPERATOR_KEY")]
    pub operator_key: Option<String>,
}

/// Arguments for the `init` subcommand.
#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Path to the data directory to initialize.
    #[arg(long, short = 'd', env = "LIEN_DATA_DIR", default_value = "~/.lien")]
    pub data_dir: PathBuf,

    /// Network to configure for: mainnet, testnet, or devnet.
    #[arg(long, default_value = "devnet")]
    pub network: String,
}

/// Arguments for the `status` subcommand.
#[derive(Parser, Debug)]
pub struct StatusArgs {
    /// REST endpoint of the running node.
    #[arg(long, default_value = "http://127.0.0.1:9850")]
    pub rpc_url: String,
}
