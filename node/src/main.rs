// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # LIEN Lending Node
//!
//! Entry point for the `lien-node` binary. Parses CLI arguments, initializes
//! logging and metrics, bootstraps the lending desk, and serves the REST API.
//!
//! The binary supports four subcommands:
//!
//! - `run`     — start the lending node
//! - `init`    — initialize data directory and generate the operator key
//! - `status`  — query a running node's status endpoint
//! - `version` — print build version information

mod api;
mod cli;
mod logging;
mod metrics;

use anyhow::{bail, Context, Result};
use clap::Parser;
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::signal;

use lien_protocol::crypto::LienKeypair;
use lien_protocol::identity::Address;

use cli::{Commands, LienNodeCli};
use logging::LogFormat;
use metrics::NodeMetrics;

/// How often the background sampler re-derives the loan gauges. Handlers
/// refresh them after every mutation; the sampler catches clock-driven
/// defaults that happen without traffic.
const GAUGE_SAMPLE_SECS: u64 = 15;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = LienNodeCli::parse();

    match cli.command {
        Commands::Run(args) => run_node(args).await,
        Commands::Init(args) => init_node(args),
        Commands::Status(args) => query_status(args).await,
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Starts the full lending node: desk bootstrap, REST API server, and
/// metrics endpoint.
async fn run_node(args: cli::RunArgs) -> Result<()> {
    logging::init_logging(
        "lien_node=info,lien_protocol=info,tower_http=debug",
        LogFormat::from_str_lossy(&args.log_format),
    );

    tracing::info!(
        rpc_port = args.rpc_port,
        metrics_port = args.metrics_port,
        data_dir = %args.data_dir.display(),
        "starting lien-node"
    );

    // --- Operator identity ---
    let keypair = resolve_operator_key(&args)?;
    let operator = Address::from_public_key(&keypair.public_key());
    tracing::info!(operator = %operator.to_bech32(), "operator identity loaded");

    // --- Metrics ---
    let node_metrics = Arc::new(NodeMetrics::new());

    // --- Desk bootstrap ---
    let desk = api::bootstrap(operator).context("failed to bootstrap the lending desk")?;
    let desk = Arc::new(RwLock::new(desk));

    // --- Application state ---
    let app_state = api::AppState {
        version: format!(
            "{} (protocol {})",
            env!("CARGO_PKG_VERSION"),
            lien_protocol::config::PROTOCOL_VERSION,
        ),
        network: "devnet".to_string(),
        desk: Arc::clone(&desk),
        metrics: Arc::clone(&node_metrics),
    };

    // --- API server ---
    let api_router = api::create_router(app_state.clone());
    let api_addr = format!("0.0.0.0:{}", args.rpc_port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("failed to bind RPC listener on {}", api_addr))?;
    tracing::info!("REST API server listening on {}", api_addr);

    // --- Metrics server ---
    let metrics_router = axum::Router::new()
        .route("/metrics", axum::routing::get(metrics::metrics_handler))
        .with_state(Arc::clone(&node_metrics));
    let metrics_addr = format!("0.0.0.0:{}", args.metrics_port);
    let metrics_listener = tokio::net::TcpListener::bind(&metrics_addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {}", metrics_addr))?;
    tracing::info!("Metrics server listening on {}", metrics_addr);

    // --- Gauge sampler ---
    let desk_ref = Arc::clone(&desk);
    let metrics_ref = Arc::clone(&node_metrics);
    let sampler = tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(std::time::Duration::from_secs(GAUGE_SAMPLE_SECS));
        loop {
            interval.tick().await;
            {
                let desk = desk_ref.read();
                api::refresh_gauges(&desk.engine, &metrics_ref);
            }
            tracing::debug!("loan gauges sampled");
        }
    });

    // --- Serve ---
    tokio::select! {
        res = axum::serve(api_listener, api_router) => {
            if let Err(e) = res {
                tracing::error!("API server error: {}", e);
            }
        }
        res = axum::serve(metrics_listener, metrics_router) => {
            if let Err(e) = res {
                tracing::error!("Metrics server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received, draining connections");
        }
    }

    sampler.abort();
    tracing::info!("lien-node stopped");
    Ok(())
}

/// Resolves the operator keypair: the CLI flag wins, then the key file in
/// the data directory, then an ephemeral key with a warning.
fn resolve_operator_key(args: &cli::RunArgs) -> Result<LienKeypair> {
    if let Some(hex_key) = &args.operator_key {
        return LienKeypair::from_hex(hex_key).context("invalid --operator-key");
    }

    let key_path = args.data_dir.join("operator.key");
    if key_path.exists() {
        let hex_key = std::fs::read_to_string(&key_path)
            .with_context(|| format!("failed to read {}", key_path.display()))?;
        return LienKeypair::from_hex(hex_key.trim())
            .with_context(|| format!("invalid operator key in {}", key_path.display()));
    }

    tracing::warn!(
        "no operator key at {}; running with an ephemeral key (use `lien-node init` to create one)",
        key_path.display()
    );
    Ok(LienKeypair::generate())
}

/// Files written by `init`.
#[derive(Debug)]
struct InitOutput {
    key_path: PathBuf,
    genesis_path: PathBuf,
    public_key_hex: String,
    operator: Address,
}

/// Creates the data directory, generates the operator keypair, and writes
/// the genesis record. Refuses to touch an already-initialized directory.
fn initialize_data_dir(data_dir: &Path, network: &str) -> Result<InitOutput> {
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("failed to create data directory: {}", data_dir.display()))?;

    let key_path = data_dir.join("operator.key");
    if key_path.exists() {
        bail!(
            "refusing to overwrite existing operator key at {}",
            key_path.display()
        );
    }

    // Generate the operator keypair.
    let keypair = LienKeypair::generate();
    let public_key_hex = keypair.public_key_hex();
    let operator = Address::from_public_key(&keypair.public_key());

    // Write the secret key to a file inside the data directory.
    let secret_bytes = keypair.secret_key_bytes();
    std::fs::write(&key_path, hex::encode(secret_bytes))
        .with_context(|| format!("failed to write operator key to {}", key_path.display()))?;

    // Restrict permissions on Unix.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&key_path, std::fs::Permissions::from_mode(0o600))?;
    }

    // Write the genesis record.
    let genesis_path = data_dir.join("genesis.json");
    let genesis = serde_json::json!({
        "network": network,
        "operator": operator,
        "public_key": public_key_hex,
        "protocol_version": lien_protocol::config::PROTOCOL_VERSION,
        "created_at": chrono::Utc::now().to_rfc3339(),
    });
    std::fs::write(&genesis_path, serde_json::to_string_pretty(&genesis)?)
        .with_context(|| format!("failed to write genesis record to {}", genesis_path.display()))?;

    Ok(InitOutput {
        key_path,
        genesis_path,
        public_key_hex,
        operator,
    })
}

/// Initializes a new node data directory and generates an operator keypair.
fn init_node(args: cli::InitArgs) -> Result<()> {
    logging::init_logging("lien_node=info", LogFormat::Pretty);

    let data_dir = &args.data_dir;
    tracing::info!(data_dir = %data_dir.display(), network = %args.network, "initializing node");

    let out = initialize_data_dir(data_dir, &args.network)?;

    tracing::info!(
        operator = %out.operator.to_bech32(),
        key_path = %out.key_path.display(),
        "operator keypair generated"
    );

    println!("Node initialized successfully.");
    println!("  Data directory : {}", data_dir.display());
    println!("  Network        : {}", args.network);
    println!("  Operator key   : {}", out.key_path.display());
    println!("  Genesis record : {}", out.genesis_path.display());
    println!("  Public key     : {}", out.public_key_hex);
    println!("  Operator       : {}", out.operator.to_bech32());

    Ok(())
}

/// Queries a running node's status endpoint and prints the result.
async fn query_status(args: cli::StatusArgs) -> Result<()> {
    let url = format!("{}/status", args.rpc_url.trim_end_matches('/'));
    let body: String = http_get(&url).await?;
    println!("{}", body);
    Ok(())
}

/// Minimal HTTP GET without pulling in an HTTP client dependency.
/// In a real deployment, swap this for a proper HTTP client.
async fn http_get(url: &str) -> Result<String> {
    // Tokio's TCP stream plus raw HTTP/1.1 is enough for one status call.
    let parsed: url::Url = url
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid URL: {}", e))?;

    let host = parsed
        .host_str()
        .ok_or_else(|| anyhow::anyhow!("missing host in URL"))?;
    let port = parsed.port().unwrap_or(80);
    let path = parsed.path();

    let addr = format!("{}:{}", host, port);
    let mut stream = tokio::net::TcpStream::connect(&addr)
        .await
        .with_context(|| format!("failed to connect to {}", addr))?;

    let request = format!(
        "GET {} HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n\r\n",
        path, host,
    );

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    stream.write_all(request.as_bytes()).await?;
    stream.shutdown().await?;

    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).await?;
    let response = String::from_utf8_lossy(&buf);

    // Strip HTTP headers — everything after the first blank line is the body.
    let body = response
        .split_once("\r\n\r\n")
        .map(|(_, b)| b.to_string())
        .unwrap_or_else(|| response.to_string());

    Ok(body)
}

/// Prints version information to stdout.
fn print_version() {
    println!("lien-node {}", env!("CARGO_PKG_VERSION"));
    println!("protocol  {}", lien_protocol::config::PROTOCOL_VERSION);
    println!("rustc     {}", rustc_version());
}

/// Returns the Rust compiler version used to build this binary.
fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

/// Minimal URL parser — just enough to extract host/port/path.
/// Avoids pulling in the `url` crate for a single use.
mod url {
    pub struct Url {
        host: String,
        port: Option<u16>,
        path: String,
    }

    impl Url {
        pub fn host_str(&self) -> Option<&str> {
            Some(&self.host)
        }

        pub fn port(&self) -> Option<u16> {
            self.port
        }

        pub fn path(&self) -> &str {
            &self.path
        }
    }

    impl std::str::FromStr for Url {
        type Err = String;

        fn from_str(s: &str) -> Result<Self, Self::Err> {
            // Strip scheme.
            let rest = s
                .strip_prefix("http://")
                .or_else(|| s.strip_prefix("https://"))
                .unwrap_or(s);

            let (authority, path) = match rest.find('/') {
                Some(i) => (&rest[..i], &rest[i..]),
                None => (rest, "/"),
            };

            let (host, port) = match authority.rfind(':') {
                Some(i) => {
                    let p = authority[i + 1..]
                        .parse::<u16>()
                        .map_err(|e| format!("bad port: {}", e))?;
                    (authority[..i].to_string(), Some(p))
                }
                None => (authority.to_string(), None),
            };

            Ok(Url {
                host,
                port,
                path: path.to_string(),
            })
        }
    }
}
