mod config;

use clap::{Parser, Subcommand};
use config::BridgeConfig;
use std::path::PathBuf;
use std::sync::Arc;
use toolbridge_core::BridgeError;
use toolbridge_gateway::{AuthConfig, GatewayServer, WorkerRunner};
use toolbridge_mcp::{Operation, OperationOutput, WorkerConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "toolbridge", about = "toolbridge: HTTP bridge for MCP stdio tool servers")]
struct Cli {
    /// Path to an optional TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Dotenv file merged into the environment before configuration is read
    #[arg(long, default_value = ".env")]
    env_file: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway
    Serve {
        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// List the worker's tools once and print them as JSON
    Tools,
    /// Call one tool once and print its result as JSON
    Call {
        /// Tool name
        name: String,
        /// Arguments as a JSON object
        #[arg(short, long)]
        arguments: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Before the subscriber, so RUST_LOG may come from the env file.
    let env_loaded = match dotenvy::from_path(&cli.env_file) {
        Ok(()) => true,
        Err(e) if e.not_found() => false,
        Err(e) => {
            return Err(anyhow::anyhow!(
                "Failed to load env file '{}': {e}",
                cli.env_file.display()
            ))
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .json()
        .init();

    if env_loaded {
        info!(path = %cli.env_file.display(), "Loaded env file");
    }

    let config = BridgeConfig::load(cli.config.as_deref(), std::env::current_dir()?).await?;
    let worker = Arc::new(config.worker);

    match cli.command {
        Commands::Serve { host, port } => {
            let host = host.unwrap_or(config.server.host);
            let port = port.unwrap_or(config.server.port);

            let auth = AuthConfig::new(config.server.api_keys);
            if auth.is_enabled() {
                info!(keys = auth.api_keys.len(), "API key auth enabled");
            }

            let app = GatewayServer::build_with_auth(
                Arc::new(WorkerRunner::new(worker.clone())),
                auth,
            );

            let addr = format!("{host}:{port}");
            let listener = tokio::net::TcpListener::bind(&addr)
                .await
                .map_err(|e| BridgeError::Gateway(format!("failed to bind {addr}: {e}")))?;
            info!(
                addr = %addr,
                worker = %worker.display_command(),
                cwd = %worker.working_dir.display(),
                "toolbridge gateway listening"
            );

            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await?;
            info!("toolbridge gateway stopped");
        }
        Commands::Tools => {
            let output = run_once(worker, Operation::ListCapabilities).await?;
            println!("{}", serde_json::to_string_pretty(&output.into_value())?);
        }
        Commands::Call { name, arguments } => {
            let arguments = match arguments {
                None => serde_json::Map::new(),
                Some(raw) => match serde_json::from_str::<serde_json::Value>(&raw)? {
                    serde_json::Value::Object(map) => map,
                    _ => anyhow::bail!("--arguments must be a JSON object"),
                },
            };
            let output = run_once(worker, Operation::invoke(name, arguments)).await?;
            println!("{}", serde_json::to_string_pretty(&output.into_value())?);
        }
    }

    Ok(())
}

async fn run_once(worker: Arc<WorkerConfig>, operation: Operation) -> anyhow::Result<OperationOutput> {
    toolbridge_mcp::run(worker, operation)
        .await
        .map_err(|failure| anyhow::anyhow!(failure))
}

/// Resolves on Ctrl-C; in-flight requests finish, and with them their worker teardown.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
