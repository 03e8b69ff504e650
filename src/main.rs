use anyhow::Result;
use clap::{Parser, Subcommand};
use meshd::{
    config::{ConfigOverrides, MeshdConfig},
    events::EventBroadcaster,
    ingest,
    install::RuntimeInstaller,
    rest,
    state_service::StateServiceClient,
    topology::reconciler::Reconciler,
    transport, AppContext,
};
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(
    name = "meshd",
    about = "Meshd — live runtime-mesh topology daemon",
    version
)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Event broker WebSocket URL
    #[arg(long, env = "MESHD_BROKER_URL")]
    broker_url: Option<String>,

    /// Root announcement channel; per-runtime channels live under it
    #[arg(long, env = "MESHD_TOPIC_PREFIX")]
    topic_prefix: Option<String>,

    /// State-snapshot service base URL
    #[arg(long, env = "MESHD_STATE_URL")]
    state_url: Option<String>,

    /// REST API port
    #[arg(long, env = "MESHD_PORT")]
    port: Option<u16>,

    /// Bind address for the REST server (default: 127.0.0.1; use 0.0.0.0 for LAN access)
    #[arg(long, env = "MESHD_BIND")]
    bind_address: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "MESHD_LOG")]
    log: Option<String>,

    /// Write logs to this file path (rotated daily). Optional.
    #[arg(long, env = "MESHD_LOG_FILE")]
    log_file: Option<std::path::PathBuf>,

    /// Log format: pretty (default) or json
    #[arg(long, env = "MESHD_LOG_FORMAT")]
    log_format: Option<String>,

    /// Path to meshd.toml
    #[arg(long, env = "MESHD_CONFIG")]
    config: Option<std::path::PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Start the daemon (default when no subcommand given).
    ///
    /// Runs meshd in the foreground: connects to the broker, replays the
    /// remote snapshot, then serves the REST API and the live diff stream.
    ///
    /// Examples:
    ///   meshd serve
    ///   meshd
    Serve,
    /// Fetch the remote state snapshot and print it as JSON.
    ///
    /// Examples:
    ///   meshd snapshot
    ///   meshd snapshot --state-url http://state-host:5000
    Snapshot,
    /// Clear the remote state-snapshot store.
    ///
    /// A running daemon is reset separately via DELETE /api/v1/topology,
    /// which clears the remote store and the local model together.
    ///
    /// Examples:
    ///   meshd reset --yes
    Reset {
        /// Skip confirmation
        #[arg(long, short = 'y')]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = MeshdConfig::new(
        ConfigOverrides {
            broker_url: args.broker_url,
            topic_prefix: args.topic_prefix,
            state_url: args.state_url,
            port: args.port,
            bind_address: args.bind_address,
            log_level: args.log,
            log_format: args.log_format,
            log_file: args.log_file,
        },
        args.config.as_deref(),
    );

    let _guard = setup_logging(
        &config.log_level,
        config.log_file.as_deref(),
        &config.log_format,
    );

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => run_serve(config).await,
        Command::Snapshot => {
            let client = StateServiceClient::new(&config.state_url);
            let records = client.fetch_all().await?;
            println!("{}", serde_json::to_string_pretty(&records)?);
            Ok(())
        }
        Command::Reset { yes } => {
            if !yes {
                anyhow::bail!("this clears the remote state store — pass --yes to confirm");
            }
            let client = StateServiceClient::new(&config.state_url);
            client.delete_all().await?;
            println!("remote state store cleared");
            Ok(())
        }
    }
}

// ── Serve ─────────────────────────────────────────────────────────────────────

async fn run_serve(config: MeshdConfig) -> Result<()> {
    info!(version = env!("CARGO_PKG_VERSION"), "meshd starting");
    let config = Arc::new(config);

    let (event_tx, event_rx) = tokio::sync::mpsc::channel(256);
    let transport = transport::ws::spawn(config.clone(), event_tx);

    let ctx = Arc::new(AppContext {
        config: config.clone(),
        topology: Arc::new(tokio::sync::Mutex::new(Reconciler::new())),
        broadcaster: Arc::new(EventBroadcaster::new()),
        transport,
        state: Arc::new(StateServiceClient::new(&config.state_url)),
        installer: Arc::new(RuntimeInstaller::new()),
        started_at: std::time::Instant::now(),
    });

    tokio::spawn(ingest::run(ctx.clone(), event_rx));

    rest::start_rest_server(ctx).await
}

// ── Logging setup ─────────────────────────────────────────────────────────────

/// Initialise tracing with optional file output.
///
/// Returns a `WorkerGuard` that must stay alive for the process lifetime.
///
/// `log_format` may be `"pretty"` (default, human-readable compact format) or
/// `"json"` (structured JSON for log aggregators).
///
/// If the log directory cannot be created, falls back to stdout-only logging
/// with a warning — never panics.
fn setup_logging(
    log_level: &str,
    log_file: Option<&std::path::Path>,
    log_format: &str,
) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let use_json = log_format == "json";

    if let Some(path) = log_file {
        let dir = path.parent().unwrap_or_else(|| std::path::Path::new("."));
        let filename = path
            .file_name()
            .unwrap_or_else(|| std::ffi::OsStr::new("meshd.log"));

        // Ensure the directory exists before tracing-appender tries to open it.
        if let Err(e) = std::fs::create_dir_all(dir) {
            // Fall back to stdout-only — don't panic on a bad log path.
            eprintln!(
                "warn: could not create log directory '{}': {e} — falling back to stdout",
                dir.display()
            );
            if use_json {
                tracing_subscriber::fmt()
                    .json()
                    .with_env_filter(log_level)
                    .init();
            } else {
                tracing_subscriber::fmt()
                    .with_env_filter(log_level)
                    .compact()
                    .init();
            }
            return None;
        }

        let appender = tracing_appender::rolling::daily(dir, filename);
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);

        if use_json {
            tracing_subscriber::registry()
                .with(EnvFilter::new(log_level))
                .with(fmt::layer().json())
                .with(fmt::layer().json().with_writer(non_blocking))
                .init();
        } else {
            tracing_subscriber::registry()
                .with(EnvFilter::new(log_level))
                .with(fmt::layer().compact())
                .with(fmt::layer().with_writer(non_blocking))
                .init();
        }

        Some(guard)
    } else if use_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(log_level)
            .init();
        None
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(log_level)
            .compact()
            .init();
        None
    }
}
