//! Auditor Gate - authenticated request gate for the SEO auditor backend.

use std::env;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use tokio::signal;
use tokio::sync::Notify;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use auditor_gate::auth::{InMemoryNonceStore, RequestAuthenticator};
use auditor_gate::config::Settings;
use auditor_gate::socket::SocketListener;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const NAME: &str = env!("CARGO_PKG_NAME");
const DEFAULT_CONFIG_PATH: &str = "/etc/auditor-gate/daemon.toml";
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return ExitCode::SUCCESS;
    }

    if args.iter().any(|a| a == "--version" || a == "-V") {
        println!("{} {}", NAME, VERSION);
        return ExitCode::SUCCESS;
    }

    let config_path = get_config_path(&args);

    let settings = match Settings::load(&config_path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error loading configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    init_logging(&settings);

    info!("Starting {} v{}", NAME, VERSION);
    info!("Configuration loaded from: {}", config_path);
    info!("Socket path: {}", settings.socket.path.display());
    info!("Nonce TTL: {}s", settings.security.nonce_ttl_seconds);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "Failed to create Tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(async_main(settings)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Gate failed");
            ExitCode::FAILURE
        }
    }
}

async fn async_main(settings: Settings) -> Result<(), Box<dyn std::error::Error>> {
    let settings = Arc::new(settings);

    let authenticator = Arc::new(RequestAuthenticator::new(
        settings.security.secret_provider(),
        Arc::new(InMemoryNonceStore::new()),
        settings.security.nonce_ttl_seconds,
    ));

    // The secret is re-read per request, so a missing one is not fatal here.
    match authenticator.check_secret() {
        Ok(()) => info!(key_id = authenticator.key_id(), "Signing secret available"),
        Err(e) => warn!(
            key_id = authenticator.key_id(),
            error = %e,
            "Signing secret not available; handshakes will fail until it is configured"
        ),
    }

    let listener = SocketListener::bind(Arc::clone(&settings), authenticator).await?;

    let shutdown = Arc::new(Notify::new());

    tokio::select! {
        result = listener.run(Arc::clone(&shutdown)) => {
            if let Err(e) = result {
                error!(error = %e, "Socket listener failed");
                return Err(e.into());
            }
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received, initiating graceful shutdown...");
            shutdown.notify_waiters();

            match tokio::time::timeout(DRAIN_TIMEOUT, listener.wait_for_drain()).await {
                Ok(()) => info!("Graceful shutdown complete"),
                Err(_) => warn!(
                    "Shutdown timeout after {}s, some connections may be terminated",
                    DRAIN_TIMEOUT.as_secs()
                ),
            }
        }
    }

    let metrics = listener.metrics();
    info!(
        connections = metrics.total(),
        failed = metrics.failed(),
        "Connection totals"
    );

    if let Err(e) = std::fs::remove_file(&settings.socket.path) {
        warn!(error = %e, "Failed to remove socket file");
    }

    info!("Gate stopped");
    Ok(())
}

/// Wait for SIGTERM or SIGINT.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

fn print_help() {
    println!(
        r#"{} {}
Authenticated request gate for the SEO auditor backend.

USAGE:
    {} [OPTIONS]

OPTIONS:
    -c, --config <PATH>    Path to configuration file
                           [default: {}]
    -h, --help             Print help information
    -V, --version          Print version information

ENVIRONMENT:
    SEO_AUDITOR_HMAC_SECRET    Hex-encoded signing secret (at least 32 bytes)
    RUST_LOG                   Overrides the configured log filter
"#,
        NAME, VERSION, NAME, DEFAULT_CONFIG_PATH
    );
}

fn get_config_path(args: &[String]) -> String {
    for (i, arg) in args.iter().enumerate() {
        if (arg == "--config" || arg == "-c") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
        if let Some(path) = arg.strip_prefix("--config=") {
            return path.to_string();
        }
    }
    DEFAULT_CONFIG_PATH.to_string()
}

fn init_logging(settings: &Settings) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.logging.level));

    match settings.logging.format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().pretty())
                .init();
        }
    }
}
