//! chatterbox-server binary.

use chatterbox_server::{ChatServer, Overrides, ServerConfig};
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info};

/// chatterbox-server — real-time chat relay
#[derive(Parser, Debug)]
#[command(name = "chatterbox-server", version, about = "ChatterBox real-time relay")]
struct Cli {
    /// Listen address
    #[arg(long)]
    host: Option<String>,

    /// Listen port
    #[arg(short, long)]
    port: Option<u16>,

    /// Config file path
    #[arg(long, default_value = "~/.chatterbox/server.toml")]
    config: String,

    /// Credential signing secret (overrides CHATTERBOX_SECRET and the file)
    #[arg(long)]
    secret: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    use tracing_subscriber::EnvFilter;
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    let config_path = PathBuf::from(&cli.config);
    let config = match ServerConfig::load(
        Some(&config_path),
        Overrides {
            host: cli.host,
            port: cli.port,
            secret: cli.secret,
        },
    ) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(error = %e, "failed to load config");
            std::process::exit(1);
        }
    };

    info!(
        version = env!("CARGO_PKG_VERSION"),
        addr = %config.bind_addr(),
        "starting chatterbox-server"
    );

    let server = ChatServer::new(config);
    let shutdown = server.shutdown_handle();

    // Connections close with "going away" once the signal arrives.
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("received shutdown signal");
        shutdown.shutdown();
    });

    if let Err(e) = server.run().await {
        error!(error = %e, "server error");
        std::process::exit(1);
    }

    info!("chatterbox-server stopped");
}

/// Wait for SIGTERM or SIGINT (Ctrl+C).
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                ctrl_c.await.ok();
            }
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
    }
}
