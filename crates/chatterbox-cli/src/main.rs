//! chatterbox — developer CLI for the ChatterBox relay.
//!
//! Mints credentials and talks to a running relay from the terminal.

mod commands;
mod config;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::error;

/// chatterbox — ChatterBox relay client
#[derive(Parser)]
#[command(name = "chatterbox", version, about = "ChatterBox relay client")]
struct Cli {
    /// Relay base URL (overrides the config file)
    #[arg(short, long, global = true)]
    server: Option<String>,

    /// Config file path
    #[arg(long = "config", global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print a signed credential for a user id
    Token {
        /// User id to put in the credential
        subject: String,

        /// Display name claim
        #[arg(long)]
        username: Option<String>,

        /// Lifetime in seconds
        #[arg(long, default_value_t = 3600)]
        ttl: u64,

        /// Signing secret (overrides CHATTERBOX_SECRET and the config file)
        #[arg(long)]
        secret: Option<String>,
    },

    /// Open an interactive session
    Connect {
        /// Bearer credential
        credential: String,
    },

    /// Send one direct message and exit
    Send {
        /// Bearer credential
        credential: String,
        /// Recipient user id
        recipient: String,
        /// Message text
        #[arg(trailing_var_arg = true, required = true)]
        text: Vec<String>,
    },
}

/// Log directives for this binary and the crates it drives.
fn log_filter(verbose: bool) -> &'static str {
    if verbose {
        "chatterbox=debug,chatterbox_client=debug,chatterbox_core=debug"
    } else {
        "chatterbox=warn,chatterbox_client=warn"
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter(log_filter(true))
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(log_filter(false))
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }

    let config_path = cli.config.clone().unwrap_or_else(config::default_path);
    let cfg = match config::Config::load(&config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("chatterbox: {e:#}");
            std::process::exit(1);
        }
    };
    let server = cli.server.clone().unwrap_or_else(|| cfg.default.server.clone());

    let result = match cli.command {
        Command::Token {
            subject,
            username,
            ttl,
            secret,
        } => cfg
            .resolve_secret(secret.as_deref())
            .and_then(|secret| commands::token::run(&secret, &subject, username.as_deref(), ttl)),
        Command::Connect { credential } => commands::connect::run(&server, &credential).await,
        Command::Send {
            credential,
            recipient,
            text,
        } => commands::send::run(&server, &credential, &recipient, &text.join(" ")).await,
    };

    if let Err(e) = result {
        error!("{:#}", e);
        eprintln!("chatterbox: {e:#}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_filter_names_real_targets() {
        for verbose in [true, false] {
            for directive in log_filter(verbose).split(',') {
                let target = directive.split('=').next().unwrap();
                assert!(
                    target == env!("CARGO_CRATE_NAME")
                        || matches!(target, "chatterbox_client" | "chatterbox_core"),
                    "unexpected target {target}"
                );
            }
        }
        let own = format!("{}=", env!("CARGO_CRATE_NAME"));
        assert!(log_filter(false).starts_with(&own));
        assert!(log_filter(true).starts_with(&own));
    }
}
