//! Strata CLI - Secure access to database branches

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use strata_cli::commands::connect::{self, ConnectArgs};
use strata_cli::output;

/// Strata CLI - Connect to database branches over secure tunnels
#[derive(Parser, Debug)]
#[command(name = "strata")]
#[command(about = "Connect to Strata database branches over secure tunnels", long_about = None)]
#[command(version = env!("GIT_TAG"))]
#[command(long_version = concat!(env!("GIT_TAG"), "\nCommit: ", env!("GIT_HASH"), "\nBuilt: ", env!("BUILD_TIME")))]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a secure connection to a database branch
    Connect {
        /// Database to connect to
        database: String,

        /// Branch to connect to; auto-selected or prompted for when omitted
        branch: Option<String>,

        /// Organization the database belongs to
        #[arg(long, env = "STRATA_ORG")]
        org: Option<String>,

        /// Local address the tunnel listens on
        #[arg(long, default_value = "127.0.0.1:0")]
        local_addr: String,

        /// Remote database address; resolved automatically when omitted
        #[arg(long)]
        remote_addr: Option<String>,

        /// Enable verbose tunnel logging
        #[arg(long)]
        debug: bool,
    },
}

#[tokio::main]
async fn main() {
    rustls::crypto::CryptoProvider::install_default(rustls::crypto::ring::default_provider())
        .unwrap();

    let cli = Cli::parse();

    let Commands::Connect { debug, .. } = &cli.command;
    let debug = *debug;

    if let Err(e) = init_logging(&cli.log_level, debug) {
        output::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }

    let result = match cli.command {
        Commands::Connect {
            database,
            branch,
            org,
            local_addr,
            remote_addr,
            debug,
        } => {
            connect::run(ConnectArgs {
                database,
                branch,
                org,
                local_addr,
                remote_addr,
                debug,
            })
            .await
        }
    };

    if let Err(e) = result {
        output::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

fn init_logging(log_level: &str, debug: bool) -> Result<()> {
    // --debug opens up the tunnel and API internals without drowning the
    // terminal in dependencies' output
    let default_filter = if debug {
        format!("{},strata_proxy=debug,strata_api=debug", log_level)
    } else {
        log_level.to_string()
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(&default_filter))
        .context("Failed to initialize logging filter")?;

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    Ok(())
}
