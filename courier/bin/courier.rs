//! Command-line front end for the courier delivery engine
//!
//! Messages are read from a RON file, sent through the configured provider
//! chain, and each outcome is printed as `id: outcome`.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use courier::{Courier, load_messages};
use courier_delivery::DeliveryQueryService;

/// Send messages through a reliable provider chain
#[derive(Parser, Debug)]
#[command(name = "courier")]
#[command(about = "Send messages through a reliable provider chain", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file, overriding the usual lookup
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Send every message in a RON file
    Send {
        /// RON list of `(id: .., recipient: .., subject: .., body: ..)`
        messages: PathBuf,

        /// Send the whole list this many extra times
        #[arg(long, default_value_t = 0)]
        repeat: u32,

        /// Print the recorded status of these ids once sending is done
        #[arg(long = "status", value_name = "ID")]
        status: Vec<String>,
    },
    /// Validate the configuration and print it with defaults filled in
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let courier = match cli.config {
        Some(path) => Courier::from_file(&path)?,
        None => match find_config_file()? {
            Some(path) => Courier::from_file(&path)?,
            None => Courier::default(),
        },
    };

    match cli.command {
        Commands::Send {
            messages,
            repeat,
            status,
        } => send(&courier, &messages, repeat, &status).await,
        Commands::Check => {
            courier.delivery.validate()?;
            println!("{}", courier.to_ron()?);
            Ok(())
        }
    }
}

async fn send(courier: &Courier, path: &Path, repeat: u32, ids: &[String]) -> anyhow::Result<()> {
    let messages = load_messages(path)?;
    let orchestrator = courier.init()?;

    let rounds = repeat.saturating_add(1);
    for dispatch in Courier::dispatch(&orchestrator, &messages, rounds).await {
        if rounds > 1 {
            println!("[{}] {}: {}", dispatch.round, dispatch.id, dispatch.outcome);
        } else {
            println!("{}: {}", dispatch.id, dispatch.outcome);
        }
    }

    let service: &dyn DeliveryQueryService = &orchestrator;
    for id in ids {
        println!("status {id}: {}", service.get_status(id));
    }

    Ok(())
}

/// Find the configuration file using the following precedence:
/// 1. `COURIER_CONFIG` environment variable
/// 2. ./courier.config.ron (current working directory)
/// 3. /etc/courier/courier.config.ron (system-wide config)
///
/// Returns `None` when no file exists, in which case defaults apply.
fn find_config_file() -> anyhow::Result<Option<PathBuf>> {
    if let Ok(env_path) = std::env::var("COURIER_CONFIG") {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Ok(Some(path));
        }
        anyhow::bail!(
            "COURIER_CONFIG points to non-existent file: {}",
            path.display()
        );
    }

    let default_paths = [
        PathBuf::from("./courier.config.ron"),
        PathBuf::from("/etc/courier/courier.config.ron"),
    ];

    Ok(default_paths.into_iter().find(|path| path.exists()))
}
