//! Sage Intacct source connector.
//!
//! Usage:
//!   intacct-connector spec
//!   intacct-connector check --config config.json
//!   intacct-connector discover --config config.json
//!   intacct-connector read --config config.json --catalog catalog.json [--state state.json]
//!
//! Messages are written to stdout as JSON lines; logs go to stderr.

use anyhow::Result;
use clap::{Parser, Subcommand};
use intacct_connector::{JsonLineSink, check, discover, load_json, read, spec};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "intacct-connector")]
#[command(about = "Sage Intacct incremental source")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Enable verbose debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the configuration schema
    Spec,
    /// Verify credentials and object access
    Check {
        #[arg(long)]
        config: PathBuf,
    },
    /// List streams with inferred schemas
    Discover {
        #[arg(long)]
        config: PathBuf,
    },
    /// Read records and emit state checkpoints
    Read {
        #[arg(long)]
        config: PathBuf,
        #[arg(long)]
        catalog: PathBuf,
        #[arg(long)]
        state: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    let mut sink = JsonLineSink::new(tokio::io::stdout());
    match args.command {
        Command::Spec => spec(&mut sink).await?,
        Command::Check { config } => check(load_json(&config).await?, &mut sink).await?,
        Command::Discover { config } => discover(load_json(&config).await?, &mut sink).await?,
        Command::Read {
            config,
            catalog,
            state,
        } => {
            let state = match state {
                Some(path) => Some(load_json(&path).await?),
                None => None,
            };
            let summary = read(
                load_json(&config).await?,
                load_json(&catalog).await?,
                state,
                &mut sink,
            )
            .await?;
            info!(
                "Read {} records from {} streams",
                summary.records, summary.streams_read
            );
        }
    }
    Ok(())
}
