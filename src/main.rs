//! `swap-indexer` binary.

use anyhow::Context;
use clap::{Parser, Subcommand};
use solana_swap_indexer::telemetry::init_telemetry;
use solana_swap_indexer::{SwapIndexer, SwapIndexerConfig};

/// Solana DEX swap indexer
#[derive(Debug, Parser)]
#[command(name = "swap-indexer", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, PartialEq, Eq, Subcommand)]
enum Command {
    /// Run the full pipeline (default)
    Run,
    /// Publish a block range to the work queue
    Backfill {
        /// First block of the range
        from: u64,
        /// Last block of the range; 0 resolves to the current slot
        #[arg(default_value_t = 0)]
        to: u64,
    },
    /// Re-detect the swaps of one transaction
    Reprocess {
        /// Transaction signature (base58)
        signature: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = SwapIndexerConfig::from_env().context("loading configuration")?;
    let _telemetry = init_telemetry(&config.telemetry);

    let mut indexer = SwapIndexer::new(config).await.context("initialising indexer")?;

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => indexer.start().await?,
        Command::Backfill { from, to } => {
            let report = indexer.backfill(from, to).await?;
            tracing::info!(
                fetched = report.fetched,
                skipped = report.skipped,
                failed = report.failed,
                published = report.published,
                "Backfill finished"
            );
        }
        Command::Reprocess { signature } => {
            let swaps = indexer.reprocess_transaction(&signature).await?;
            tracing::info!(%signature, swaps = swaps.len(), "Reprocess finished");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Result<Option<Command>, clap::Error> {
        Cli::try_parse_from(std::iter::once("swap-indexer").chain(args.iter().copied())).map(|cli| cli.command)
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse(&[]).unwrap(), None);
        assert_eq!(parse(&["run"]).unwrap(), Some(Command::Run));
        assert_eq!(
            parse(&["backfill", "10", "20"]).unwrap(),
            Some(Command::Backfill { from: 10, to: 20 })
        );
        assert_eq!(
            parse(&["backfill", "10"]).unwrap(),
            Some(Command::Backfill { from: 10, to: 0 })
        );
        assert_eq!(
            parse(&["reprocess", "sig"]).unwrap(),
            Some(Command::Reprocess {
                signature: "sig".to_string()
            })
        );
    }

    #[test]
    fn test_rejects_bad_arguments() {
        assert!(parse(&["backfill", "x"]).is_err());
        assert!(parse(&["backfill"]).is_err());
        assert!(parse(&["nope"]).is_err());
    }
}
