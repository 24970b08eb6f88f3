//! Main entry point for the popfreqs CLI.

use clap::{command, Args, Parser, Subcommand};

use popfreqs::{common, freqs};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Per-population allele frequencies for VEP custom annotation"
)]
struct Cli {
    /// Commonly used arguments
    #[command(flatten)]
    common: common::Args,

    /// The sub command to run
    #[command(subcommand)]
    command: Commands,
}

/// Enum supporting the parsing of top-level commands.
#[derive(Debug, Subcommand)]
enum Commands {
    /// Frequency-related commands.
    Freqs(Freqs),
}

/// Parsing of "freqs *" sub commands.
#[derive(Debug, Args)]
#[command(args_conflicts_with_subcommands = true)]
struct Freqs {
    /// The sub command to run
    #[command(subcommand)]
    command: FreqsCommands,
}

/// Enum supporting the parsing of "freqs *" sub commands.
#[derive(Debug, Subcommand)]
enum FreqsCommands {
    Calculate(freqs::calculate::Args),
    CustomArgs(freqs::custom_args::Args),
}

fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();

    // Build a tracing subscriber according to the configuration in `cli.common`.
    let collector = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(common::tracing_level(&cli.common))
        .compact()
        .finish();

    // Install collector and go into sub commands.
    tracing::subscriber::with_default(collector, || {
        tracing::info!("popfreqs {} startup", common::version());

        match &cli.command {
            Commands::Freqs(freqs) => match &freqs.command {
                FreqsCommands::Calculate(args) => freqs::calculate::run(&cli.common, args)?,
                FreqsCommands::CustomArgs(args) => freqs::custom_args::run(&cli.common, args)?,
            },
        }

        tracing::info!("All done. Have a nice day!");

        Ok::<(), anyhow::Error>(())
    })?;

    Ok(())
}
