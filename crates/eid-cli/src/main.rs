use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use eid_card::CardKind;
use tracing::warn;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod formatters;

use commands::RunContext;
use config::AppConfig;
use formatters::FormatMode;

#[derive(Parser)]
#[command(name = "eid-reader")]
#[command(about = "eID card reader - Read document, holder and residence data from eID cards")]
#[command(version)]
struct Args {
    /// Reader name (defaults to the first reader found)
    #[arg(short, long, global = true)]
    reader: Option<String>,

    /// Card generation
    #[arg(long, value_enum, global = true)]
    card: Option<CardArg>,

    /// Settings file (defaults to ./eid-reader.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log every APDU exchanged with the card
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format mode
    #[arg(short, long, value_enum, default_value_t = FormatMode::Human, global = true)]
    format: FormatMode,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// List connected readers
    Readers,
    /// Print document, holder and residence data
    Info,
    /// Save the holder photo as JPEG
    Photo {
        /// Output file (defaults to <personal number>.jpg)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Save the signing certificates
    Certs {
        /// Output directory
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },
    /// Write every known elementary file verbatim
    Dump {
        /// Output directory
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Wait in the background for a card to be inserted
    Wait {
        /// Give up after this many seconds
        #[arg(short, long)]
        timeout: Option<u64>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum CardArg {
    Apollo,
    Gemalto,
}

impl From<CardArg> for CardKind {
    fn from(arg: CardArg) -> Self {
        match arg {
            CardArg::Apollo => CardKind::Apollo,
            CardArg::Gemalto => CardKind::Gemalto,
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    let mut config = match AppConfig::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Failed to load configuration: {}", err);
            return ExitCode::FAILURE;
        }
    };
    if let Some(reader) = args.reader {
        config.reader = Some(reader);
    }
    if let Some(card) = args.card {
        config.card = card.into();
    }
    let verbose = args.verbose || config.verbose;

    // RUST_LOG wins; otherwise info, or debug for APDU traces with --verbose
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let ctx = RunContext::new(config, args.format, verbose);

    let result = match args.command.unwrap_or(Command::Info) {
        Command::Readers => commands::readers::cmd_readers(&ctx),
        Command::Info => commands::info::cmd_info(&ctx),
        Command::Photo { output } => commands::photo::cmd_photo(&ctx, output.as_deref()),
        Command::Certs { output } => commands::certs::cmd_certs(&ctx, &output),
        Command::Dump { output } => commands::dump::cmd_dump(&ctx, &output),
        Command::Wait { timeout } => {
            commands::wait::cmd_wait(&ctx, timeout.map(Duration::from_secs))
        }
    };

    if let Err(err) = ctx.manager.release() {
        warn!(error = %err, "Failed to release PC/SC context");
    }

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {}", err);
            ExitCode::FAILURE
        }
    }
}
