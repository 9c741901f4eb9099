//! Card Ledger CLI
//!
//! # Usage
//!
//! ```bash
//! cargo run -- serve --port 8080
//! cargo run -- serve --database ledger.db --commit-strategy dead-letter
//! cargo run -- ingest --cards cards.csv payments.csv > summaries.csv
//! cargo run -- ingest --workers 4 --partitions 16 --seed 42 payments.csv
//! ```
//!
//! Every option can also be given through the environment (a `.env` file in
//! the working directory is loaded first). Logs go to stderr; `RUST_LOG`
//! overrides the default filter.
//!
//! # Exit Codes
//!
//! - 0: Success
//! - 1: Error (missing arguments, file not found, database not openable, etc.)

use card_ledger::app::{self, Ledger};
use card_ledger::cli::{self, Command, LogFormat};
use std::process;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let args = cli::parse_args();
    init_tracing(args.ledger.log_format);

    if let Err(e) = run(args).await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

async fn run(args: cli::CliArgs) -> Result<(), card_ledger::LedgerError> {
    let ledger = Ledger::from_args(&args.ledger)?;

    match args.command {
        Command::Serve(serve) => {
            app::serve(&ledger, &serve.host, serve.port).await?;
        }
        Command::Ingest(ingest) => {
            let mut output = std::io::stdout();
            app::ingest(
                &ledger,
                &ingest.input_file,
                ingest.cards.as_deref(),
                &mut output,
            )
            .await?;
        }
    }
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,card_ledger=debug".into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init(),
    }
}
