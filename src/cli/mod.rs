// CLI module
// Command-line interface and argument parsing

mod args;

pub use args::{
    CliArgs, Command, CommitStrategyType, IngestArgs, LedgerArgs, LogFormat, ServeArgs,
    DEFAULT_PARTITIONS,
};

use clap::Parser;

/// Parse command-line arguments using clap
///
/// Values not given on the command line are read from the environment
/// (a `.env` file is loaded first by `main`). On invalid arguments or
/// `--help` clap prints the message and exits the process.
pub fn parse_args() -> CliArgs {
    CliArgs::parse()
}
