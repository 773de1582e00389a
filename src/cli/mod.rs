//! Command-line interface for s3idx.

pub mod args;
mod commands;
pub mod context;

use clap::{Parser, Subcommand};
use thiserror::Error;

use crate::caches::KeyValueStoreError;
use crate::config::ConfigError;
use crate::fetcher::FetchError;
use crate::location::LocationError;

pub use args::GlobalArgs;
pub use context::CommandContext;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during CLI execution.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// Unusable location argument.
    #[error("{0}")]
    Location(#[from] LocationError),

    /// Listing or cache error.
    #[error("{0}")]
    Fetch(#[from] FetchError),

    /// Cache store could not be opened.
    #[error("cache store: {0}")]
    Store(#[from] KeyValueStoreError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON output error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other error.
    #[error("{0}")]
    Other(String),
}

/// Result type for CLI operations.
pub type Result<T> = std::result::Result<T, CliError>;

// =============================================================================
// CLI Definition
// =============================================================================

/// s3idx - Cached, paginated listings of S3 buckets.
#[derive(Parser, Debug)]
#[command(name = "s3idx", version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Top-level commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// List a bucket or prefix.
    Ls(commands::ls::LsArgs),

    /// Summarize everything below a bucket or prefix.
    Du(commands::du::DuArgs),

    /// Inspect or clear the listing cache.
    Cache {
        #[command(subcommand)]
        command: commands::cache::CacheCommand,
    },
}

// =============================================================================
// CLI Execution
// =============================================================================

impl Cli {
    /// Parse command-line arguments and return the CLI instance.
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Run the CLI command.
    pub async fn run(self) -> Result<()> {
        let ctx = CommandContext::new(&self.global)?;

        match self.command {
            Command::Ls(args) => args.run(&ctx).await,
            Command::Du(args) => args.run(&ctx).await,
            Command::Cache { command } => command.run(&ctx).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_ls() {
        let cli = Cli::try_parse_from([
            "s3idx", "-vv", "ls", "s3://bucket/dir", "--start", "5", "--json",
        ])
        .unwrap();
        assert_eq!(cli.global.verbose, 2);
        assert!(cli.global.json);
        match cli.command {
            Command::Ls(args) => {
                assert_eq!(args.location.bucket, "bucket");
                assert_eq!(args.location.key.as_deref(), Some("dir"));
                assert_eq!(args.start, 5);
                assert_eq!(args.end, None);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_rejects_bad_location() {
        assert!(Cli::try_parse_from(["s3idx", "du", "gs://bucket"]).is_err());
    }
}
