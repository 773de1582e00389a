//! `du`: recursive file count, total size and newest modification time.

use std::io::{self, Write};

use chrono::Utc;
use clap::Args;

use crate::cli::context::CommandContext;
use crate::cli::{CliError, Result};
use crate::config::DisplayConfig;
use crate::fetcher::{Metadata, Scope};
use crate::format::{render_datetime, render_size};
use crate::location::S3Location;

/// Arguments for the du command.
#[derive(Args, Debug)]
pub struct DuArgs {
    /// Bucket or prefix, e.g. "s3://bucket/some/dir".
    pub location: S3Location,

    /// Only answer from the cache; fail if anything below is missing.
    #[arg(long)]
    pub cached: bool,

    /// Report each directory on stderr as it completes.
    #[arg(long)]
    pub progress: bool,
}

impl DuArgs {
    pub async fn run(self, ctx: &CommandContext) -> Result<()> {
        let fetcher = ctx.fetcher(&self.location).await?;

        let metadata = if self.cached {
            fetcher.check_metadata().ok_or_else(|| {
                CliError::Other(format!("{} is not fully cached", self.location))
            })?
        } else if self.progress {
            let display = ctx.display().clone();
            let report = move |scope: &Scope, metadata: &Metadata| {
                eprintln!("{}\t{}", summary(metadata, &display), scope);
            };
            fetcher.compute_metadata_with_progress(Some(&report)).await?
        } else {
            fetcher.compute_metadata().await?
        };

        let mut out = io::stdout().lock();
        if ctx.json {
            writeln!(out, "{}", serde_json::to_string(&metadata)?)?;
        } else {
            writeln!(out, "{}\t{}", summary(&metadata, ctx.display()), self.location)?;
        }
        Ok(())
    }
}

fn summary(metadata: &Metadata, display: &DisplayConfig) -> String {
    let modified = metadata
        .last_modified
        .timestamp()
        .map(|ts| render_datetime(ts, &display.datetime_format, Utc::now()))
        .unwrap_or_else(|| "-".to_string());
    format!(
        "{}\t{} files\t{}",
        render_size(metadata.total_size, display.size_format, false),
        metadata.num_children,
        modified
    )
}
