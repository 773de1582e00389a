//! Cache subcommands.

use std::io::{self, Write};

use clap::{Args, Subcommand};

use crate::cli::context::CommandContext;
use crate::cli::{CliError, Result};
use crate::fetcher::{Cache, Scope};
use crate::location::S3Location;

// =============================================================================
// Cache Subcommands
// =============================================================================

/// Cache subcommands.
#[derive(Subcommand, Debug)]
pub enum CacheCommand {
    /// Forget everything cached at and below a location.
    Clear(LocationArgs),

    /// Show what is cached for a location.
    Show(LocationArgs),

    /// List every cached scope.
    List(ListArgs),
}

impl CacheCommand {
    /// Run the cache subcommand.
    pub async fn run(self, ctx: &CommandContext) -> Result<()> {
        match self {
            CacheCommand::Clear(args) => args.clear(ctx).await,
            CacheCommand::Show(args) => args.show(ctx),
            CacheCommand::List(args) => args.run(ctx),
        }
    }
}

/// A single location argument.
#[derive(Args, Debug)]
pub struct LocationArgs {
    /// Bucket or prefix, e.g. "s3://bucket/some/dir".
    pub location: S3Location,
}

impl LocationArgs {
    async fn clear(self, ctx: &CommandContext) -> Result<()> {
        ctx.fetcher(&self.location).await?.clear_cache();
        Ok(())
    }

    fn show(self, ctx: &CommandContext) -> Result<()> {
        let scope = self.location.scope();
        let cache = ctx
            .cache_repo()
            .get(&scope)
            .ok_or_else(|| CliError::Other(format!("nothing cached for {}", self.location)))?;

        let mut out = io::stdout().lock();
        if ctx.json {
            writeln!(out, "{}", serde_json::to_string(&cache)?)?;
        } else {
            for line in describe(&cache) {
                writeln!(out, "{}", line)?;
            }
        }
        Ok(())
    }
}

fn describe(cache: &Cache) -> Vec<String> {
    let fetched = cache.pages.iter().filter(|p| p.is_some()).count();
    let mut lines = vec![
        format!("fetched at: {}", cache.timestamp.to_rfc3339()),
        format!("pages:      {} of {}", fetched, cache.pages.len()),
    ];
    if let Some(page_size) = cache.page_size {
        lines.push(format!("page size:  {}", page_size));
    }
    lines.push(match cache.num_children {
        Some(n) => format!("children:   {}", n),
        None => "children:   (not fully paged)".to_string(),
    });
    match cache.metadata() {
        Some(metadata) => {
            lines.push(format!("files:      {}", metadata.num_children));
            lines.push(format!("total size: {}", metadata.total_size));
        }
        None => lines.push("aggregate:  (not computed)".to_string()),
    }
    lines
}

/// Arguments for the cache list command.
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Only scopes whose location starts with this, e.g. "s3://bucket/dir".
    pub prefix: Option<String>,
}

impl ListArgs {
    fn run(self, ctx: &CommandContext) -> Result<()> {
        let scopes = matching_scopes(ctx.cache_repo().scopes(), self.prefix.as_deref());
        let mut out = io::stdout().lock();
        for scope in scopes {
            if ctx.json {
                writeln!(out, "{}", serde_json::to_string(&scope)?)?;
            } else {
                writeln!(out, "{}", scope)?;
            }
        }
        Ok(())
    }
}

fn matching_scopes(mut scopes: Vec<Scope>, prefix: Option<&str>) -> Vec<Scope> {
    if let Some(prefix) = prefix {
        let prefix = prefix.trim_start_matches("s3://");
        scopes.retain(|scope| scope.to_string().starts_with(prefix));
    }
    scopes.sort();
    scopes
}

#[cfg(test)]
mod tests {
    use chrono::DateTime;

    use crate::fetcher::{apply, CacheEvent, Page};

    use super::*;

    #[test]
    fn test_matching_scopes() {
        let scopes = vec![
            Scope::new("b", Some("x/y")),
            Scope::root("a"),
            Scope::new("b", Some("x")),
            Scope::root("c"),
        ];
        let names: Vec<String> = matching_scopes(scopes.clone(), Some("s3://b/x"))
            .iter()
            .map(Scope::to_string)
            .collect();
        assert_eq!(names, vec!["b/x", "b/x/y"]);
        assert_eq!(matching_scopes(scopes, None).len(), 4);
    }

    #[test]
    fn test_describe_partial_cache() {
        let page = Page {
            dirs: Vec::new(),
            files: Vec::new(),
            truncated: true,
            continuation_token: Some("t".to_string()),
        };
        let cache = apply(
            None,
            CacheEvent::PageFetched {
                index: 0,
                page,
                page_size: 2,
                fetched_at: DateTime::from_timestamp(0, 0).unwrap(),
            },
        )
        .unwrap();

        let lines = describe(&cache);
        assert!(lines.contains(&"pages:      1 of 1".to_string()));
        assert!(lines.contains(&"children:   (not fully paged)".to_string()));
        assert!(lines.contains(&"aggregate:  (not computed)".to_string()));
    }
}
