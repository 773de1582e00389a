//! `ls`: list one level of a bucket or prefix.

use std::io::{self, Write};

use chrono::Utc;
use clap::Args;
use crossterm::style::{Color, Stylize};

use crate::cli::context::CommandContext;
use crate::cli::Result;
use crate::config::DisplayConfig;
use crate::fetcher::{Fetcher, Row};
use crate::format::{render_datetime, render_size};
use crate::location::S3Location;

// =============================================================================
// Arguments
// =============================================================================

/// Arguments for the ls command.
#[derive(Args, Debug)]
pub struct LsArgs {
    /// Bucket or prefix, e.g. "s3://bucket/some/dir".
    pub location: S3Location,

    /// Index of the first row to show.
    #[arg(long, default_value_t = 0)]
    pub start: usize,

    /// Index one past the last row to show; everything by default.
    #[arg(long)]
    pub end: Option<usize>,

    /// Show type, size and modification time.
    #[arg(short, long)]
    pub long: bool,
}

impl LsArgs {
    pub async fn run(self, ctx: &CommandContext) -> Result<()> {
        let fetcher = ctx.fetcher(&self.location).await?;
        let rows = read_rows(&fetcher, self.start, self.end).await?;
        let rows = attach_cached_metadata(&fetcher, rows);

        let stdout = io::stdout();
        let mut handle = stdout.lock();
        if ctx.json {
            for row in &rows {
                writeln!(handle, "{}", serde_json::to_string(row)?)?;
            }
        } else if self.long {
            let color = crossterm::tty::IsTty::is_tty(&stdout);
            write_long(&mut handle, &rows, ctx.display(), color)?;
        } else {
            for row in &rows {
                writeln!(handle, "{}", row.name())?;
            }
        }
        Ok(())
    }
}

/// Rows `[start, end)`, or from `start` to the end of the listing.
async fn read_rows(fetcher: &Fetcher, start: usize, end: Option<usize>) -> Result<Vec<Row>> {
    if let Some(end) = end {
        return Ok(fetcher.get(start, end).await?);
    }
    let chunk = fetcher.page_size();
    let mut rows = Vec::new();
    let mut offset = start;
    loop {
        let batch = fetcher.get(offset, offset + chunk).await?;
        let done = batch.len() < chunk;
        offset += batch.len();
        rows.extend(batch);
        if done {
            return Ok(rows);
        }
    }
}

/// Fill in directory sizes and times wherever the cache already knows them.
fn attach_cached_metadata(fetcher: &Fetcher, rows: Vec<Row>) -> Vec<Row> {
    rows.into_iter()
        .map(|row| match row {
            Row::Dir(dir) => match fetcher.child(&dir.prefix).check_metadata() {
                Some(metadata) => Row::Dir(dir.with_metadata(&metadata)),
                None => Row::Dir(dir),
            },
            file => file,
        })
        .collect()
}

// =============================================================================
// Long Format
// =============================================================================

struct LongEntry<'a> {
    type_char: char,
    size: String,
    modified: String,
    name: &'a str,
}

fn long_entry<'a>(row: &'a Row, display: &DisplayConfig) -> LongEntry<'a> {
    let now = Utc::now();
    let (type_char, size, modified) = match row {
        Row::Dir(dir) => ('d', dir.size, dir.last_modified.timestamp()),
        Row::File(file) => ('-', Some(file.size), Some(file.last_modified)),
    };
    LongEntry {
        type_char,
        size: size
            .map(|s| render_size(s, display.size_format, true))
            .unwrap_or_else(|| "-".to_string()),
        modified: modified
            .map(|ts| render_datetime(ts, &display.datetime_format, now))
            .unwrap_or_else(|| "-".to_string()),
        name: row.name(),
    }
}

/// One row per line: type, size, modification time, name.
fn write_long<W: Write>(
    out: &mut W,
    rows: &[Row],
    display: &DisplayConfig,
    color: bool,
) -> io::Result<()> {
    let entries: Vec<LongEntry<'_>> = rows.iter().map(|row| long_entry(row, display)).collect();
    let size_width = entries.iter().map(|e| e.size.len()).max().unwrap_or(0);
    let modified_width = entries.iter().map(|e| e.modified.len()).max().unwrap_or(0);

    for entry in &entries {
        let name = if color && entry.type_char == 'd' {
            entry.name.with(Color::Blue).to_string()
        } else {
            entry.name.to_string()
        };
        writeln!(
            out,
            "{} {:>size_width$} {:<modified_width$} {}",
            entry.type_char,
            entry.size,
            entry.modified,
            name,
            size_width = size_width,
            modified_width = modified_width,
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{DateTime, Utc};

    use crate::caches::MemoryKeyValueStore;
    use crate::fetcher::{Dir, File, FetcherConfig, FetcherServices, LastModified, Metadata};
    use crate::format::{DatetimeFormat, SizeFormat};
    use crate::listing::MemoryListingService;

    use super::*;

    fn ts(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn display() -> DisplayConfig {
        DisplayConfig {
            size_format: SizeFormat::Bytes,
            datetime_format: DatetimeFormat::Pattern("%Y-%m-%d".to_string()),
        }
    }

    fn fetcher(listing: MemoryListingService, page_size: usize) -> Fetcher {
        let services =
            FetcherServices::new(Arc::new(listing), Arc::new(MemoryKeyValueStore::new()));
        Fetcher::new(FetcherConfig::new("b").with_page_size(page_size), services).unwrap()
    }

    #[test]
    fn test_write_long_aligns_columns() {
        let rows = vec![
            Row::Dir(Dir::new("photos")),
            Row::Dir(Dir::new("docs").with_metadata(&Metadata {
                num_children: 2,
                total_size: 12345,
                last_modified: LastModified::At(ts(0)),
            })),
            Row::File(File {
                key: "readme".to_string(),
                last_modified: ts(86_400),
                size: 7,
            }),
        ];

        let mut out = Vec::new();
        write_long(&mut out, &rows, &display(), false).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "d     - -          photos\n\
             d 12345 1970-01-01 docs\n\
             -     7 1970-01-02 readme\n"
        );
    }

    #[tokio::test]
    async fn test_read_rows_to_the_end_in_chunks() {
        let listing = MemoryListingService::new();
        for i in 0..5 {
            listing.put_object("b", &format!("f{}", i), 1, ts(0));
        }
        let fetcher = fetcher(listing, 2);

        let rows = read_rows(&fetcher, 0, None).await.unwrap();
        let names: Vec<&str> = rows.iter().map(Row::name).collect();
        assert_eq!(names, vec!["f0", "f1", "f2", "f3", "f4"]);

        let rows = read_rows(&fetcher, 3, None).await.unwrap();
        assert_eq!(rows.len(), 2);

        let rows = read_rows(&fetcher, 1, Some(3)).await.unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[tokio::test]
    async fn test_cached_directory_metadata_is_attached() {
        let listing = MemoryListingService::new();
        listing.put_object("b", "a/x", 10, ts(5));
        listing.put_object("b", "c/y", 4, ts(5));
        let fetcher = fetcher(listing, 10);
        fetcher.child("a").get(0, 10).await.unwrap();

        let rows = read_rows(&fetcher, 0, None).await.unwrap();
        let rows = attach_cached_metadata(&fetcher, rows);
        match (&rows[0], &rows[1]) {
            (Row::Dir(a), Row::Dir(c)) => {
                assert_eq!(a.size, Some(10));
                assert_eq!(c.size, None);
            }
            other => panic!("unexpected rows {:?}", other),
        }
    }
}
