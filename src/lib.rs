//! s3idx-rs - Paginated, cached, recursively aggregating listings of S3 buckets.

pub mod caches;
pub mod cli;
pub mod config;
pub mod fetcher;
pub mod format;
pub mod listing;
pub mod location;
pub mod util;

pub use fetcher::{
    Cache, FetchError, Fetcher, FetcherConfig, FetcherServices, LastModified, Metadata, Row, Scope,
    Ttl,
};
pub use location::S3Location;
