//! Paginated, cached, recursively-aggregating listings.
//!
//! A [`Fetcher`] serves arbitrary row ranges of one scope's listing, pages
//! it from the [`ListingService`](crate::listing::ListingService) on demand,
//! and keeps what it fetched in a persistent [`Cache`] until the TTL runs
//! out. Aggregates over a whole subtree come from
//! [`Fetcher::compute_metadata`], or from [`Fetcher::check_metadata`] when
//! everything needed is already cached.

mod cache;
mod error;
#[allow(clippy::module_inception)]
mod fetcher;
mod metadata;
mod reduce;
mod rows;
mod scope;
mod ttl;

pub use cache::{apply, Cache, CacheEvent};
pub use error::{FetchError, Result};
pub use fetcher::{CacheCallback, Fetcher, FetcherConfig, FetcherServices, DEFAULT_PAGE_SIZE};
pub use metadata::{LastModified, Metadata};
pub use reduce::ProgressFn;
pub use rows::{Dir, File, Page, Row};
pub use scope::Scope;
pub use ttl::{default_ttl, parse_duration, Ttl};
