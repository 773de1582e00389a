//! The paginated "list objects under a prefix" service consumed by fetchers.
//!
//! [`ListingService`] is the seam between the fetcher and whatever answers
//! ListObjectsV2-style requests: [`S3ListingService`] talks to a real
//! S3-compatible endpoint, [`MemoryListingService`] serves an in-memory bucket.

mod error;
mod memory_listing_service;
mod s3_listing_service;
mod types;

pub use error::{ListingError, Result};
pub use memory_listing_service::MemoryListingService;
pub use s3_listing_service::{S3ListingConfig, S3ListingService, StaticCredentials};
pub use types::{ListRequest, ListResponse, ListedObject, ListedPrefix, ListingService, DELIMITER};
