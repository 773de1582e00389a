use thiserror::Error;

use crate::listing::ListingError;

/// Errors produced while fetching and assembling listings.
///
/// Cloneable so every caller coalesced onto one page request sees the same
/// failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Pages were requested in a way the listing protocol cannot satisfy.
    #[error("listing protocol violation: {0}")]
    Protocol(String),

    /// The listing service returned a record missing a required field.
    #[error("malformed listing record: {0}")]
    MalformedRecord(String),

    /// A TTL string given to a fetcher did not parse.
    #[error("unrecognized TTL: {0:?}")]
    InvalidTtl(String),

    /// Page sizes must be positive.
    #[error("invalid page size: {0}")]
    InvalidPageSize(usize),

    /// The listing service failed.
    #[error(transparent)]
    Listing(#[from] ListingError),
}

pub type Result<T> = std::result::Result<T, FetchError>;
