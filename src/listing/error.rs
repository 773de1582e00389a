use thiserror::Error;

/// Errors surfaced by a listing service.
///
/// Cloneable so that every caller coalesced onto one page request can
/// receive the same failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ListingError {
    /// The service refused the request (HTTP 403 / `AccessDenied`).
    #[error("access denied listing bucket {bucket}: {message}")]
    AccessDenied { bucket: String, message: String },

    /// The bucket does not exist.
    #[error("no such bucket: {0}")]
    NoSuchBucket(String),

    /// Any other error response from the service.
    #[error("{code}: {message}")]
    Service { code: String, message: String },

    /// The request never produced a service response (DNS, TLS, CORS, timeout...).
    #[error("transport error: {0}")]
    Transport(String),
}

impl ListingError {
    /// Whether supplying credentials might make this request succeed.
    pub fn is_access_denied(&self) -> bool {
        matches!(self, ListingError::AccessDenied { .. })
    }
}

pub type Result<T> = std::result::Result<T, ListingError>;
