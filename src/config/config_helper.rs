//! Configuration helper for interpreting config values.
//!
//! The `ConfigHelper` wraps a `Config` and turns it, together with a parsed
//! location, into the settings the listing service, the cache store and the
//! fetcher are built from.

use std::sync::Arc;

use crate::caches::{KeyValueStore, KeyValueStoreResult, LmdbKeyValueStore, NoopKeyValueStore};
use crate::fetcher::{FetcherConfig, Ttl};
use crate::listing::S3ListingConfig;
use crate::location::S3Location;

use super::Config;

/// Helper for interpreting configuration values.
#[derive(Debug, Clone)]
pub struct ConfigHelper {
    config: Config,
}

impl ConfigHelper {
    /// Create a new ConfigHelper wrapping the given config.
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Get a reference to the underlying config.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Consume the helper and return the underlying config.
    pub fn into_config(self) -> Config {
        self.config
    }

    /// Connection settings for `location`.
    ///
    /// Endpoint and region named by the location itself win over `[s3]`.
    /// Credentials are only used when both halves are configured.
    pub fn listing_config(&self, location: &S3Location) -> S3ListingConfig {
        let s3 = &self.config.s3;
        let mut listing = S3ListingConfig::new()
            .with_force_path_style(location.force_path_style || s3.force_path_style);
        if let Some(endpoint) = location.endpoint.as_ref().or(s3.endpoint_url.as_ref()) {
            listing = listing.with_endpoint_url(endpoint.clone());
        }
        if let Some(region) = location.region.as_ref().or(s3.region.as_ref()) {
            listing = listing.with_region(region.clone());
        }
        if let (Some(id), Some(secret)) = (&s3.access_key_id, &s3.secret_access_key) {
            listing = listing.with_credentials(id.clone(), secret.clone());
        }
        listing
    }

    /// Fetcher settings for `location`.
    pub fn fetcher_config(&self, location: &S3Location) -> FetcherConfig {
        let mut config = FetcherConfig::new(location.bucket.clone())
            .with_ttl(Ttl::Duration(self.config.fetcher.ttl))
            .with_page_size(self.config.fetcher.page_size);
        if let Some(key) = &location.key {
            config = config.with_key(key.clone());
        }
        config
    }

    /// The persistent store listings are cached in.
    pub fn open_store(&self) -> KeyValueStoreResult<Arc<dyn KeyValueStore>> {
        let cache = &self.config.cache;
        if cache.no_cache {
            return Ok(Arc::new(NoopKeyValueStore));
        }
        let map_size = usize::try_from(cache.map_size.0).unwrap_or(usize::MAX);
        Ok(Arc::new(LmdbKeyValueStore::new(&cache.path, map_size)?))
    }
}

impl From<Config> for ConfigHelper {
    fn from(config: Config) -> Self {
        Self::new(config)
    }
}
