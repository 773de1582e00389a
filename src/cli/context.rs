//! Everything a command needs: configuration, the cache store and fetchers.

use std::sync::Arc;

use tracing::warn;

use crate::caches::{CacheRepo, KeyValueStore};
use crate::config::{read_config, ConfigHelper, DisplayConfig};
use crate::fetcher::{Fetcher, FetcherServices, Ttl};
use crate::listing::S3ListingService;
use crate::location::S3Location;

use super::{GlobalArgs, Result};

/// Resolved configuration plus the opened cache store.
pub struct CommandContext {
    helper: ConfigHelper,
    store: Arc<dyn KeyValueStore>,
    ttl: Option<Ttl>,
    pub json: bool,
}

impl CommandContext {
    /// Read configuration and open the cache store.
    pub fn new(global: &GlobalArgs) -> Result<Self> {
        let result = read_config(&global.to_config_source())?;
        for warning in &result.warnings {
            warn!("{}", warning);
        }
        let helper = ConfigHelper::new(result.config);
        let store = helper.open_store()?;
        Ok(Self {
            helper,
            store,
            ttl: global.ttl.clone().map(Ttl::from),
            json: global.json,
        })
    }

    pub fn display(&self) -> &DisplayConfig {
        &self.helper.config().display
    }

    pub fn cache_repo(&self) -> CacheRepo {
        CacheRepo::new(Arc::clone(&self.store))
    }

    /// A fetcher for `location`, talking to S3.
    ///
    /// A `--ttl` given on the command line must parse; the configured TTL is
    /// used otherwise.
    pub async fn fetcher(&self, location: &S3Location) -> Result<Fetcher> {
        let listing = S3ListingService::new(self.helper.listing_config(location)).await;
        let mut config = self.helper.fetcher_config(location);
        if let Some(ttl) = &self.ttl {
            config = config.with_ttl(ttl.clone());
        }
        let services = FetcherServices::new(Arc::new(listing), Arc::clone(&self.store));
        Ok(Fetcher::new(config, services)?)
    }
}
