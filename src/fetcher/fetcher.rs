//! The paginated, cached listing fetcher for one scope.
//!
//! A [`Fetcher`] owns the in-memory copy of its scope's [`Cache`] and the
//! page requests currently in flight. Pages are fetched strictly in order,
//! since page N+1 can only be requested with page N's continuation token.
//! Every cache transition goes through [`apply`] and is then persisted
//! through the shared [`CacheRepo`].

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Duration;
use tracing::{debug, info};

use crate::caches::{CacheRepo, KeyValueStore};
use crate::listing::{ListRequest, ListingService, DELIMITER};
use crate::util::{Clock, SingleFlight, SystemClock};

use super::cache::{apply, Cache, CacheEvent};
use super::error::{FetchError, Result};
use super::rows::{Page, Row};
use super::scope::Scope;
use super::ttl::{default_ttl, Ttl};

/// Page size used when a fetcher is given none.
pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// Invoked with the new cache each time a fetcher stores one.
pub type CacheCallback = Arc<dyn Fn(&Scope, &Cache) + Send + Sync>;

// =============================================================================
// Configuration
// =============================================================================

/// What to list and how.
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    pub bucket: String,
    pub key: Option<String>,
    /// Cache lifetime. Defaults to [`default_ttl`].
    pub ttl: Option<Ttl>,
    /// Rows per page. Defaults to [`DEFAULT_PAGE_SIZE`].
    pub page_size: Option<usize>,
}

impl FetcherConfig {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: None,
            ttl: None,
            page_size: None,
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_ttl(mut self, ttl: impl Into<Ttl>) -> Self {
        self.ttl = Some(ttl.into());
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = Some(page_size);
        self
    }
}

/// The collaborators a fetcher talks to.
#[derive(Clone)]
pub struct FetcherServices {
    pub listing: Arc<dyn ListingService>,
    pub store: Arc<dyn KeyValueStore>,
    pub clock: Arc<dyn Clock>,
}

impl FetcherServices {
    pub fn new(listing: Arc<dyn ListingService>, store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            listing,
            store,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

/// State shared by a fetcher and every fetcher derived from it for a subdirectory.
struct Shared {
    listing: Arc<dyn ListingService>,
    repo: CacheRepo,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    page_size: usize,
}

// =============================================================================
// Fetcher
// =============================================================================

/// Paginated, cached listing of one scope.
pub struct Fetcher {
    shared: Arc<Shared>,
    pub(super) scope: Scope,
    cache: Mutex<Option<Cache>>,
    flights: SingleFlight<usize, Page, FetchError>,
    on_change: Option<CacheCallback>,
}

/// Where a forward walk through the pages has to start.
enum Resume {
    Hit(Page),
    From(usize, Option<String>),
    PastEnd,
    MissingToken(usize),
}

impl Fetcher {
    /// Create a fetcher, loading whatever unexpired cache exists for its scope.
    ///
    /// Fails if the configured TTL does not parse or the page size is zero.
    pub fn new(config: FetcherConfig, services: FetcherServices) -> Result<Self> {
        let ttl = match &config.ttl {
            Some(ttl) => ttl.resolve()?,
            None => default_ttl(),
        };
        let page_size = config.page_size.unwrap_or(DEFAULT_PAGE_SIZE);
        if page_size == 0 {
            return Err(FetchError::InvalidPageSize(page_size));
        }

        let shared = Arc::new(Shared {
            listing: services.listing,
            repo: CacheRepo::new(services.store),
            clock: services.clock,
            ttl,
            page_size,
        });
        let scope = Scope::new(config.bucket, config.key.as_deref());
        Ok(Self::for_scope(shared, scope))
    }

    fn for_scope(shared: Arc<Shared>, scope: Scope) -> Self {
        let cache = shared
            .repo
            .load_fresh(&scope, shared.ttl, shared.page_size, shared.clock.now());
        debug!(%scope, cached = cache.is_some(), "created fetcher");
        Self {
            shared,
            scope,
            cache: Mutex::new(cache),
            flights: SingleFlight::new(),
            on_change: None,
        }
    }

    /// Call `callback` after every stored change to this scope's cache.
    pub fn with_cache_callback(
        mut self,
        callback: impl Fn(&Scope, &Cache) + Send + Sync + 'static,
    ) -> Self {
        self.on_change = Some(Arc::new(callback));
        self
    }

    /// A fetcher for the subdirectory at `prefix`, sharing this one's settings.
    pub fn child(&self, prefix: &str) -> Fetcher {
        Self::for_scope(Arc::clone(&self.shared), self.scope.child(prefix))
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn page_size(&self) -> usize {
        self.shared.page_size
    }

    pub fn ttl(&self) -> Duration {
        self.shared.ttl
    }

    /// A snapshot of the current cache, if any survives the TTL check.
    pub fn cache(&self) -> Option<Cache> {
        self.fresh(|cache| cache.cloned())
    }

    /// Number of direct children, once every page has been fetched.
    pub fn num_children(&self) -> Option<u64> {
        self.fresh(|cache| cache.and_then(|c| c.num_children))
    }

    // ===== Cache access =====

    fn lock(&self) -> MutexGuard<'_, Option<Cache>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` against the cache after dropping it if it has expired.
    pub(super) fn fresh<R>(&self, f: impl FnOnce(Option<&Cache>) -> R) -> R {
        let mut guard = self.lock();
        let now = self.shared.clock.now();
        let expired = guard
            .as_ref()
            .filter(|c| c.is_expired(self.shared.ttl, now))
            .map(|c| c.timestamp);
        if let Some(fetched_at) = expired {
            info!(scope = %self.scope, %fetched_at, "cache expired");
            *guard = apply(guard.take(), CacheEvent::Expired);
            self.shared.repo.persist(&self.scope, None);
        }
        f(guard.as_ref())
    }

    /// Apply `event`, persist the result and notify the callback.
    pub(super) fn commit(&self, event: CacheEvent) {
        let snapshot = {
            let mut guard = self.lock();
            *guard = apply(guard.take(), event);
            self.shared.repo.persist(&self.scope, guard.as_ref());
            self.on_change.as_ref().and_then(|_| guard.clone())
        };
        if let (Some(callback), Some(cache)) = (&self.on_change, snapshot) {
            callback(&self.scope, &cache);
        }
    }

    // ===== Page sequencer =====

    /// Page `index`, fetching it and any pages before it as needed.
    ///
    /// Asking for a page past the final one is a protocol error.
    pub async fn get_page(&self, index: usize) -> Result<Page> {
        self.page_if_exists(index).await?.ok_or_else(|| {
            FetchError::Protocol(format!(
                "page {} of {} requested, but an earlier page was not truncated",
                index, self.scope
            ))
        })
    }

    /// Page `index`, or `None` if the listing ends before it.
    async fn page_if_exists(&self, index: usize) -> Result<Option<Page>> {
        let resume = self.fresh(|cache| {
            let Some(cache) = cache else {
                return Resume::From(0, None);
            };
            if let Some(page) = cache.page(index) {
                return Resume::Hit(page.clone());
            }
            match (0..index).rev().find_map(|j| cache.page(j).map(|page| (j, page))) {
                None => Resume::From(0, None),
                Some((_, page)) if !page.truncated => Resume::PastEnd,
                Some((j, page)) => match &page.continuation_token {
                    Some(token) => Resume::From(j + 1, Some(token.clone())),
                    None => Resume::MissingToken(j),
                },
            }
        });

        let (mut next, mut token) = match resume {
            Resume::Hit(page) => return Ok(Some(page)),
            Resume::PastEnd => return Ok(None),
            Resume::MissingToken(j) => return Err(self.missing_token(j)),
            Resume::From(next, token) => (next, token),
        };

        loop {
            let page = self.fetch_page(next, token).await?;
            if next == index {
                return Ok(Some(page));
            }
            if !page.truncated {
                return Ok(None);
            }
            token = Some(
                page.continuation_token
                    .ok_or_else(|| self.missing_token(next))?,
            );
            next += 1;
        }
    }

    fn missing_token(&self, index: usize) -> FetchError {
        FetchError::Protocol(format!(
            "page {} of {} is truncated but carries no continuation token",
            index, self.scope
        ))
    }

    /// Fetch page `index` with `token`, joining any request already running for it.
    async fn fetch_page(&self, index: usize, token: Option<String>) -> Result<Page> {
        self.flights
            .run(index, || async move {
                if let Some(page) = self.fresh(|cache| cache.and_then(|c| c.page(index).cloned())) {
                    return Ok(page);
                }

                let page_size = self.shared.page_size;
                let request = ListRequest {
                    bucket: self.scope.bucket.clone(),
                    prefix: self.scope.list_prefix(),
                    max_keys: page_size,
                    delimiter: DELIMITER.to_string(),
                    continuation_token: token,
                };
                let fetched_at = self.shared.clock.now();
                let response = self.shared.listing.list_objects(&request).await?;
                let page = Page::from_listing(response)?;
                debug!(
                    scope = %self.scope,
                    index,
                    rows = page.len(),
                    truncated = page.truncated,
                    "fetched page"
                );

                self.commit(CacheEvent::PageFetched {
                    index,
                    page: page.clone(),
                    fetched_at,
                    page_size,
                });
                Ok(page)
            })
            .await
    }

    // ===== Range reader =====

    /// Rows `[start, end)` of the listing, directories first within each page.
    ///
    /// Returns fewer rows if the listing ends before `end`.
    pub async fn get(&self, start: usize, end: usize) -> Result<Vec<Row>> {
        if end <= start {
            return Ok(Vec::new());
        }
        let page_size = self.shared.page_size;
        let first = start / page_size;
        let last = end.div_ceil(page_size);

        // Pages are chained by continuation token; stop at the final one.
        let mut rows = Vec::new();
        for index in first..last {
            let Some(page) = self.page_if_exists(index).await? else {
                break;
            };
            let page_start = index * page_size;
            let lo = start.saturating_sub(page_start);
            let hi = (end - page_start).min(page.len());
            if lo < hi {
                rows.extend(page.rows().skip(lo).take(hi - lo));
            }
            if !page.truncated {
                break;
            }
        }
        Ok(rows)
    }

    // ===== Subdirectories =====

    /// Scopes of every subdirectory, once this level is fully paged.
    pub fn dirs(&self) -> Option<Vec<Scope>> {
        self.fresh(|cache| cache.and_then(|c| c.child_scopes(&self.scope)))
    }

    /// Drop this scope's cache and those of every subdirectory it knows about.
    ///
    /// Only levels that are fully paged can be descended into.
    pub fn clear_cache(&self) {
        let mut pending = self
            .lock()
            .as_ref()
            .and_then(|c| c.child_scopes(&self.scope))
            .unwrap_or_default();
        let mut cleared = 0usize;
        while let Some(scope) = pending.pop() {
            if let Some(cache) = self.shared.repo.get(&scope) {
                pending.extend(cache.child_scopes(&scope).unwrap_or_default());
            }
            self.shared.repo.persist(&scope, None);
            cleared += 1;
        }
        self.commit(CacheEvent::Cleared);
        info!(scope = %self.scope, descendants = cleared, "cleared cache");
    }
}
