//! Recursive reductions over a scope's directory tree.
//!
//! [`Fetcher::reduce`] walks pages and subdirectories, fetching whatever is
//! missing. [`Fetcher::reduce_sync`] only looks at cached data and gives up
//! if any level it needs is not fully cached.

use futures::future::{try_join, try_join_all, BoxFuture};
use futures::FutureExt;
use tracing::{debug, warn};

use super::cache::{Cache, CacheEvent};
use super::error::Result;
use super::fetcher::Fetcher;
use super::metadata::Metadata;
use super::rows::{Dir, File, Page};
use super::scope::Scope;

/// Receives each scope's aggregate as soon as it is known.
pub type ProgressFn<'a> = dyn Fn(&Scope, &Metadata) + Send + Sync + 'a;

impl Fetcher {
    /// Reduce this level, from page `page_index` on.
    ///
    /// Subdirectories are mapped with `dir_fn` and files with `file_fn`. The
    /// subdirectories, the files of this page, and the remaining pages are
    /// evaluated concurrently, then combined in that order.
    pub fn reduce<'r, T>(
        &'r self,
        dir_fn: &'r (dyn Fn(&Dir) -> BoxFuture<'r, Result<T>> + Send + Sync),
        file_fn: &'r (dyn Fn(&File) -> T + Send + Sync),
        combine: fn(T, T) -> T,
        init: T,
        page_index: usize,
    ) -> BoxFuture<'r, Result<T>>
    where
        T: Clone + Send + 'r,
    {
        async move {
            let page = self.get_page(page_index).await?;

            let dirs = try_join_all(page.dirs.iter().map(dir_fn));
            let truncated = page.truncated;
            let rest_init = init.clone();
            let rest = async move {
                if truncated {
                    self.reduce(dir_fn, file_fn, combine, rest_init, page_index + 1)
                        .await
                        .map(Some)
                } else {
                    Ok(None)
                }
            };
            let (dir_values, rest) = try_join(dirs, rest).await?;

            let mut total = init;
            for value in dir_values {
                total = combine(total, value);
            }
            for file in &page.files {
                total = combine(total, file_fn(file));
            }
            if let Some(rest) = rest {
                total = combine(total, rest);
            }
            Ok(total)
        }
        .boxed()
    }

    /// Reduce this level from cache alone.
    ///
    /// Returns `None` unless every page of this level is cached and `dir_fn`
    /// produces a value for every subdirectory.
    pub fn reduce_sync<T>(
        &self,
        dir_fn: &dyn Fn(&Dir) -> Option<T>,
        file_fn: &dyn Fn(&File) -> T,
        combine: fn(T, T) -> T,
        init: T,
    ) -> Option<T> {
        let pages: Vec<Page> = self.fresh(|cache| {
            let cache = cache?;
            cache.num_children?;
            cache
                .complete_pages()
                .map(|pages| pages.into_iter().cloned().collect())
        })?;

        let mut total = init;
        for page in &pages {
            for dir in &page.dirs {
                total = combine(total, dir_fn(dir)?);
            }
            for file in &page.files {
                total = combine(total, file_fn(file));
            }
        }
        Some(total)
    }

    /// The recursive aggregate of this scope, from cache only.
    ///
    /// A successful computation is stored on this scope's cache.
    pub fn check_metadata(&self) -> Option<Metadata> {
        if let Some(metadata) = self.fresh(|cache| cache.and_then(Cache::metadata)) {
            return Some(metadata);
        }
        let metadata = self.reduce_sync(
            &|dir| self.child(&dir.prefix).check_metadata(),
            &Metadata::for_file,
            Metadata::combine,
            Metadata::EMPTY_DIR,
        )?;
        self.maybe_save_metadata(&metadata);
        Some(metadata)
    }

    /// The recursive aggregate of this scope, fetching whatever is missing.
    pub async fn compute_metadata(&self) -> Result<Metadata> {
        self.compute_metadata_with_progress(None).await
    }

    /// Like [`Fetcher::compute_metadata`], reporting every scope's aggregate
    /// to `progress` as it completes, deepest first.
    pub fn compute_metadata_with_progress<'a>(
        &'a self,
        progress: Option<&'a ProgressFn<'a>>,
    ) -> BoxFuture<'a, Result<Metadata>> {
        async move {
            if let Some(metadata) = self.fresh(|cache| cache.and_then(Cache::metadata)) {
                debug!(scope = %self.scope, "metadata already cached");
                return Ok(metadata);
            }

            let metadata = self
                .reduce(
                    &|dir: &Dir| {
                        let child = self.child(&dir.prefix);
                        async move { child.compute_metadata_with_progress(progress).await }.boxed()
                    },
                    &Metadata::for_file,
                    Metadata::combine,
                    Metadata::EMPTY_DIR,
                    0,
                )
                .await?;

            self.maybe_save_metadata(&metadata);
            if let Some(progress) = progress {
                progress(&self.scope, &metadata);
            }
            Ok(metadata)
        }
        .boxed()
    }

    fn maybe_save_metadata(&self, metadata: &Metadata) {
        match self.fresh(|cache| cache.map(|c| c.metadata_differs(metadata))) {
            None => warn!(scope = %self.scope, "no cache to attach metadata to"),
            Some(false) => warn!(scope = %self.scope, ?metadata, "redundant metadata update"),
            Some(true) => self.commit(CacheEvent::MetadataComputed(*metadata)),
        }
    }
}
