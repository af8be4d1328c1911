//! Search session: query state, paging and view notifications.
//!
//! # States
//!
//! ```text
//!          start_search               page 1 ok
//!  Idle ───────────────▶ Searching ─────────────▶ Loaded ◀──┐
//!                           │                       │        │ page ok / page error
//!                           │ error                 │ advance_page
//!                           ▼                       ▼        │
//!                         Failed               PagingNext ───┘
//! ```
//!
//! `start_search` is accepted from any state and supersedes whatever was
//! running: each search bumps a generation counter, and responses tagged
//! with an older generation are dropped. `advance_page` only runs from
//! `Loaded`, which serializes page fetches: a second call while a page is
//! outstanding returns `None` without touching the network.
//!
//! The result set is only mutated after a page has arrived successfully;
//! a failed fetch leaves it as it was and reports through
//! [`SearchView::on_error`].

use std::ops::Range;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

use crate::aggregator::ResultAggregator;
use crate::error::Result;
use crate::fetch_cache::{FetchCache, ImageBytes};
use crate::models::{ResourceLocator, Variant};
use crate::transport::Transport;

/// Presentation-layer callbacks.
///
/// Callbacks run on the task that drove the session and without any
/// session lock held, so implementations may call back into the session.
pub trait SearchView: Send + Sync {
    /// Fired once, before the first search of the session.
    fn on_first_search(&self) {}
    fn on_loading_started(&self);
    fn on_results_ready(&self, count: usize);
    fn on_no_results(&self);
    /// Indices appended by the latest page.
    fn on_partial_reload(&self, range: Range<usize>);
    fn on_error(&self, title: &str, message: &str);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Searching,
    Loaded,
    PagingNext,
    Failed,
}

#[derive(Debug)]
struct SessionState {
    query: Option<String>,
    /// Last page merged into the result set.
    page: u32,
    phase: Phase,
    has_searched_before: bool,
    generation: u64,
    /// Page count reported by the API; paging stops once reached.
    total_pages: Option<u32>,
}

/// Whether the view should ask for the next page.
///
/// True once `visible_index` is within half of `loaded_count` from the end.
/// The last loaded index always qualifies.
pub fn should_prefetch(visible_index: usize, loaded_count: usize) -> bool {
    loaded_count > 0 && visible_index >= loaded_count / 2
}

pub struct SearchSession {
    transport: Arc<dyn Transport>,
    cache: FetchCache,
    results: ResultAggregator,
    view: Arc<dyn SearchView>,
    page_size: u32,
    state: Mutex<SessionState>,
}

impl SearchSession {
    pub fn new(
        transport: Arc<dyn Transport>,
        cache: FetchCache,
        view: Arc<dyn SearchView>,
        page_size: u32,
    ) -> Self {
        Self {
            transport,
            cache,
            results: ResultAggregator::new(),
            view,
            page_size,
            state: Mutex::new(SessionState {
                query: None,
                page: 0,
                phase: Phase::Idle,
                has_searched_before: false,
                generation: 0,
                total_pages: None,
            }),
        }
    }

    /// Run a new search and load its first page.
    ///
    /// The result set is replaced only when page 1 arrives. On failure the
    /// previous results stay in place, the view receives `on_error` and the
    /// error is returned.
    pub async fn start_search(&self, query: &str) -> Result<()> {
        let (generation, first) = {
            let mut state = self.state.lock().unwrap();
            state.generation += 1;
            state.query = Some(query.to_string());
            state.page = 1;
            state.phase = Phase::Searching;
            state.total_pages = None;
            let first = !state.has_searched_before;
            state.has_searched_before = true;
            (state.generation, first)
        };

        if first {
            self.view.on_first_search();
        }
        self.view.on_loading_started();
        info!(query, "search started");

        let fetched = self
            .transport
            .search_photos(query, 1, self.page_size)
            .await;

        let mut state = self.state.lock().unwrap();
        if state.generation != generation {
            debug!(query, "discarding results of superseded search");
            return Ok(());
        }

        match fetched {
            Ok(page) => {
                state.total_pages = page.total_pages;
                self.results.replace(page);
                state.phase = Phase::Loaded;
                drop(state);

                let count = self.results.count();
                info!(query, count, "first page loaded");
                if count == 0 {
                    self.view.on_no_results();
                } else {
                    self.view.on_results_ready(count);
                }
                Ok(())
            }
            Err(e) => {
                state.phase = Phase::Failed;
                drop(state);
                self.report(&e);
                Err(e)
            }
        }
    }

    /// Fetch and append the next page of the current query.
    ///
    /// Returns the appended index range, or `None` when no fetch was made:
    /// not in `Loaded`, a page fetch already outstanding, the last page
    /// already loaded, or a newer search started meanwhile.
    pub async fn advance_page(&self) -> Result<Option<Range<usize>>> {
        let (query, next, generation) = {
            let mut state = self.state.lock().unwrap();
            if state.phase != Phase::Loaded {
                return Ok(None);
            }
            let Some(query) = state.query.clone() else {
                return Ok(None);
            };
            if matches!(state.total_pages, Some(total) if state.page >= total) {
                debug!(page = state.page, "no more pages");
                return Ok(None);
            }
            state.phase = Phase::PagingNext;
            (query, state.page + 1, state.generation)
        };

        let fetched = self
            .transport
            .search_photos(&query, next, self.page_size)
            .await;

        let mut state = self.state.lock().unwrap();
        if state.generation != generation {
            debug!(page = next, "discarding page of superseded search");
            return Ok(None);
        }

        match fetched {
            Ok(page) => {
                state.page = next;
                if page.is_empty() {
                    state.total_pages = Some(next);
                } else if page.total_pages.is_some() {
                    state.total_pages = page.total_pages;
                }
                let range = self.results.append(page);
                state.phase = Phase::Loaded;
                drop(state);

                debug!(page = next, start = range.start, end = range.end, "page appended");
                if !range.is_empty() {
                    self.view.on_partial_reload(range.clone());
                }
                Ok(Some(range))
            }
            Err(e) => {
                state.phase = Phase::Loaded;
                drop(state);
                self.report(&e);
                Err(e)
            }
        }
    }

    /// Advance when [`should_prefetch`] says the view is close to the end.
    pub async fn maybe_prefetch(&self, visible_index: usize) -> Result<Option<Range<usize>>> {
        if should_prefetch(visible_index, self.results.count()) {
            self.advance_page().await
        } else {
            Ok(None)
        }
    }

    /// Bytes of one result's image, through the shared cache.
    pub async fn image_for(&self, index: usize, variant: Variant) -> Result<ImageBytes> {
        let descriptor = self.results.at(index)?;
        self.cache.get(descriptor.locator(variant), variant).await
    }

    /// Best-effort batch of images for a range of results.
    pub async fn images_for(&self, range: Range<usize>, variant: Variant) -> Vec<ImageBytes> {
        let locators: Vec<ResourceLocator> = self
            .results
            .slice(range)
            .iter()
            .map(|d| d.locator(variant).clone())
            .collect();
        self.cache.get_many(&locators, variant).await
    }

    fn report(&self, error: &crate::error::Error) {
        let (title, message) = error.user_message();
        self.view.on_error(&title, &message);
    }

    pub fn results(&self) -> &ResultAggregator {
        &self.results
    }

    pub fn cache(&self) -> &FetchCache {
        &self.cache
    }

    pub fn phase(&self) -> Phase {
        self.state.lock().unwrap().phase
    }

    pub fn query(&self) -> Option<String> {
        self.state.lock().unwrap().query.clone()
    }

    /// Last page merged into the result set (0 before any search).
    pub fn page(&self) -> u32 {
        self.state.lock().unwrap().page
    }

    pub fn has_searched_before(&self) -> bool {
        self.state.lock().unwrap().has_searched_before
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_prefetch_half_threshold() {
        assert!(!should_prefetch(0, 0));
        assert!(!should_prefetch(5, 0));

        assert!(!should_prefetch(0, 20));
        assert!(!should_prefetch(9, 20));
        assert!(should_prefetch(10, 20));
        assert!(should_prefetch(19, 20));

        // Odd counts round the threshold down.
        assert!(!should_prefetch(9, 21));
        assert!(should_prefetch(10, 21));

        assert!(!should_prefetch(0, 2));
        assert!(should_prefetch(1, 2));

        // A single loaded item is also the last one.
        assert!(should_prefetch(0, 1));
    }
}
