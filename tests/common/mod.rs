//! Shared fakes for the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashSet;
use std::ops::Range;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use photo_search::error::{Error, Result};
use photo_search::models::{PhotoUrls, ResourceLocator, ResultDescriptor, ResultPage};
use photo_search::session::SearchView;
use photo_search::transport::Transport;

/// In-memory search API.
///
/// Every query has `total_pages` full pages with ids `<query>-<page>-<i>`.
/// The query `"nothing"` has no results. Individual `(query, page)` pairs
/// and image locators containing `broken` can be made to fail.
pub struct FakeApi {
    pub total_pages: u32,
    pub delay: Duration,
    failing: Mutex<HashSet<(String, u32)>>,
    pub search_calls: AtomicUsize,
    pub fetch_calls: AtomicUsize,
}

impl FakeApi {
    pub fn new(total_pages: u32) -> Self {
        Self {
            total_pages,
            delay: Duration::from_millis(10),
            failing: Mutex::new(HashSet::new()),
            search_calls: AtomicUsize::new(0),
            fetch_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn fail(&self, query: &str, page: u32) {
        self.failing
            .lock()
            .unwrap()
            .insert((query.to_string(), page));
    }

    pub fn heal(&self, query: &str, page: u32) {
        self.failing
            .lock()
            .unwrap()
            .remove(&(query.to_string(), page));
    }

    pub fn searches(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    pub fn fetches(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }
}

pub fn descriptor(id: &str) -> ResultDescriptor {
    ResultDescriptor {
        id: id.to_string(),
        urls: PhotoUrls {
            thumb: ResourceLocator::new(format!("https://img.test/{}?w=200", id)),
            regular: ResourceLocator::new(format!("https://img.test/{}?w=1080", id)),
        },
        description: None,
        alt_description: Some(format!("photo {}", id)),
        width: Some(4000),
        height: Some(3000),
    }
}

#[async_trait]
impl Transport for FakeApi {
    async fn search_photos(&self, query: &str, page: u32, page_size: u32) -> Result<ResultPage> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;

        if self
            .failing
            .lock()
            .unwrap()
            .contains(&(query.to_string(), page))
        {
            return Err(Error::TransportFailure(format!(
                "page {} of {:?} timed out",
                page, query
            )));
        }

        let (results, total_pages) = if query == "nothing" || page > self.total_pages {
            (Vec::new(), if query == "nothing" { 0 } else { self.total_pages })
        } else {
            let results = (0..page_size)
                .map(|i| descriptor(&format!("{}-{}-{}", query, page, i)))
                .collect();
            (results, self.total_pages)
        };

        Ok(ResultPage {
            page,
            results,
            total: Some(u64::from(total_pages) * u64::from(page_size)),
            total_pages: Some(total_pages),
        })
    }

    async fn fetch_bytes(&self, locator: &ResourceLocator) -> Result<Vec<u8>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        if locator.as_str().contains("broken") {
            return Err(Error::TransportFailure("404 Not Found".into()));
        }
        Ok(format!("img:{}", locator).into_bytes())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    FirstSearch,
    Loading,
    Ready(usize),
    NoResults,
    Partial(Range<usize>),
    Error(String, String),
}

/// Records every notification in order.
#[derive(Default)]
pub struct RecordingView {
    events: Mutex<Vec<Event>>,
}

impl RecordingView {
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }

    fn push(&self, e: Event) {
        self.events.lock().unwrap().push(e);
    }
}

impl SearchView for RecordingView {
    fn on_first_search(&self) {
        self.push(Event::FirstSearch);
    }

    fn on_loading_started(&self) {
        self.push(Event::Loading);
    }

    fn on_results_ready(&self, count: usize) {
        self.push(Event::Ready(count));
    }

    fn on_no_results(&self) {
        self.push(Event::NoResults);
    }

    fn on_partial_reload(&self, range: Range<usize>) {
        self.push(Event::Partial(range));
    }

    fn on_error(&self, title: &str, message: &str) {
        self.push(Event::Error(title.to_string(), message.to_string()));
    }
}
