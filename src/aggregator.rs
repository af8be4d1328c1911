//! Ordered result set accumulated across search pages.
//!
//! `replace` starts a new set (new query), `append` grows it (next page) and
//! reports the index range that was added so a view can redraw only those
//! cells. Both take the write lock for the whole mutation, so `count` and
//! `at` never observe a half-applied page.

use std::ops::Range;
use std::sync::RwLock;

use crate::error::{Error, Result};
use crate::models::{ResultDescriptor, ResultPage};

#[derive(Debug, Default)]
pub struct ResultAggregator {
    results: RwLock<Vec<ResultDescriptor>>,
}

impl ResultAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Discard the current set and take exactly the page's descriptors.
    pub fn replace(&self, page: ResultPage) {
        let mut results = self.results.write().unwrap();
        *results = page.results;
    }

    /// Append the page and return the added indices.
    ///
    /// For a set of size `S` and a page of size `K` this is `S..S + K`,
    /// i.e. the inclusive range `[S, S + K - 1]`. An empty page yields an
    /// empty range: nothing to redraw.
    pub fn append(&self, page: ResultPage) -> Range<usize> {
        let mut results = self.results.write().unwrap();
        let start = results.len();
        results.extend(page.results);
        start..results.len()
    }

    pub fn count(&self) -> usize {
        self.results.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    pub fn at(&self, index: usize) -> Result<ResultDescriptor> {
        let results = self.results.read().unwrap();
        results
            .get(index)
            .cloned()
            .ok_or(Error::IndexOutOfRange {
                index,
                count: results.len(),
            })
    }

    /// Descriptors in `range`, clamped to the current size.
    pub fn slice(&self, range: Range<usize>) -> Vec<ResultDescriptor> {
        let results = self.results.read().unwrap();
        let end = range.end.min(results.len());
        let start = range.start.min(end);
        results[start..end].to_vec()
    }

    pub fn snapshot(&self) -> Vec<ResultDescriptor> {
        self.results.read().unwrap().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PhotoUrls, ResourceLocator};
    use std::sync::Arc;

    fn descriptor(id: &str) -> ResultDescriptor {
        ResultDescriptor {
            id: id.to_string(),
            urls: PhotoUrls {
                thumb: ResourceLocator::new(format!("https://t/{}", id)),
                regular: ResourceLocator::new(format!("https://r/{}", id)),
            },
            description: None,
            alt_description: None,
            width: None,
            height: None,
        }
    }

    fn page(n: u32, ids: std::ops::Range<usize>) -> ResultPage {
        ResultPage::new(n, ids.map(|i| descriptor(&format!("p{}-{}", n, i))).collect())
    }

    #[test]
    fn test_append_range_and_count() {
        let agg = ResultAggregator::new();
        agg.replace(page(1, 0..20));
        assert_eq!(agg.count(), 20);

        let range = agg.append(page(2, 0..20));
        assert_eq!(range, 20..40);
        assert_eq!(range.start, 20);
        assert_eq!(range.end - 1, 39);
        assert_eq!(agg.count(), 40);

        for (size, k) in [(40usize, 7usize), (47, 1), (48, 30)] {
            let range = agg.append(page(3, 0..k));
            assert_eq!(range, size..size + k);
            assert_eq!(agg.count(), size + k);
        }
    }

    #[test]
    fn test_append_preserves_order() {
        let agg = ResultAggregator::new();
        agg.replace(page(1, 0..3));
        agg.append(page(2, 0..2));
        let ids: Vec<String> = agg.snapshot().into_iter().map(|d| d.id).collect();
        assert_eq!(ids, vec!["p1-0", "p1-1", "p1-2", "p2-0", "p2-1"]);
    }

    #[test]
    fn test_empty_append_yields_empty_range() {
        let agg = ResultAggregator::new();
        agg.replace(page(1, 0..5));
        let range = agg.append(page(2, 0..0));
        assert!(range.is_empty());
        assert_eq!(range.start, 5);
        assert_eq!(agg.count(), 5);

        let fresh = ResultAggregator::new();
        assert!(fresh.append(page(1, 0..0)).is_empty());
    }

    #[test]
    fn test_replace_resets_size() {
        let agg = ResultAggregator::new();
        agg.replace(page(1, 0..20));
        agg.append(page(2, 0..20));
        agg.replace(page(1, 0..4));
        assert_eq!(agg.count(), 4);
        assert_eq!(agg.append(page(2, 0..4)), 4..8);

        agg.replace(page(1, 0..0));
        assert!(agg.is_empty());
    }

    #[test]
    fn test_at_and_out_of_range() {
        let agg = ResultAggregator::new();
        agg.replace(page(1, 0..2));
        assert_eq!(agg.at(1).unwrap().id, "p1-1");
        assert_eq!(
            agg.at(2).unwrap_err(),
            Error::IndexOutOfRange { index: 2, count: 2 }
        );
    }

    #[test]
    fn test_slice_clamps() {
        let agg = ResultAggregator::new();
        agg.replace(page(1, 0..5));
        assert_eq!(agg.slice(3..10).len(), 2);
        assert!(agg.slice(8..10).is_empty());
    }

    #[test]
    fn test_readers_never_see_partial_page() {
        let agg = Arc::new(ResultAggregator::new());
        agg.replace(page(1, 0..10));

        let writer = {
            let agg = agg.clone();
            std::thread::spawn(move || {
                for n in 2..200 {
                    agg.append(page(n, 0..10));
                }
            })
        };
        for _ in 0..2_000 {
            assert_eq!(agg.count() % 10, 0);
        }
        writer.join().unwrap();
        assert_eq!(agg.count(), 10 * 199);
    }
}
