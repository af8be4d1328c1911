//! Core data models: locators, variants, result descriptors and pages.
//!
//! These types flow from the transport (decoded API responses) through the
//! aggregator to the fetch cache.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Address of one fetchable byte blob (a thumbnail or full-size image URL).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceLocator(String);

impl ResourceLocator {
    pub fn new(locator: impl Into<String>) -> Self {
        Self(locator.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceLocator {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ResourceLocator {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Rendition of a result image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Variant {
    /// Small rendition used for grid cells.
    #[default]
    Thumb,
    /// Full-size rendition used for the detail view.
    Regular,
}

impl Variant {
    /// Tag mixed into the cache key. Thumbnails carry none.
    pub fn tag(self) -> Option<&'static str> {
        match self {
            Variant::Thumb => None,
            Variant::Regular => Some("large"),
        }
    }

    pub fn from_tag(tag: Option<&str>) -> Option<Self> {
        match tag {
            None => Some(Variant::Thumb),
            Some("large") => Some(Variant::Regular),
            Some(_) => None,
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variant::Thumb => f.pad("thumb"),
            Variant::Regular => f.pad("regular"),
        }
    }
}

impl FromStr for Variant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "thumb" | "thumbnail" => Ok(Variant::Thumb),
            "regular" | "large" => Ok(Variant::Regular),
            other => Err(format!(
                "unknown variant '{}'. Use thumb or regular.",
                other
            )),
        }
    }
}

/// Image URLs attached to one search hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoUrls {
    pub thumb: ResourceLocator,
    pub regular: ResourceLocator,
}

/// One search hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultDescriptor {
    pub id: String,
    pub urls: PhotoUrls,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub alt_description: Option<String>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}

impl ResultDescriptor {
    pub fn locator(&self, variant: Variant) -> &ResourceLocator {
        match variant {
            Variant::Thumb => &self.urls.thumb,
            Variant::Regular => &self.urls.regular,
        }
    }

    /// Human-readable caption, preferring the author's description.
    pub fn caption(&self) -> Option<&str> {
        self.description
            .as_deref()
            .or(self.alt_description.as_deref())
    }
}

/// One page of search results as returned by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultPage {
    /// 1-based page number this page was fetched at.
    pub page: u32,
    pub results: Vec<ResultDescriptor>,
    /// Total hit count reported by the API, if any.
    pub total: Option<u64>,
    /// Total page count reported by the API, if any.
    pub total_pages: Option<u32>,
}

impl ResultPage {
    pub fn new(page: u32, results: Vec<ResultDescriptor>) -> Self {
        Self {
            page,
            results,
            total: None,
            total_pages: None,
        }
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

/// Wire shape of `GET /search/photos`.
#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub total_pages: Option<u32>,
    pub results: Vec<ResultDescriptor>,
}

impl SearchResponse {
    pub fn into_page(self, page: u32) -> ResultPage {
        ResultPage {
            page,
            results: self.results,
            total: self.total,
            total_pages: self.total_pages,
        }
    }
}
