//! # Photo Search
//!
//! Client core for a remote image-search API that renders large,
//! continuously scrolled result sets without duplicate network work.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────┐ pages ┌──────────────────┐ replace/append ┌──────────────────┐
//! │   Transport   │──────▶│  SearchSession   │───────────────▶│ ResultAggregator │
//! │ (Unsplash API)│       │ state + paging   │                └──────────────────┘
//! └───────┬───────┘       └────────┬─────────┘
//!         │ bytes                  │ image_for(index)
//!         ▼                        ▼
//! ┌──────────────────────────────────────────┐
//! │ FetchCache: memory ▸ in-flight ▸ disk     │──▶ KeyCodec, DiskStore
//! └──────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! export CLIENT_ID=...                 # Unsplash access key
//! photos search cats --pages 2
//! photos search cats --download        # fill the image cache
//! photos fetch https://images.unsplash.com/photo-... --out cat.jpg
//! photos cache list
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Locators, variants, result descriptors, pages |
//! | [`error`] | Error taxonomy |
//! | [`key_codec`] | Locator → filesystem-safe cache key |
//! | [`disk_store`] | Write-once persistent byte store |
//! | [`fetch_cache`] | Deduplicating memory + disk cache |
//! | [`aggregator`] | Paged result set with append ranges |
//! | [`session`] | Search state machine and view notifications |
//! | [`transport`] | Network seam and the Unsplash implementation |

pub mod aggregator;
pub mod config;
pub mod disk_store;
pub mod error;
pub mod fetch_cache;
pub mod key_codec;
pub mod models;
pub mod session;
pub mod transport;
