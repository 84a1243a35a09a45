//! Page extraction for Bundle-Harvest
//!
//! This module defines the contract between the crawl orchestrator and
//! whatever renders catalog pages:
//! - `PageExtractor`: fetches a canonical URL and returns raw field text
//! - `fields`: parsers turning that text into prices, ratings, dates and tags
//! - `http`: the reqwest + scraper implementation for server-rendered pages
//!
//! Extractors report raw text; validation and record assembly belong to the
//! orchestrator, so a fake extractor in tests exercises the same code paths.

pub mod fields;
mod http;

pub use fields::{normalize_tags, parse_discount, parse_price, parse_rating, parse_release_date};
pub use http::{
    build_http_client, parse_bundle_list_html, parse_bundle_page_html, parse_entry_html,
    HttpPageExtractor,
};

use async_trait::async_trait;
use thiserror::Error;

/// Why a page could not yield the fields a record needs
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionError {
    #[error("Request to {url} failed: {message}")]
    Request { url: String, message: String },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("Timed out waiting for {url}")]
    Timeout { url: String },

    #[error("Required field '{0}' is missing")]
    MissingField(&'static str),

    #[error("Field '{field}' could not be parsed from '{text}'")]
    Unparseable { field: &'static str, text: String },
}

/// Raw text of an entry page's fields
///
/// `None` means the element was not present on the page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryFields {
    pub title: Option<String>,
    pub price_text: Option<String>,
    pub rating_text: Option<String>,
    pub tags: Vec<String>,
    pub release_date_text: Option<String>,
}

/// Raw text of a bundle page's header fields
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BundleFields {
    pub title: Option<String>,
    pub discount_text: Option<String>,
    pub price_text: Option<String>,
    pub tags: Vec<String>,
}

/// Everything a bundle target needs from its page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BundlePage {
    pub fields: BundleFields,
    /// Absolute member entry URLs, in page order
    pub members: Vec<String>,
}

/// Source of catalog page fields
///
/// Implementations apply their own bounded wait for a page and never retry;
/// a retry is a later run.
#[async_trait]
pub trait PageExtractor: Send + Sync {
    /// Extracts the fields of an entry page
    async fn extract_entry(&self, url: &str) -> Result<EntryFields, ExtractionError>;

    /// Extracts the header fields of a bundle page
    async fn extract_bundle(&self, url: &str) -> Result<BundleFields, ExtractionError>;

    /// Extracts the member entry URLs listed on a bundle page
    async fn extract_bundle_members(&self, url: &str) -> Result<Vec<String>, ExtractionError>;

    /// Extracts header fields and members of a bundle page together
    ///
    /// The default calls [`extract_bundle`](Self::extract_bundle) and then
    /// [`extract_bundle_members`](Self::extract_bundle_members); implementations
    /// that can read both from one fetch should override it.
    async fn extract_bundle_page(&self, url: &str) -> Result<BundlePage, ExtractionError> {
        let fields = self.extract_bundle(url).await?;
        let members = self.extract_bundle_members(url).await?;
        Ok(BundlePage { fields, members })
    }

    /// Extracts the bundle URLs listed on a bundle-list page
    async fn extract_bundle_list(&self, url: &str) -> Result<Vec<String>, ExtractionError>;
}
