//! HTTP page extractor
//!
//! This module fetches server-rendered catalog pages with reqwest and reads
//! their fields with scraper. Selectors match on class substrings, the way
//! the catalog marks its elements.

use crate::config::{Config, UserAgentConfig};
use crate::extract::{
    fields, BundleFields, BundlePage, EntryFields, ExtractionError, PageExtractor,
};
use async_trait::async_trait;
use reqwest::{redirect::Policy, Client};
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;
use url::Url;

const TITLE_SELECTOR: &str = "[class*='apphub_AppName']";
const PRICE_WRAPPER_SELECTOR: &str = "[class*='game_area_purchase_game_wrapper']";
const ORIGINAL_PRICE_SELECTOR: &str = "[class*='discount_original_price']";
const PURCHASE_PRICE_SELECTOR: &str = "[class*='game_purchase_price']";
const REVIEW_ROW_SELECTOR: &str = "[class*='user_reviews_summary_row']";
const REVIEW_SUMMARY_SELECTOR: &str =
    "[class*='review_box_background_secondary'], [class*='game_review_summary']";
const TAG_SELECTOR: &str = "[class*='popular_tags'] [class*='app_tag']";
const RELEASE_DATE_SELECTOR: &str = "[class*='release_date'] .date";
const RELEASE_BLOCK_SELECTOR: &str = "[class*='release_date']";

const BUNDLE_TITLE_SELECTOR: &str = "[class*='pageheader']";
const BUNDLE_DISCOUNT_SELECTOR: &str = "[class*='discount_pct']";
const BUNDLE_FINAL_PRICE_SELECTOR: &str = "[class*='discount_final_price']";
const BUNDLE_PRICE_SELECTOR: &str = ".price";
const BUNDLE_MEMBER_SELECTOR: &str =
    "[class*='tab_item'] a[href*='/app/'], a[class*='tab_item'][href*='/app/']";
const ANY_APP_LINK_SELECTOR: &str = "a[href*='/app/']";
const BUNDLE_LINK_SELECTOR: &str = "a[href*='/bundle/']";

/// Builds the HTTP client used for catalog pages
///
/// # Arguments
///
/// * `config` - The user agent configuration
/// * `timeout` - Bound on each request, the extractor's readiness wait
/// * `https_only` - Refuse plain-HTTP URLs
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(
    config: &UserAgentConfig,
    timeout: Duration,
    https_only: bool,
) -> Result<Client, reqwest::Error> {
    // Format: CrawlerName/Version (+ContactURL; ContactEmail)
    let user_agent = format!(
        "{}/{} (+{}; {})",
        config.crawler_name, config.crawler_version, config.contact_url, config.contact_email
    );

    Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .redirect(Policy::limited(10))
        .https_only(https_only)
        .gzip(true)
        .brotli(true)
        .build()
}

/// [`PageExtractor`] over plain HTTP
pub struct HttpPageExtractor {
    client: Client,
}

impl HttpPageExtractor {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Builds the extractor from the run configuration
    pub fn from_config(config: &Config) -> Result<Self, reqwest::Error> {
        let client = build_http_client(
            &config.user_agent,
            Duration::from_secs(config.crawler.request_timeout_secs),
            config.crawler.https_only,
        )?;
        Ok(Self::new(client))
    }

    /// Fetches a page body; exactly one request, no retries
    async fn fetch_document(&self, url: &str) -> Result<String, ExtractionError> {
        tracing::debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| classify_request_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ExtractionError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response
            .text()
            .await
            .map_err(|e| classify_request_error(url, e))
    }
}

fn classify_request_error(url: &str, error: reqwest::Error) -> ExtractionError {
    if error.is_timeout() {
        ExtractionError::Timeout {
            url: url.to_string(),
        }
    } else {
        ExtractionError::Request {
            url: url.to_string(),
            message: error.to_string(),
        }
    }
}

#[async_trait]
impl PageExtractor for HttpPageExtractor {
    async fn extract_entry(&self, url: &str) -> Result<EntryFields, ExtractionError> {
        let body = self.fetch_document(url).await?;
        Ok(parse_entry_html(&body))
    }

    async fn extract_bundle(&self, url: &str) -> Result<BundleFields, ExtractionError> {
        let body = self.fetch_document(url).await?;
        Ok(parse_bundle_page_html(&body, url).fields)
    }

    async fn extract_bundle_members(&self, url: &str) -> Result<Vec<String>, ExtractionError> {
        let body = self.fetch_document(url).await?;
        Ok(parse_bundle_page_html(&body, url).members)
    }

    async fn extract_bundle_page(&self, url: &str) -> Result<BundlePage, ExtractionError> {
        let body = self.fetch_document(url).await?;
        Ok(parse_bundle_page_html(&body, url))
    }

    async fn extract_bundle_list(&self, url: &str) -> Result<Vec<String>, ExtractionError> {
        let body = self.fetch_document(url).await?;
        Ok(parse_bundle_list_html(&body, url))
    }
}

/// Reads entry fields from an app page
pub fn parse_entry_html(html: &str) -> EntryFields {
    let document = Html::parse_document(html);

    EntryFields {
        title: first_text(&document, TITLE_SELECTOR),
        price_text: extract_entry_price(&document),
        rating_text: extract_rating_text(&document),
        tags: extract_tags(&document),
        release_date_text: extract_release_date(&document),
    }
}

/// Reads header fields and member links from a bundle page
///
/// Relative member links are resolved against `page_url`.
pub fn parse_bundle_page_html(html: &str, page_url: &str) -> BundlePage {
    let document = Html::parse_document(html);

    let fields = BundleFields {
        title: first_text(&document, BUNDLE_TITLE_SELECTOR),
        discount_text: first_text(&document, BUNDLE_DISCOUNT_SELECTOR),
        price_text: first_text(&document, BUNDLE_FINAL_PRICE_SELECTOR)
            .or_else(|| first_text(&document, BUNDLE_PRICE_SELECTOR)),
        tags: extract_tags(&document),
    };

    let mut members = collect_links(&document, BUNDLE_MEMBER_SELECTOR, page_url);
    if members.is_empty() {
        members = collect_links(&document, ANY_APP_LINK_SELECTOR, page_url);
    }

    BundlePage { fields, members }
}

/// Reads the bundle links from a bundle-list page
pub fn parse_bundle_list_html(html: &str, page_url: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    collect_links(&document, BUNDLE_LINK_SELECTOR, page_url)
}

/// Collapses an element's text to single-spaced words
fn element_text(element: &ElementRef) -> String {
    element
        .text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Text of the first non-empty match for `selector`
fn first_text(document: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;

    document
        .select(&selector)
        .map(|element| element_text(&element))
        .find(|text| !text.is_empty())
}

fn extract_entry_price(document: &Html) -> Option<String> {
    let wrapper = Selector::parse(PRICE_WRAPPER_SELECTOR).ok()?;
    let original = Selector::parse(ORIGINAL_PRICE_SELECTOR).ok()?;
    let purchase = Selector::parse(PURCHASE_PRICE_SELECTOR).ok()?;

    // The first purchase box is the base game; later ones are DLC or packages
    document.select(&wrapper).find_map(|block| {
        block
            .select(&original)
            .chain(block.select(&purchase))
            .map(|element| element_text(&element))
            .find(|text| !text.is_empty())
    })
}

/// Phrases marking the recent-reviews summary rather than the overall one
const RECENT_REVIEW_MARKERS: [&str; 2] = ["in the last 30 days", "de seneste 30 dage"];

fn is_recent_summary(text: &str) -> bool {
    let lower = text.to_lowercase();
    RECENT_REVIEW_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// Overall review summary text, preferring candidates the rating parser understands
///
/// Pages list the recent-reviews row before the all-reviews row; recent
/// summaries are never returned.
fn extract_rating_text(document: &Html) -> Option<String> {
    let mut candidates = Vec::new();

    if let Ok(row_selector) = Selector::parse(REVIEW_ROW_SELECTOR) {
        for row in document.select(&row_selector) {
            if let Some(tooltip) = row.value().attr("data-tooltip-html") {
                candidates.push(tooltip.trim().to_string());
            }
            candidates.push(element_text(&row));
        }
    }

    if let Ok(summary_selector) = Selector::parse(REVIEW_SUMMARY_SELECTOR) {
        for summary in document.select(&summary_selector) {
            candidates.push(element_text(&summary));
        }
    }

    candidates.retain(|text| !text.is_empty() && !is_recent_summary(text));

    let parseable = candidates
        .iter()
        .position(|text| fields::parse_rating(text).is_some());

    match parseable {
        Some(index) => Some(candidates.swap_remove(index)),
        None => candidates.into_iter().next(),
    }
}

fn extract_tags(document: &Html) -> Vec<String> {
    let Ok(selector) = Selector::parse(TAG_SELECTOR) else {
        return Vec::new();
    };

    document
        .select(&selector)
        .filter(|element| !element.value().classes().any(|class| class == "add_button"))
        .map(|element| element_text(&element))
        .filter(|text| !text.is_empty() && text != "+")
        .collect()
}

fn extract_release_date(document: &Html) -> Option<String> {
    if let Some(date) = first_text(document, RELEASE_DATE_SELECTOR) {
        return Some(date);
    }

    // Without a .date child, the block's last line holds the date
    let block = Selector::parse(RELEASE_BLOCK_SELECTOR).ok()?;
    document.select(&block).find_map(|element| {
        let text: String = element.text().collect();
        text.lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .last()
            .map(str::to_string)
    })
}

/// Absolute hrefs of every `selector` match, first occurrence kept
fn collect_links(document: &Html, selector: &str, page_url: &str) -> Vec<String> {
    let Ok(selector) = Selector::parse(selector) else {
        return Vec::new();
    };
    let base = Url::parse(page_url).ok();

    let mut links: Vec<String> = Vec::new();
    for element in document.select(&selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };

        let absolute = match &base {
            Some(base) => match base.join(href.trim()) {
                Ok(url) => url.to_string(),
                Err(e) => {
                    tracing::debug!("Skipping link {}: {}", href, e);
                    continue;
                }
            },
            None => href.trim().to_string(),
        };

        if !links.contains(&absolute) {
            links.push(absolute);
        }
    }

    links
}
