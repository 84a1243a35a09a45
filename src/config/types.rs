use serde::Deserialize;

/// Main configuration structure for Bundle-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
    #[serde(default, rename = "target")]
    pub targets: Vec<TargetEntry>,
}

/// Crawl pacing and cache policy
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Lower bound of the politeness delay between live fetches (milliseconds)
    #[serde(rename = "min-delay-ms", default = "default_min_delay_ms")]
    pub min_delay_ms: u64,

    /// Upper bound of the politeness delay (milliseconds)
    #[serde(rename = "max-delay-ms", default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// How long a cached record stays fresh
    #[serde(rename = "staleness-days", default = "default_staleness_days")]
    pub staleness_days: u32,

    /// Re-fetch cached records older than the staleness window
    #[serde(rename = "refresh-stale", default)]
    pub refresh_stale: bool,

    /// Bounded wait for a page to arrive
    #[serde(rename = "request-timeout-secs", default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(rename = "https-only", default = "default_https_only")]
    pub https_only: bool,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            min_delay_ms: default_min_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            staleness_days: default_staleness_days(),
            refresh_stale: false,
            request_timeout_secs: default_request_timeout_secs(),
            https_only: default_https_only(),
        }
    }
}

/// Where the catalog lives and which locale its pages are requested in
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogConfig {
    #[serde(rename = "base-origin", default = "default_base_origin")]
    pub base_origin: String,

    #[serde(default = "default_language")]
    pub language: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_origin: default_base_origin(),
            language: default_language(),
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

/// One target listed in the config file
#[derive(Debug, Clone, Deserialize)]
pub struct TargetEntry {
    /// Target kind: "app", "bundle" or "bundlelist"
    pub kind: String,

    /// Numeric id or catalog URL
    pub reference: String,
}

fn default_min_delay_ms() -> u64 {
    2000
}

fn default_max_delay_ms() -> u64 {
    5000
}

fn default_staleness_days() -> u32 {
    30
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_https_only() -> bool {
    true
}

fn default_base_origin() -> String {
    "https://store.steampowered.com".to_string()
}

fn default_language() -> String {
    "english".to_string()
}
