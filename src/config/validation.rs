use crate::config::types::{CatalogConfig, Config, CrawlerConfig, OutputConfig, UserAgentConfig};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
///
/// Target entries are not checked here: an unrecognized kind or reference is
/// a per-target failure reported by the crawl, not a reason to refuse the run.
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_catalog_config(&config.catalog)?;
    validate_origin_scheme(&config.catalog, &config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates crawl pacing and cache policy
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.min_delay_ms > config.max_delay_ms {
        return Err(ConfigError::Validation(format!(
            "min_delay_ms ({}) must not exceed max_delay_ms ({})",
            config.min_delay_ms, config.max_delay_ms
        )));
    }

    if config.staleness_days < 1 {
        return Err(ConfigError::Validation(
            "staleness_days must be >= 1".to_string(),
        ));
    }

    if config.request_timeout_secs < 1 || config.request_timeout_secs > 120 {
        return Err(ConfigError::Validation(format!(
            "request_timeout_secs must be between 1 and 120, got {}",
            config.request_timeout_secs
        )));
    }

    Ok(())
}

/// Validates the catalog origin and locale
fn validate_catalog_config(config: &CatalogConfig) -> Result<(), ConfigError> {
    let origin = Url::parse(&config.base_origin)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base_origin: {}", e)))?;

    if origin.scheme() != "http" && origin.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "base_origin must use http or https, got '{}'",
            origin.scheme()
        )));
    }

    if origin.host_str().is_none() {
        return Err(ConfigError::InvalidUrl(
            "base_origin must include a host".to_string(),
        ));
    }

    if config.language.is_empty() || !config.language.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(ConfigError::Validation(format!(
            "language must be a non-empty alphabetic word, got '{}'",
            config.language
        )));
    }

    Ok(())
}

/// Validates user agent configuration
/// A plain-HTTP origin is only reachable with `https-only` turned off
fn validate_origin_scheme(catalog: &CatalogConfig, crawler: &CrawlerConfig) -> Result<(), ConfigError> {
    let plain_http = Url::parse(&catalog.base_origin)
        .map(|origin| origin.scheme() == "http")
        .unwrap_or(false);

    if crawler.https_only && plain_http {
        return Err(ConfigError::Validation(format!(
            "base_origin '{}' is plain HTTP but https_only is set",
            catalog.base_origin
        )));
    }

    Ok(())
}

fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.trim().is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }
    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    let Some((local, domain)) = email.split_once('@') else {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    };

    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !domain.contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}
