//! Record assembly from extracted fields
//!
//! A record is built whole or not at all: any missing required field or
//! out-of-range value fails the target before anything reaches the store.

use crate::extract::{
    normalize_tags, parse_discount, parse_price, parse_rating, parse_release_date, BundleFields,
    EntryFields, ExtractionError,
};
use crate::identity::ResolvedTarget;
use crate::storage::{BundleRecord, EntryRecord};
use crate::{CrawlError, ValidationError};
use chrono::{DateTime, Utc};

/// Builds an entry record from the fields of its page
///
/// Title, price, rating and release date must all be present. A release date
/// that is present but unparseable is stored as `None`.
pub fn build_entry(
    target: &ResolvedTarget,
    fields: EntryFields,
    fetched_at: DateTime<Utc>,
) -> Result<EntryRecord, CrawlError> {
    let title = required_text(fields.title, "title")?;
    let price_text = required_text(fields.price_text, "price")?;
    let rating_text = required_text(fields.rating_text, "rating")?;
    let release_text = required_text(fields.release_date_text, "release_date")?;

    let price = validate_amount("price", parse_price(&price_text))?;
    let (rating_score, rating_count) =
        parse_rating(&rating_text).ok_or_else(|| ExtractionError::Unparseable {
            field: "rating",
            text: rating_text.clone(),
        })?;
    let rating_score = validate_fraction("rating_score", rating_score)?;

    let release_date = parse_release_date(&release_text);
    if release_date.is_none() {
        tracing::debug!(
            "Release date '{}' for {} is not a calendar date",
            release_text,
            target.url
        );
    }

    Ok(EntryRecord {
        hash: target.hash.clone(),
        url: target.url.clone(),
        external_id: target.external_id,
        title,
        price,
        rating_score,
        rating_count,
        tags: normalize_tags(&fields.tags),
        release_date,
        fetched_at,
    })
}

/// Builds a bundle record from its header fields and resolved member hashes
///
/// Title and total price are required, discount defaults to 0 and at least
/// one member is required.
pub fn build_bundle(
    target: &ResolvedTarget,
    fields: BundleFields,
    member_hashes: Vec<String>,
    fetched_at: DateTime<Utc>,
) -> Result<BundleRecord, CrawlError> {
    let title = required_text(fields.title, "title")?;
    let price_text = required_text(fields.price_text, "total_price")?;
    let total_price = validate_amount("total_price", parse_price(&price_text))?;

    let discount_fraction = match fields.discount_text.as_deref() {
        Some(text) => parse_discount(text).unwrap_or(0.0),
        None => 0.0,
    };
    let discount_fraction = validate_fraction("discount_fraction", discount_fraction)?;

    if member_hashes.is_empty() {
        return Err(ExtractionError::MissingField("members").into());
    }

    Ok(BundleRecord {
        hash: target.hash.clone(),
        url: target.url.clone(),
        external_id: target.external_id,
        title,
        discount_fraction,
        total_price,
        tags: normalize_tags(&fields.tags),
        member_hashes,
        fetched_at,
    })
}

fn required_text(value: Option<String>, field: &'static str) -> Result<String, ExtractionError> {
    value
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
        .ok_or(ExtractionError::MissingField(field))
}

fn validate_amount(field: &'static str, value: f64) -> Result<f64, ValidationError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(ValidationError::InvalidAmount { field, value })
    }
}

fn validate_fraction(field: &'static str, value: f64) -> Result<f64, ValidationError> {
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(ValidationError::FractionOutOfRange { field, value })
    }
}
