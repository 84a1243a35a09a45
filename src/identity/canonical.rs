use regex::Regex;
use std::sync::OnceLock;

/// Matches the id embedded in catalog links, e.g. `/app/2835570/Buckshot_Roulette/`
fn id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"/(app|bundle|bundlelist)/(\d+)").expect("id pattern is a valid regex")
    })
}

/// Extracts the numeric id from a catalog link
///
/// Returns `None` when the reference contains no `/app/`, `/bundle/` or
/// `/bundlelist/` segment followed by digits.
pub fn extract_id(reference: &str) -> Option<&str> {
    id_pattern()
        .captures(reference)
        .and_then(|caps| caps.get(2))
        .map(|m| m.as_str())
}

/// Returns the id a reference points at
///
/// Links yield their embedded id; anything else is taken to be the id itself.
pub fn reference_id(reference: &str) -> &str {
    let trimmed = reference.trim();
    extract_id(trimmed).unwrap_or(trimmed)
}

/// Builds `{origin}/{segment}/{id}/?l={language}`
pub fn build_canonical_url(origin: &str, segment: &str, id: &str, language: &str) -> String {
    format!("{}/{}/{}/?l={}", origin, segment, id, language)
}
