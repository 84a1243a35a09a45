//! Target identity for Bundle-Harvest
//!
//! This module turns raw target references (numeric ids or catalog links) into
//! canonical, locale-fixed URLs and the content hashes that key every cached
//! record.

mod canonical;
mod hash;

use crate::config::CatalogConfig;
use crate::IdentityError;
use std::fmt;
use std::str::FromStr;

// Re-export main functions
pub use canonical::{extract_id, reference_id};
pub use hash::{content_hash, content_hash_with_length, DEFAULT_HASH_LENGTH};

/// Kinds of catalog page a target can point at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetKind {
    /// A single catalog entry (an app page)
    Entry,
    /// A bundle page listing its member entries
    Bundle,
    /// The page listing every bundle that contains an entry
    BundleList,
}

impl TargetKind {
    /// Path segment used in canonical URLs
    pub fn segment(&self) -> &'static str {
        match self {
            Self::Entry => "app",
            Self::Bundle => "bundle",
            Self::BundleList => "bundlelist",
        }
    }
}

impl FromStr for TargetKind {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "app" | "entry" | "game" => Ok(Self::Entry),
            "bundle" => Ok(Self::Bundle),
            "bundlelist" | "bundle-list" => Ok(Self::BundleList),
            _ => Err(IdentityError::UnknownKind(s.to_string())),
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.segment())
    }
}

/// A target as the caller supplied it, before resolution
///
/// The kind stays a raw string so an unrecognized kind surfaces as a
/// per-target [`IdentityError`] when the crawl reaches it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetRef {
    pub kind: String,
    pub reference: String,
}

impl TargetRef {
    pub fn new(kind: &str, reference: &str) -> Self {
        Self {
            kind: kind.to_string(),
            reference: reference.to_string(),
        }
    }

    pub fn entry(reference: &str) -> Self {
        Self::new(TargetKind::Entry.segment(), reference)
    }

    pub fn bundle(reference: &str) -> Self {
        Self::new(TargetKind::Bundle.segment(), reference)
    }

    pub fn bundle_list(reference: &str) -> Self {
        Self::new(TargetKind::BundleList.segment(), reference)
    }
}

impl fmt::Display for TargetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.kind, self.reference)
    }
}

/// A target with its canonical identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    pub kind: TargetKind,
    /// Numeric catalog id
    pub external_id: i64,
    /// Canonical URL, the hashing input
    pub url: String,
    /// Identity hash of `url`
    pub hash: String,
}

/// Resolves target references against one catalog origin and locale
#[derive(Debug, Clone)]
pub struct IdentityResolver {
    base_origin: String,
    language: String,
}

impl IdentityResolver {
    /// Creates a resolver; a trailing `/` on the origin is ignored
    pub fn new(base_origin: &str, language: &str) -> Self {
        Self {
            base_origin: base_origin.trim_end_matches('/').to_string(),
            language: language.to_string(),
        }
    }

    pub fn from_config(config: &CatalogConfig) -> Self {
        Self::new(&config.base_origin, &config.language)
    }

    pub fn base_origin(&self) -> &str {
        &self.base_origin
    }

    /// Produces the canonical URL for a reference of the given kind
    ///
    /// # Arguments
    ///
    /// * `reference` - A bare id or a link containing `/app/<id>`,
    ///   `/bundle/<id>` or `/bundlelist/<id>`
    /// * `kind` - Target kind name; see [`TargetKind`]
    ///
    /// # Returns
    ///
    /// * `Ok(String)` - `{origin}/{segment}/{id}/?l={language}`
    /// * `Err(IdentityError::UnknownKind)` - `kind` is not a known target kind
    ///
    /// # Examples
    ///
    /// ```
    /// use bundle_harvest::identity::IdentityResolver;
    ///
    /// let resolver = IdentityResolver::new("https://store.steampowered.com", "english");
    /// let url = resolver
    ///     .canonicalize("https://example.test/app/2835570/Game", "app")
    ///     .unwrap();
    /// assert_eq!(url, "https://store.steampowered.com/app/2835570/?l=english");
    /// ```
    pub fn canonicalize(&self, reference: &str, kind: &str) -> Result<String, IdentityError> {
        let kind: TargetKind = kind.parse()?;
        Ok(self.canonical_url(kind, reference_id(reference)))
    }

    /// Canonical URL for an already extracted id
    pub fn canonical_url(&self, kind: TargetKind, id: &str) -> String {
        canonical::build_canonical_url(&self.base_origin, kind.segment(), id, &self.language)
    }

    /// Resolves a target into kind, numeric id, canonical URL and hash
    ///
    /// Unlike [`canonicalize`](Self::canonicalize), this rejects empty and
    /// non-numeric ids, since stored records carry an integer catalog id.
    pub fn resolve(&self, target: &TargetRef) -> Result<ResolvedTarget, IdentityError> {
        let kind: TargetKind = target.kind.parse()?;

        let id = reference_id(&target.reference);
        if id.is_empty() {
            return Err(IdentityError::EmptyReference);
        }
        let external_id = id
            .parse::<i64>()
            .ok()
            .filter(|_| id.chars().all(|c| c.is_ascii_digit()))
            .ok_or_else(|| IdentityError::NonNumericId(id.to_string()))?;

        let url = self.canonical_url(kind, id);
        let hash = content_hash(&url);

        Ok(ResolvedTarget {
            kind,
            external_id,
            url,
            hash,
        })
    }
}
