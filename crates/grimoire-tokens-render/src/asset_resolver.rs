//! Classification of image reference strings.
//!
//! Settings and scripts refer to images with plain strings. This module
//! turns such a string into an [`AssetReference`] saying where the pixels
//! live, without doing any I/O.
//!
//! Grammar:
//!
//! | Input                         | Result                 |
//! |-------------------------------|------------------------|
//! | `""`, `"none"` (any case)     | [`AssetReference::None`] |
//! | a catalog id for the type     | [`AssetReference::BuiltIn`] |
//! | `asset:<uuid>`                | [`AssetReference::UserAsset`] |
//! | anything else                 | [`AssetReference::DirectUrl`] |

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::image_cache::CacheKey;
use crate::logging::targets::RESOLVER as TARGET;

/// Prefix marking a reference into the local asset library.
pub const USER_ASSET_PREFIX: &str = "asset:";

/// What an image is used for. Built-in ids are scoped per type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AssetType {
    /// Character portrait art.
    CharacterIcon,
    /// Background disc of a token.
    TokenBackground,
    /// Background of a printed script sheet.
    ScriptBackground,
    /// Decoration marking setup characters.
    SetupOverlay,
    /// Decorative accents around the rim.
    Accent,
    /// Script logos.
    Logo,
}

impl AssetType {
    /// All asset types.
    pub const ALL: [AssetType; 6] = [
        AssetType::CharacterIcon,
        AssetType::TokenBackground,
        AssetType::ScriptBackground,
        AssetType::SetupOverlay,
        AssetType::Accent,
        AssetType::Logo,
    ];

    /// Stable lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            AssetType::CharacterIcon => "character-icon",
            AssetType::TokenBackground => "token-background",
            AssetType::ScriptBackground => "script-background",
            AssetType::SetupOverlay => "setup-overlay",
            AssetType::Accent => "accent",
            AssetType::Logo => "logo",
        }
    }
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where an image reference points.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AssetReference {
    /// Art bundled with the application.
    BuiltIn {
        id: String,
        asset_type: AssetType,
        /// Path relative to the static asset root.
        path: String,
    },
    /// A blob in the local asset library.
    UserAsset { uuid: String, asset_type: AssetType },
    /// A URL or `data:` URI.
    DirectUrl { url: String, asset_type: AssetType },
    /// No image.
    None,
}

impl AssetReference {
    /// Whether this is [`AssetReference::None`].
    pub fn is_none(&self) -> bool {
        matches!(self, AssetReference::None)
    }

    /// Convert into something the loader can fetch. `None` has no target.
    pub fn into_target(self) -> Option<FetchTarget> {
        match self {
            AssetReference::BuiltIn {
                id,
                asset_type,
                path,
            } => Some(FetchTarget::BuiltIn {
                id,
                asset_type,
                path,
            }),
            AssetReference::UserAsset { uuid, asset_type } => {
                Some(FetchTarget::UserAsset { uuid, asset_type })
            }
            AssetReference::DirectUrl { url, asset_type } => {
                Some(FetchTarget::DirectUrl { url, asset_type })
            }
            AssetReference::None => None,
        }
    }
}

/// A reference the loader can act on.
///
/// Only obtainable from a non-`None` [`AssetReference`] (or built directly),
/// so the loader never has to handle "no image".
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FetchTarget {
    BuiltIn {
        id: String,
        asset_type: AssetType,
        path: String,
    },
    UserAsset {
        uuid: String,
        asset_type: AssetType,
    },
    DirectUrl {
        url: String,
        asset_type: AssetType,
    },
}

impl FetchTarget {
    /// A direct URL target.
    pub fn url(url: impl Into<String>, asset_type: AssetType) -> Self {
        FetchTarget::DirectUrl {
            url: url.into(),
            asset_type,
        }
    }

    /// The cache key a successful load is stored under.
    pub fn cache_key(&self) -> CacheKey {
        match self {
            FetchTarget::BuiltIn { path, .. } => CacheKey::BuiltIn(path.clone()),
            FetchTarget::UserAsset { uuid, .. } => CacheKey::UserAsset(uuid.clone()),
            FetchTarget::DirectUrl { url, .. } => CacheKey::Url(url.clone()),
        }
    }

    /// The asset type the reference was classified for.
    pub fn asset_type(&self) -> AssetType {
        match self {
            FetchTarget::BuiltIn { asset_type, .. }
            | FetchTarget::UserAsset { asset_type, .. }
            | FetchTarget::DirectUrl { asset_type, .. } => *asset_type,
        }
    }
}

impl fmt::Display for FetchTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.cache_key().fmt(f)
    }
}

// ============================================================================
// BUILT-IN CATALOG
// ============================================================================

/// Bundled art, keyed by asset type and id.
#[derive(Debug, Clone, Default)]
pub struct BuiltInCatalog {
    entries: HashMap<AssetType, BTreeMap<String, String>>,
}

impl BuiltInCatalog {
    /// An empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog from `(asset_type, id, path)` triples.
    pub fn from_entries<I, S, P>(entries: I) -> Self
    where
        I: IntoIterator<Item = (AssetType, S, P)>,
        S: Into<String>,
        P: Into<String>,
    {
        let mut catalog = Self::new();
        for (asset_type, id, path) in entries {
            catalog.insert(asset_type, id, path);
        }
        catalog
    }

    /// The art shipped with the application.
    pub fn bundled() -> Self {
        let mut catalog = Self::new();

        for id in [
            "washerwoman",
            "librarian",
            "investigator",
            "chef",
            "empath",
            "fortuneteller",
            "undertaker",
            "monk",
            "ravenkeeper",
            "virgin",
            "slayer",
            "soldier",
            "mayor",
            "butler",
            "drunk",
            "recluse",
            "saint",
            "poisoner",
            "spy",
            "scarletwoman",
            "baron",
            "imp",
        ] {
            catalog.insert(
                AssetType::CharacterIcon,
                id,
                format!("character-icons/{id}.webp"),
            );
        }

        for id in ["parchment", "velvet", "stone", "wood"] {
            catalog.insert(
                AssetType::TokenBackground,
                id,
                format!("backgrounds/token/{id}.webp"),
            );
            catalog.insert(
                AssetType::ScriptBackground,
                id,
                format!("backgrounds/script/{id}.webp"),
            );
        }

        for id in ["leaf", "flourish"] {
            catalog.insert(AssetType::SetupOverlay, id, format!("setup/{id}.webp"));
        }
        for id in ["leaves", "thorns", "vines"] {
            catalog.insert(AssetType::Accent, id, format!("accents/{id}.webp"));
        }
        catalog.insert(AssetType::Logo, "clocktower", "logos/clocktower.webp");

        catalog
    }

    /// Add or replace an entry.
    pub fn insert(&mut self, asset_type: AssetType, id: impl Into<String>, path: impl Into<String>) {
        self.entries
            .entry(asset_type)
            .or_default()
            .insert(id.into(), path.into());
    }

    /// The static path for an id, if it is a built-in of this type.
    pub fn path(&self, asset_type: AssetType, id: &str) -> Option<&str> {
        self.entries
            .get(&asset_type)
            .and_then(|ids| ids.get(id))
            .map(String::as_str)
    }

    /// Whether `id` is a built-in of this type.
    pub fn contains(&self, asset_type: AssetType, id: &str) -> bool {
        self.path(asset_type, id).is_some()
    }

    /// Built-in ids of one type, sorted.
    pub fn ids(&self, asset_type: AssetType) -> impl Iterator<Item = &str> {
        self.entries
            .get(&asset_type)
            .into_iter()
            .flat_map(|ids| ids.keys().map(String::as_str))
    }

    /// Total number of entries across all types.
    pub fn len(&self) -> usize {
        self.entries.values().map(BTreeMap::len).sum()
    }

    /// Whether the catalog has no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// RESOLVER
// ============================================================================

/// Classifies reference strings against a built-in catalog.
#[derive(Debug, Clone, Default)]
pub struct AssetResolver {
    catalog: BuiltInCatalog,
}

impl AssetResolver {
    /// Create a resolver over `catalog`.
    pub fn new(catalog: BuiltInCatalog) -> Self {
        Self { catalog }
    }

    /// A resolver over the bundled catalog.
    pub fn bundled() -> Self {
        Self::new(BuiltInCatalog::bundled())
    }

    /// The catalog in use.
    pub fn catalog(&self) -> &BuiltInCatalog {
        &self.catalog
    }

    /// Classify a reference string.
    pub fn classify(&self, value: &str, asset_type: AssetType) -> AssetReference {
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") {
            return AssetReference::None;
        }

        if let Some(path) = self.catalog.path(asset_type, trimmed) {
            return AssetReference::BuiltIn {
                id: trimmed.to_string(),
                asset_type,
                path: path.to_string(),
            };
        }

        if let Some(uuid) = trimmed.strip_prefix(USER_ASSET_PREFIX) {
            let uuid = uuid.trim();
            if uuid.is_empty() {
                tracing::debug!(
                    target: TARGET,
                    value,
                    %asset_type,
                    "user asset reference without uuid; treating as none"
                );
                return AssetReference::None;
            }
            return AssetReference::UserAsset {
                uuid: uuid.to_string(),
                asset_type,
            };
        }

        AssetReference::DirectUrl {
            url: trimmed.to_string(),
            asset_type,
        }
    }

    /// Classify and convert straight to a loader target.
    pub fn resolve(&self, value: &str, asset_type: AssetType) -> Option<FetchTarget> {
        self.classify(value, asset_type).into_target()
    }
}
