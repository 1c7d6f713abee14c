use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// One (name, value, unit?) row from an enrichment document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpecItem {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub unit: Option<String>,
}

/// Ordered structured specification rows for one product. May be empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpecSheet {
    pub items: Vec<SpecItem>,
}

impl SpecSheet {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Consolidated product record — read-only input produced by the external
/// catalog-consolidation process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductRecord {
    /// Trade identifier (barcode-like), the primary cross-system join key.
    pub ean: String,
    /// Manufacturer part number — secondary identity marker.
    #[serde(default)]
    pub mpn: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    pub price: f64,
    pub stock: i64,
    #[serde(default)]
    pub spec_sheet: Option<SpecSheet>,
    /// Existing description text, if any. Carried into resolution; may
    /// itself be a previously composed description.
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub short_description: Option<String>,
    #[serde(default)]
    pub image_urls: Vec<String>,
}

/// Marketplace-ready content rendered by the composer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedListing {
    pub title: String,
    pub description_html: String,
    /// None when no (name, value) pair qualified — never an empty table.
    pub spec_table_html: Option<String>,
    pub tags: Vec<String>,
    pub short_description: String,
    pub promo_text: String,
}

/// Upload state of an export record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    Pending,
    Uploaded,
    Error,
}

impl SyncState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncState::Pending => "pending",
            SyncState::Uploaded => "uploaded",
            SyncState::Error => "error",
        }
    }

    /// Uploaded is terminal until a content change resets the record.
    pub fn is_eligible(&self) -> bool {
        matches!(self, SyncState::Pending | SyncState::Error)
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SyncState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(SyncState::Pending),
            "uploaded" => Ok(SyncState::Uploaded),
            "error" => Ok(SyncState::Error),
            _ => Err(format!("Unknown sync state: {}", s)),
        }
    }
}

/// One export-staging row, 1:1 with a product record by EAN.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportRecord {
    pub id: Uuid,
    pub ean: String,
    pub title: String,
    pub description_html: String,
    pub spec_table_html: Option<String>,
    pub tags: Vec<String>,
    pub short_description: String,
    pub promo_text: String,
    /// Serialized attribute map, one namespaced metafield per key.
    pub metafields: serde_json::Value,
    pub image_urls: Vec<String>,
    pub price: f64,
    pub stock: i64,
    pub brand: Option<String>,
    pub category: Option<String>,
    /// SHA-256 over the generated content, for change detection.
    pub content_hash: String,
    /// Platform-assigned id. Once populated, authoritative for lookups.
    pub platform_id: Option<i64>,
    pub state: SyncState,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ExportRecord {
    /// Stable slug used as the fallback identity lookup key on the platform.
    pub fn handle(&self) -> String {
        handle_for(&self.ean)
    }
}

/// DTO for upserting an export record.
#[derive(Debug, Clone, Serialize)]
pub struct NewExportRecord {
    pub ean: String,
    pub title: String,
    pub description_html: String,
    pub spec_table_html: Option<String>,
    pub tags: Vec<String>,
    pub short_description: String,
    pub promo_text: String,
    pub metafields: serde_json::Value,
    pub image_urls: Vec<String>,
    pub price: f64,
    pub stock: i64,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub content_hash: String,
}

/// Derive the stable platform handle from a trade identifier.
///
/// Lowercased, non-alphanumerics collapsed to single dashes, prefixed so the
/// handle never starts with a digit.
pub fn handle_for(ean: &str) -> String {
    let mut slug = String::with_capacity(ean.len() + 5);
    let mut last_dash = false;
    for c in ean.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash && !slug.is_empty() {
            slug.push('-');
            last_dash = true;
        }
    }
    let slug = slug.trim_end_matches('-');
    format!("prod-{slug}")
}

/// Compute a SHA-256 hash of a string, returned as 64-char hex.
pub fn compute_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Hash of everything the platform sees, for change detection.
pub fn listing_content_hash(listing: &GeneratedListing, metafields: &serde_json::Value) -> String {
    let mut joined = String::new();
    joined.push_str(&listing.title);
    joined.push('\n');
    joined.push_str(&listing.description_html);
    joined.push('\n');
    if let Some(table) = &listing.spec_table_html {
        joined.push_str(table);
    }
    joined.push('\n');
    joined.push_str(&listing.tags.join(","));
    joined.push('\n');
    joined.push_str(&metafields.to_string());
    compute_hash(&joined)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_hash_consistency() {
        let h1 = compute_hash("hello world");
        let h2 = compute_hash("hello world");
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 64);
    }

    #[test]
    fn test_compute_hash_different_inputs() {
        assert_ne!(compute_hash("hello"), compute_hash("world"));
    }

    #[test]
    fn test_sync_state_roundtrip() {
        for state in [SyncState::Pending, SyncState::Uploaded, SyncState::Error] {
            let parsed: SyncState = state.as_str().parse().unwrap();
            assert_eq!(parsed, state);
        }
    }

    #[test]
    fn test_eligibility() {
        assert!(SyncState::Pending.is_eligible());
        assert!(SyncState::Error.is_eligible());
        assert!(!SyncState::Uploaded.is_eligible());
    }

    #[test]
    fn test_handle_is_stable_slug() {
        assert_eq!(handle_for("4711034567890"), "prod-4711034567890");
        assert_eq!(handle_for("AB-123/X"), "prod-ab-123-x");
        assert_eq!(handle_for("  90X.1  "), "prod-90x-1");
    }

    #[test]
    fn test_handle_never_starts_with_digit() {
        let h = handle_for("123456");
        assert!(h.starts_with("prod-"));
    }

    #[test]
    fn test_listing_hash_changes_with_content() {
        let listing = GeneratedListing {
            title: "A".into(),
            description_html: "<p>x</p>".into(),
            spec_table_html: None,
            tags: vec!["Tag".into()],
            short_description: "s".into(),
            promo_text: "p".into(),
        };
        let meta = serde_json::json!({"specs": {}});
        let h1 = listing_content_hash(&listing, &meta);

        let mut changed = listing.clone();
        changed.title = "B".into();
        let h2 = listing_content_hash(&changed, &meta);
        assert_ne!(h1, h2);
    }
}
