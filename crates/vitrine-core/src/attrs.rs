//! Canonical attribute map over a closed key set.
//!
//! Keys are an enum, so unknown keys are unrepresentable. Values are set
//! first-writer-wins within a source and merged gap-fill-only across
//! sources: once a higher-trust layer has written a key, a lower-trust
//! layer can never overwrite it.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Closed set of canonical attribute keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttrKey {
    Processor,
    Ram,
    Storage,
    DisplaySize,
    DisplayType,
    Resolution,
    AspectRatio,
    Touch,
    Gpu,
    Os,
    PcType,
    Weight,
    Battery,
    Connectivity,
    Ports,
}

impl AttrKey {
    pub const ALL: [AttrKey; 15] = [
        AttrKey::Processor,
        AttrKey::Ram,
        AttrKey::Storage,
        AttrKey::DisplaySize,
        AttrKey::DisplayType,
        AttrKey::Resolution,
        AttrKey::AspectRatio,
        AttrKey::Touch,
        AttrKey::Gpu,
        AttrKey::Os,
        AttrKey::PcType,
        AttrKey::Weight,
        AttrKey::Battery,
        AttrKey::Connectivity,
        AttrKey::Ports,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AttrKey::Processor => "processor",
            AttrKey::Ram => "ram",
            AttrKey::Storage => "storage",
            AttrKey::DisplaySize => "display_size",
            AttrKey::DisplayType => "display_type",
            AttrKey::Resolution => "resolution",
            AttrKey::AspectRatio => "aspect_ratio",
            AttrKey::Touch => "touch",
            AttrKey::Gpu => "gpu",
            AttrKey::Os => "os",
            AttrKey::PcType => "pc_type",
            AttrKey::Weight => "weight",
            AttrKey::Battery => "battery",
            AttrKey::Connectivity => "connectivity",
            AttrKey::Ports => "ports",
        }
    }

}

impl fmt::Display for AttrKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AttrKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AttrKey::ALL
            .iter()
            .find(|k| k.as_str() == s.trim().to_lowercase())
            .copied()
            .ok_or_else(|| format!("Unknown attribute key: {}", s))
    }
}

/// Normalized canonical-key → value map.
///
/// Backed by a `BTreeMap` so iteration order (and therefore everything
/// rendered from it) is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttributeMap {
    values: BTreeMap<AttrKey, String>,
}

impl AttributeMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: AttrKey) -> Option<&str> {
        self.values.get(&key).map(String::as_str)
    }

    pub fn contains(&self, key: AttrKey) -> bool {
        self.values.contains_key(&key)
    }

    /// Set a value only if the key is still vacant. First writer wins.
    /// Empty values are never stored.
    pub fn set_if_absent(&mut self, key: AttrKey, value: impl Into<String>) -> bool {
        let value = value.into();
        let value = value.trim();
        if value.is_empty() || self.values.contains_key(&key) {
            return false;
        }
        self.values.insert(key, value.to_string());
        true
    }

    /// Merge reducer: fill this map's gaps from a lower-trust contribution.
    /// Existing values are never overwritten.
    pub fn fill_missing(&mut self, lower_trust: &AttributeMap) -> usize {
        let mut filled = 0;
        for (key, value) in &lower_trust.values {
            if self.set_if_absent(*key, value.clone()) {
                filled += 1;
            }
        }
        filled
    }

    /// True when every key in `required` is present.
    pub fn has_all(&self, required: &[AttrKey]) -> bool {
        required.iter().all(|k| self.values.contains_key(k))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (AttrKey, &str)> {
        self.values.iter().map(|(k, v)| (*k, v.as_str()))
    }

    /// Serialize as the metafield payload stored on the export record:
    /// a JSON object keyed by canonical name, each entry carrying the
    /// platform namespace and declared type.
    pub fn to_metafields(&self) -> serde_json::Value {
        let mut specs = serde_json::Map::new();
        for (key, value) in &self.values {
            specs.insert(
                key.as_str().to_string(),
                serde_json::json!({
                    "namespace": "specs",
                    "key": key.as_str(),
                    "value": value,
                    "type": "single_line_text_field",
                }),
            );
        }
        serde_json::Value::Object(specs)
    }
}

impl FromIterator<(AttrKey, String)> for AttributeMap {
    fn from_iter<T: IntoIterator<Item = (AttrKey, String)>>(iter: T) -> Self {
        let mut map = AttributeMap::new();
        for (k, v) in iter {
            map.set_if_absent(k, v);
        }
        map
    }
}
