//! Deterministic keyword-based attribute extraction from structured
//! specification sheets, plus the derived classifications built on top of
//! the raw values.
//!
//! Matching policy: case-insensitive substring match of the bilingual
//! synonym table against each row name, in sheet order; the first row to
//! claim a canonical key wins and later rows never override it. Boilerplate
//! negative values are discarded. An empty sheet yields an empty map.

use std::fmt;

use crate::attrs::{AttrKey, AttributeMap};
use crate::keywords::{
    DEVICE_CATEGORY_BLACKLIST, FORM_FACTOR_RULES, KEYWORD_RULES, NEGATIVE_VALUES,
};
use crate::models::{SpecItem, SpecSheet};

/// Display panel technology derived from the display-type value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayTech {
    Oled,
    Amoled,
    MiniLed,
    Ips,
    Va,
    Tn,
    Led,
    Lcd,
    Unknown,
}

impl DisplayTech {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisplayTech::Oled => "OLED",
            DisplayTech::Amoled => "AMOLED",
            DisplayTech::MiniLed => "Mini-LED",
            DisplayTech::Ips => "IPS",
            DisplayTech::Va => "VA",
            DisplayTech::Tn => "TN",
            DisplayTech::Led => "LED",
            DisplayTech::Lcd => "LCD",
            DisplayTech::Unknown => "unknown",
        }
    }
}

impl fmt::Display for DisplayTech {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Touchscreen support derived from the touch value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TouchSupport {
    Yes,
    No,
    Unknown,
}

/// Resolution bucket derived from the resolution value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionClass {
    Hd,
    FullHd,
    Qhd,
    Uhd4k,
    Uhd8k,
    Unknown,
}

impl ResolutionClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionClass::Hd => "HD",
            ResolutionClass::FullHd => "Full HD",
            ResolutionClass::Qhd => "QHD",
            ResolutionClass::Uhd4k => "4K UHD",
            ResolutionClass::Uhd8k => "8K UHD",
            ResolutionClass::Unknown => "unknown",
        }
    }
}

/// Device form factor. Absence (non-device categories) is `Option::None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceForm {
    Notebook,
    Desktop,
    AllInOne,
    Workstation,
    GamingPc,
    MiniPc,
    Tablet,
}

impl DeviceForm {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceForm::Notebook => "Notebook",
            DeviceForm::Desktop => "Desktop",
            DeviceForm::AllInOne => "All-in-One",
            DeviceForm::Workstation => "Workstation",
            DeviceForm::GamingPc => "Gaming PC",
            DeviceForm::MiniPc => "Mini PC",
            DeviceForm::Tablet => "Tablet",
        }
    }

    fn from_label(label: &str) -> Option<DeviceForm> {
        match label {
            "Notebook" => Some(DeviceForm::Notebook),
            "Desktop" => Some(DeviceForm::Desktop),
            "All-in-One" => Some(DeviceForm::AllInOne),
            "Workstation" => Some(DeviceForm::Workstation),
            "Gaming PC" => Some(DeviceForm::GamingPc),
            "Mini PC" => Some(DeviceForm::MiniPc),
            "Tablet" => Some(DeviceForm::Tablet),
            _ => None,
        }
    }
}

/// True when the value is boilerplate ("no", "nicht vorhanden", …) rather
/// than a technical fact worth storing.
pub fn is_negative_value(value: &str) -> bool {
    let normalized = value.trim().to_lowercase();
    NEGATIVE_VALUES.iter().any(|n| *n == normalized)
}

fn full_value(item: &SpecItem) -> String {
    match &item.unit {
        Some(unit) if !unit.trim().is_empty() => {
            format!("{} {}", item.value.trim(), unit.trim())
        }
        _ => item.value.trim().to_string(),
    }
}

/// Run the keyword extractor over a structured sheet.
///
/// Returns a partial map: only keys some row actually matched. The category
/// is needed for the form-factor guard.
pub fn extract_attributes(sheet: &SpecSheet, category: Option<&str>) -> AttributeMap {
    let mut map = AttributeMap::new();

    for item in &sheet.items {
        let name = item.name.trim().to_lowercase();
        if name.is_empty() || item.value.trim().is_empty() {
            continue;
        }
        if is_negative_value(&item.value) {
            continue;
        }

        // First rule whose synonym occurs in the row name claims the row.
        let matched = KEYWORD_RULES
            .iter()
            .find(|rule| rule.synonyms.iter().any(|syn| name.contains(syn)));

        if let Some(rule) = matched {
            map.set_if_absent(rule.key, full_value(item));
        }
    }

    derive_classifications(&mut map, category);
    map
}

/// Fill in the derived keys (display_type normalization, touch, pc_type)
/// from what the raw rows provided.
fn derive_classifications(map: &mut AttributeMap, category: Option<&str>) {
    if let Some(raw) = map.get(AttrKey::DisplayType) {
        let tech = classify_display_tech(raw);
        if tech != DisplayTech::Unknown {
            // Normalize the stored value to the canonical technology label.
            let owned = tech.as_str().to_string();
            *map = replace_value(map, AttrKey::DisplayType, owned);
        }
    }

    if let Some(raw) = map.get(AttrKey::Touch) {
        match classify_touch(raw) {
            TouchSupport::Yes => *map = replace_value(map, AttrKey::Touch, "yes".into()),
            TouchSupport::No | TouchSupport::Unknown => {}
        }
    }

    if !map.contains(AttrKey::PcType)
        && let Some(form) = infer_device_form(category, None)
    {
        map.set_if_absent(AttrKey::PcType, form.as_str());
    }
}

// AttributeMap enforces first-writer-wins, so normalization rebuilds the
// map with the one value swapped instead of mutating in place.
fn replace_value(map: &AttributeMap, key: AttrKey, value: String) -> AttributeMap {
    map.iter()
        .map(|(k, v)| {
            if k == key {
                (k, value.clone())
            } else {
                (k, v.to_string())
            }
        })
        .collect()
}

/// Classify display technology from a free-form panel description.
pub fn classify_display_tech(value: &str) -> DisplayTech {
    let v = value.to_lowercase();
    // Short codes (ips/va/tn) must match as whole tokens; "va" as a bare
    // substring would claim words like "advanced".
    let has_token = |needle: &str| {
        v.split(|c: char| !c.is_ascii_alphanumeric())
            .any(|tok| tok == needle)
    };
    // Most specific first: "amoled" contains "oled", "mini-led" contains "led".
    if v.contains("amoled") {
        DisplayTech::Amoled
    } else if v.contains("oled") {
        DisplayTech::Oled
    } else if v.contains("mini-led") || v.contains("mini led") || v.contains("miniled") {
        DisplayTech::MiniLed
    } else if has_token("ips") {
        DisplayTech::Ips
    } else if has_token("va") {
        DisplayTech::Va
    } else if has_token("tn") {
        DisplayTech::Tn
    } else if v.contains("led") {
        DisplayTech::Led
    } else if v.contains("lcd") {
        DisplayTech::Lcd
    } else {
        DisplayTech::Unknown
    }
}

/// Classify touchscreen support from a free-form value.
pub fn classify_touch(value: &str) -> TouchSupport {
    let v = value.trim().to_lowercase();
    if is_negative_value(&v) {
        return TouchSupport::No;
    }
    if v.contains("ja") || v.contains("yes") || v.contains("touch") || v == "1" {
        TouchSupport::Yes
    } else {
        TouchSupport::Unknown
    }
}

/// Bucket a resolution value (e.g. "3840 x 2160 Pixel", "Full HD").
pub fn classify_resolution(value: &str) -> ResolutionClass {
    let v = value.to_lowercase();
    if v.contains("7680") || v.contains("8k") {
        return ResolutionClass::Uhd8k;
    }
    if v.contains("3840") || v.contains("2160") || v.contains("4k") || v.contains("uhd") {
        return ResolutionClass::Uhd4k;
    }
    if v.contains("2560") || v.contains("1440") || v.contains("qhd") || v.contains("wqhd") {
        return ResolutionClass::Qhd;
    }
    if v.contains("1920") || v.contains("1080") || v.contains("full hd") || v.contains("fhd") {
        return ResolutionClass::FullHd;
    }
    if v.contains("1280") || v.contains("720") || v.contains("hd") {
        return ResolutionClass::Hd;
    }
    ResolutionClass::Unknown
}

/// Infer the device form factor from category and display name.
///
/// Blacklisted categories (accessories, cables, fans, peripherals,
/// components) suppress inference entirely — a non-device category never
/// gets a form factor.
pub fn infer_device_form(category: Option<&str>, name: Option<&str>) -> Option<DeviceForm> {
    let category_lc = category.map(str::to_lowercase);

    if let Some(cat) = &category_lc
        && DEVICE_CATEGORY_BLACKLIST.iter().any(|b| cat.contains(b))
    {
        return None;
    }

    let mut haystacks: Vec<String> = Vec::with_capacity(2);
    if let Some(cat) = category_lc {
        haystacks.push(cat);
    }
    if let Some(n) = name {
        haystacks.push(n.to_lowercase());
    }

    for &(keyword, label) in FORM_FACTOR_RULES {
        if haystacks.iter().any(|h| h.contains(keyword)) {
            return DeviceForm::from_label(label);
        }
    }
    None
}
