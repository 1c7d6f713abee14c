//! Versioned bilingual (German/English) keyword tables for attribute
//! extraction.
//!
//! The canonical-key-to-synonym mapping lives here as explicit data, not
//! inline literals, so it can be tested and extended on its own. Matching
//! is case-insensitive substring; synonyms are stored lowercase.

use crate::attrs::AttrKey;

/// Bump whenever the tables below change in a way that affects output.
pub const KEYWORD_TABLE_VERSION: u32 = 3;

/// Synonyms for one canonical key. Order within the table defines match
/// priority: the first rule whose synonym occurs in a spec-row name wins.
#[derive(Debug, Clone, Copy)]
pub struct KeywordRule {
    pub key: AttrKey,
    pub synonyms: &'static [&'static str],
}

/// Spec-row name → canonical key. More specific synonyms come first so a
/// row like "Grafikprozessor" maps to Gpu before Processor can claim it.
pub const KEYWORD_RULES: &[KeywordRule] = &[
    KeywordRule {
        key: AttrKey::Gpu,
        synonyms: &[
            "grafikkarte",
            "grafikprozessor",
            "graphics card",
            "graphics processor",
            "gpu",
            "video card",
        ],
    },
    KeywordRule {
        key: AttrKey::Processor,
        synonyms: &["prozessor", "processor", "cpu", "chipsatz"],
    },
    KeywordRule {
        key: AttrKey::Ram,
        synonyms: &[
            "arbeitsspeicher",
            "speicherkapazität ram",
            "ram",
            "memory",
            "hauptspeicher",
        ],
    },
    KeywordRule {
        key: AttrKey::Storage,
        synonyms: &[
            "festplatte",
            "ssd",
            "massenspeicher",
            "speicherkapazität",
            "storage",
            "hard drive",
            "hdd",
        ],
    },
    KeywordRule {
        key: AttrKey::DisplaySize,
        synonyms: &[
            "bildschirmdiagonale",
            "displaygröße",
            "display size",
            "screen size",
            "diagonale",
        ],
    },
    KeywordRule {
        key: AttrKey::DisplayType,
        synonyms: &[
            "displaytyp",
            "bildschirmtechnologie",
            "paneltyp",
            "panel type",
            "display type",
            "display technology",
        ],
    },
    KeywordRule {
        key: AttrKey::Resolution,
        synonyms: &["auflösung", "resolution", "native auflösung"],
    },
    KeywordRule {
        key: AttrKey::AspectRatio,
        synonyms: &["seitenverhältnis", "aspect ratio"],
    },
    KeywordRule {
        key: AttrKey::Touch,
        synonyms: &["touchscreen", "touchdisplay", "berührungsbildschirm", "touch"],
    },
    KeywordRule {
        key: AttrKey::Os,
        synonyms: &["betriebssystem", "operating system"],
    },
    KeywordRule {
        key: AttrKey::Weight,
        synonyms: &["gewicht", "weight"],
    },
    KeywordRule {
        key: AttrKey::Battery,
        synonyms: &["akku", "batterie", "battery", "akkulaufzeit"],
    },
    KeywordRule {
        key: AttrKey::Connectivity,
        synonyms: &[
            "konnektivität",
            "connectivity",
            "wlan",
            "wi-fi",
            "wireless",
            "bluetooth",
        ],
    },
    KeywordRule {
        key: AttrKey::Ports,
        synonyms: &["anschlüsse", "schnittstellen", "ports", "interfaces"],
    },
];

/// Boilerplate negative values. A matched row whose value normalizes to one
/// of these is discarded, not stored.
pub const NEGATIVE_VALUES: &[&str] = &[
    "no",
    "none",
    "nein",
    "nicht vorhanden",
    "not available",
    "n/a",
    "na",
    "-",
    "ohne",
    "without",
    "keine",
    "keiner",
    "0",
];

/// Categories for which a device form factor must never be inferred.
pub const DEVICE_CATEGORY_BLACKLIST: &[&str] = &[
    "zubehör",
    "accessor",
    "kabel",
    "cable",
    "lüfter",
    "fan",
    "cooler",
    "kühler",
    "peripherie",
    "peripheral",
    "komponente",
    "component",
    "maus",
    "mouse",
    "tastatur",
    "keyboard",
    "netzteil",
    "power supply",
];

/// Device form-factor keywords, checked against category and display name.
pub const FORM_FACTOR_RULES: &[(&str, &str)] = &[
    ("all-in-one", "All-in-One"),
    ("aio", "All-in-One"),
    ("workstation", "Workstation"),
    ("gaming-pc", "Gaming PC"),
    ("gaming pc", "Gaming PC"),
    ("mini-pc", "Mini PC"),
    ("mini pc", "Mini PC"),
    ("tablet", "Tablet"),
    ("notebook", "Notebook"),
    ("laptop", "Notebook"),
    ("ultrabook", "Notebook"),
    ("convertible", "Notebook"),
    ("desktop", "Desktop"),
    ("tower", "Desktop"),
];
