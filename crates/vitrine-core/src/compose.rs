//! Deterministic content composition: title, description HTML,
//! specification table, tags, and promotional copy.
//!
//! Composition always renders from raw extracted values. The only
//! exception is a description that already carries the wrapper marker —
//! that one is returned verbatim, which is what makes re-composition
//! idempotent without any un-nesting tricks.

use crate::attrs::{AttrKey, AttributeMap};
use crate::extract::{classify_resolution, infer_device_form, ResolutionClass};
use crate::models::{compute_hash, GeneratedListing, ProductRecord, SpecSheet};
use crate::resolve::Resolution;
use crate::templates::{
    ideal_for_phrases, intro_template, promo_headlines, Segment, PROMO_CTAS, TEMPLATE_VERSION,
    WARRANTY_FOOTER,
};

/// Marker identifying a description this pipeline composed. A description
/// carrying it is never wrapped again.
pub const DESCRIPTION_MARKER: &str = "data-composed=\"vitrine\"";

const TITLE_MAX_CHARS: usize = 150;
const TITLE_ATTR_KEYS: [AttrKey; 5] = [
    AttrKey::Processor,
    AttrKey::Ram,
    AttrKey::Storage,
    AttrKey::DisplaySize,
    AttrKey::Os,
];

/// Compose the full listing for one resolved product.
pub fn compose_listing(product: &ProductRecord, resolution: &Resolution) -> GeneratedListing {
    let attrs = &resolution.attrs;
    let segment = detect_segment(product, attrs);
    let sheet = product.spec_sheet.clone().unwrap_or_default();

    let spec_table_html = compose_spec_table(&sheet);
    let description_html = compose_description(
        product,
        attrs,
        segment,
        spec_table_html.as_deref(),
        resolution.description.as_deref(),
    );

    GeneratedListing {
        title: compose_title(product, attrs),
        description_html,
        spec_table_html,
        tags: compose_tags(product, attrs, segment),
        short_description: compose_short_description(product, attrs),
        promo_text: compose_promo(product, attrs, segment),
    }
}

/// Detect the product-use segment from attributes, name and category.
pub fn detect_segment(product: &ProductRecord, attrs: &AttributeMap) -> Segment {
    let haystack = format!(
        "{} {}",
        product.name.as_deref().unwrap_or(""),
        product.category.as_deref().unwrap_or("")
    )
    .to_lowercase();

    let gpu = attrs.get(AttrKey::Gpu).unwrap_or("").to_lowercase();
    if haystack.contains("gaming")
        || gpu.contains("rtx")
        || gpu.contains("gtx")
        || gpu.contains("radeon rx")
    {
        return Segment::Gaming;
    }

    if haystack.contains("thinkpad")
        || haystack.contains("elitebook")
        || haystack.contains("latitude")
        || haystack.contains("probook")
        || haystack.contains("business")
        || attrs.get(AttrKey::PcType) == Some("Workstation")
    {
        return Segment::Business;
    }

    if haystack.contains("ultrabook") || haystack.contains("zenbook") || is_lightweight(attrs) {
        return Segment::Ultrabook;
    }

    Segment::Generic
}

fn is_lightweight(attrs: &AttributeMap) -> bool {
    // "1.2 kg", "1,3 kg", "998 g"
    let Some(weight) = attrs.get(AttrKey::Weight) else {
        return false;
    };
    let w = weight.to_lowercase().replace(',', ".");
    let number: String = w
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    let Ok(value) = number.parse::<f64>() else {
        return false;
    };
    if w.contains("kg") {
        value > 0.0 && value < 1.5
    } else if w.contains('g') {
        value > 0.0 && value < 1500.0
    } else {
        false
    }
}

// ---------------------------------------------------------------------------
// Title
// ---------------------------------------------------------------------------

/// Compose the listing title.
///
/// Canonical strategy: a well-formed existing short description is used
/// verbatim; otherwise brand + cleaned model tokens + category + up to five
/// ordered attributes, capped at 150 chars. The trade identifier never
/// appears in the title.
pub fn compose_title(product: &ProductRecord, attrs: &AttributeMap) -> String {
    if let Some(short) = &product.short_description {
        let short = short.trim();
        if short.chars().count() >= 20 && !is_code_like(short) {
            return truncate_words(short, TITLE_MAX_CHARS);
        }
    }

    let mut head: Vec<String> = Vec::new();
    if let Some(brand) = &product.brand
        && !brand.trim().is_empty()
    {
        head.push(brand.trim().to_string());
    }
    if let Some(name) = &product.name {
        let model = clean_model_tokens(name, product);
        if !model.is_empty() {
            head.push(model);
        }
    }
    if let Some(category) = &product.category
        && !category.trim().is_empty()
    {
        head.push(category.trim().to_string());
    }

    let mut title = head.join(" ");
    for key in TITLE_ATTR_KEYS {
        let Some(value) = attrs.get(key) else {
            continue;
        };
        let candidate_len = title.chars().count() + value.chars().count() + 3;
        if candidate_len > TITLE_MAX_CHARS {
            break;
        }
        if title.is_empty() {
            title.push_str(value);
        } else {
            title.push_str(" | ");
            title.push_str(value);
        }
    }

    truncate_words(title.trim(), TITLE_MAX_CHARS)
}

/// Strip the brand, the trade identifier, EAN-like digit runs and SKU-like
/// codes from a display name, keeping the human-readable model tokens.
fn clean_model_tokens(name: &str, product: &ProductRecord) -> String {
    let brand_lc = product.brand.as_deref().unwrap_or("").to_lowercase();
    let mpn_lc = product.mpn.as_deref().unwrap_or("").to_lowercase();

    name.split_whitespace()
        .filter(|token| {
            let t = token.to_lowercase();
            if !brand_lc.is_empty() && t == brand_lc {
                return false;
            }
            if t == product.ean.to_lowercase() || (!mpn_lc.is_empty() && t == mpn_lc) {
                return false;
            }
            // EAN-like: long unbroken digit run.
            if t.len() >= 8 && t.chars().all(|c| c.is_ascii_digit()) {
                return false;
            }
            true
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// A bare category or model code: one token, or mostly digits.
fn is_code_like(text: &str) -> bool {
    if !text.contains(char::is_whitespace) {
        return true;
    }
    let total = text.chars().filter(|c| !c.is_whitespace()).count();
    let digits = text.chars().filter(char::is_ascii_digit).count();
    total > 0 && digits * 10 >= total * 6
}

fn truncate_words(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut result = String::new();
    for word in text.split_whitespace() {
        let candidate = if result.is_empty() {
            word.chars().count()
        } else {
            result.chars().count() + 1 + word.chars().count()
        };
        if candidate > max_chars {
            break;
        }
        if !result.is_empty() {
            result.push(' ');
        }
        result.push_str(word);
    }
    result
}

// ---------------------------------------------------------------------------
// Specification table
// ---------------------------------------------------------------------------

/// Render the specification table from the structured sheet. One escaped
/// row per (name, value) pair with both fields non-empty; zero qualifying
/// rows means no table at all.
pub fn compose_spec_table(sheet: &SpecSheet) -> Option<String> {
    let rows: Vec<String> = sheet
        .items
        .iter()
        .filter(|item| !item.name.trim().is_empty() && !item.value.trim().is_empty())
        .map(|item| {
            let value = match &item.unit {
                Some(unit) if !unit.trim().is_empty() => {
                    format!("{} {}", item.value.trim(), unit.trim())
                }
                _ => item.value.trim().to_string(),
            };
            format!(
                "<tr><th>{}</th><td>{}</td></tr>",
                escape_html(item.name.trim()),
                escape_html(&value)
            )
        })
        .collect();

    if rows.is_empty() {
        return None;
    }

    Some(format!(
        "<table class=\"spec-table\"><tbody>{}</tbody></table>",
        rows.join("")
    ))
}

// ---------------------------------------------------------------------------
// Description
// ---------------------------------------------------------------------------

/// Render the description HTML, or return a previously composed one
/// unchanged.
pub fn compose_description(
    product: &ProductRecord,
    attrs: &AttributeMap,
    segment: Segment,
    spec_table_html: Option<&str>,
    carried_description: Option<&str>,
) -> String {
    if let Some(existing) = carried_description
        && existing.contains(DESCRIPTION_MARKER)
    {
        return existing.to_string();
    }

    let brand = product.brand.as_deref().unwrap_or("our partner brands");
    let category = product.category.as_deref().unwrap_or("product");

    let mut html = String::with_capacity(2048);
    html.push_str("<div class=\"product-description\" ");
    html.push_str(DESCRIPTION_MARKER);
    html.push('>');

    let intro = intro_template(segment)
        .replace("{brand}", &escape_html(brand))
        .replace("{category}", &escape_html(category));
    html.push_str("<p>");
    html.push_str(&intro);
    html.push_str("</p>");

    for section in feature_sections(attrs) {
        html.push_str(&section);
    }

    if let Some(table) = spec_table_html {
        html.push_str("<h3>Specifications</h3>");
        html.push_str(table);
    }

    html.push_str("<p class=\"ideal-for\">Ideal for ");
    html.push_str(&join_phrases(ideal_for_phrases(segment)));
    html.push_str(".</p>");

    html.push_str(WARRANTY_FOOTER);
    html.push_str("</div>");
    html
}

/// Feature-narrative sections, each gated on attribute presence.
fn feature_sections(attrs: &AttributeMap) -> Vec<String> {
    let mut sections = Vec::new();

    if attrs.contains(AttrKey::Processor) || attrs.contains(AttrKey::Ram) {
        let mut body = String::from("Work and play without waiting: ");
        match (attrs.get(AttrKey::Processor), attrs.get(AttrKey::Ram)) {
            (Some(cpu), Some(ram)) => {
                body.push_str(&format!(
                    "the {} is paired with {} of memory for smooth multitasking.",
                    escape_html(cpu),
                    escape_html(ram)
                ));
            }
            (Some(cpu), None) => {
                body.push_str(&format!("powered by the {}.", escape_html(cpu)));
            }
            (None, Some(ram)) => {
                body.push_str(&format!(
                    "{} of memory keeps your applications responsive.",
                    escape_html(ram)
                ));
            }
            (None, None) => unreachable!(),
        }
        sections.push(section("Performance", &body));
    }

    if attrs.contains(AttrKey::DisplaySize)
        || attrs.contains(AttrKey::Resolution)
        || attrs.contains(AttrKey::DisplayType)
    {
        let mut parts = Vec::new();
        if let Some(size) = attrs.get(AttrKey::DisplaySize) {
            parts.push(format!("{} screen", escape_html(size)));
        }
        if let Some(tech) = attrs.get(AttrKey::DisplayType) {
            parts.push(format!("{} panel", escape_html(tech)));
        }
        if let Some(res) = attrs.get(AttrKey::Resolution) {
            let class = classify_resolution(res);
            if class != ResolutionClass::Unknown {
                parts.push(format!("crisp {} resolution", class.as_str()));
            } else {
                parts.push(format!("{} resolution", escape_html(res)));
            }
        }
        let body = format!("A {} for sharp, vivid images.", parts.join(" with "));
        sections.push(section("Display", &body));
    }

    if attrs.contains(AttrKey::Weight) || attrs.contains(AttrKey::Battery) {
        let mut parts = Vec::new();
        if let Some(weight) = attrs.get(AttrKey::Weight) {
            parts.push(format!("at just {}", escape_html(weight)));
        }
        if let Some(battery) = attrs.get(AttrKey::Battery) {
            parts.push(format!("with {} battery", escape_html(battery)));
        }
        let body = format!("Made to travel: {}.", parts.join(", "));
        sections.push(section("Portability", &body));
    }

    if attrs.contains(AttrKey::Connectivity) || attrs.contains(AttrKey::Ports) {
        let mut parts = Vec::new();
        if let Some(conn) = attrs.get(AttrKey::Connectivity) {
            parts.push(escape_html(conn));
        }
        if let Some(ports) = attrs.get(AttrKey::Ports) {
            parts.push(escape_html(ports));
        }
        let body = format!("Stay connected: {}.", parts.join("; "));
        sections.push(section("Connectivity", &body));
    }

    if let Some(gpu) = attrs.get(AttrKey::Gpu) {
        let body = format!(
            "The {} renders games, creative tools and multi-monitor setups with ease.",
            escape_html(gpu)
        );
        sections.push(section("Graphics", &body));
    }

    sections
}

fn section(heading: &str, body: &str) -> String {
    format!("<h3>{heading}</h3><p>{body}</p>")
}

fn join_phrases(phrases: &[&str]) -> String {
    match phrases.len() {
        0 => String::new(),
        1 => phrases[0].to_string(),
        _ => {
            let (last, rest) = phrases.split_last().unwrap();
            format!("{} and {}", rest.join(", "), last)
        }
    }
}

// ---------------------------------------------------------------------------
// Tags
// ---------------------------------------------------------------------------

/// Category-specific attribute keys contributing tags, in priority order.
fn tag_rule_keys(product: &ProductRecord) -> &'static [AttrKey] {
    let category = product.category.as_deref().unwrap_or("").to_lowercase();
    if category.contains("monitor") || category.contains("display") {
        &[
            AttrKey::DisplaySize,
            AttrKey::Resolution,
            AttrKey::DisplayType,
            AttrKey::AspectRatio,
        ]
    } else if infer_device_form(product.category.as_deref(), product.name.as_deref()).is_some() {
        // Device categories (notebooks, desktops, tablets, …).
        &[
            AttrKey::PcType,
            AttrKey::Processor,
            AttrKey::Ram,
            AttrKey::Storage,
        ]
    } else {
        // Components and everything else.
        &[
            AttrKey::Gpu,
            AttrKey::Storage,
            AttrKey::Connectivity,
            AttrKey::Ports,
        ]
    }
}

/// Normalized tag set: brand, category, segment, plus up to four
/// attribute-derived tags. Title-cased, deduplicated, order-preserving.
pub fn compose_tags(product: &ProductRecord, attrs: &AttributeMap, segment: Segment) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();

    if let Some(brand) = &product.brand {
        push_tag(&mut tags, brand);
    }
    if let Some(category) = &product.category {
        push_tag(&mut tags, category);
    }
    push_tag(&mut tags, segment.as_str());

    let mut attr_tags = 0;
    for key in tag_rule_keys(product) {
        if attr_tags == 4 {
            break;
        }
        if let Some(value) = attrs.get(*key) && push_tag(&mut tags, value) {
            attr_tags += 1;
        }
    }

    tags
}

/// Push a title-cased tag unless it is empty or already present
/// (case-insensitive). Returns true when the tag was added.
fn push_tag(tags: &mut Vec<String>, raw: &str) -> bool {
    let tag = title_case(raw.trim());
    if tag.is_empty() || tags.iter().any(|t| t.eq_ignore_ascii_case(&tag)) {
        return false;
    }
    tags.push(tag);
    true
}

/// Uppercase the first letter of each word, leaving the rest untouched so
/// values like "16 GB DDR5" survive.
fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

// ---------------------------------------------------------------------------
// Short description & promo
// ---------------------------------------------------------------------------

fn compose_short_description(product: &ProductRecord, attrs: &AttributeMap) -> String {
    if let Some(short) = &product.short_description {
        let short = short.trim();
        if !short.is_empty() && !is_code_like(short) {
            return short.to_string();
        }
    }

    let mut parts: Vec<&str> = Vec::new();
    if let Some(brand) = &product.brand {
        parts.push(brand.trim());
    }
    if let Some(category) = &product.category {
        parts.push(category.trim());
    }
    if let Some(cpu) = attrs.get(AttrKey::Processor) {
        parts.push(cpu);
    }
    parts.retain(|p| !p.is_empty());
    parts.join(" – ")
}

/// One templated marketing sentence: headline + feature clause + CTA.
///
/// Pool picks are seeded from the trade identifier and the template
/// version, so copy varies across products but re-composing the same
/// product is stable.
pub fn compose_promo(product: &ProductRecord, attrs: &AttributeMap, segment: Segment) -> String {
    let seed = promo_seed(&product.ean);
    let headlines = promo_headlines(segment);
    let headline = headlines[pick(seed, headlines.len())];
    let cta = PROMO_CTAS[pick(xorshift(seed), PROMO_CTAS.len())];

    let features: Vec<&str> = [AttrKey::Processor, AttrKey::Ram, AttrKey::Storage, AttrKey::Gpu]
        .iter()
        .filter_map(|k| attrs.get(*k))
        .collect();

    if features.is_empty() {
        format!("{headline} — {cta}")
    } else {
        format!("{headline}: {}. {cta}", features.join(", "))
    }
}

fn promo_seed(ean: &str) -> u64 {
    let hash = compute_hash(ean);
    // First 16 hex chars of the SHA-256, folded with the template version.
    let folded = u64::from_str_radix(&hash[..16], 16).unwrap_or(0x9E37_79B9_7F4A_7C15);
    let seed = folded ^ u64::from(TEMPLATE_VERSION).rotate_left(32);
    if seed == 0 { 0x9E37_79B9_7F4A_7C15 } else { seed }
}

fn xorshift(mut x: u64) -> u64 {
    x ^= x << 13;
    x ^= x >> 7;
    x ^= x << 17;
    x
}

fn pick(seed: u64, len: usize) -> usize {
    (xorshift(seed) % len as u64) as usize
}

// ---------------------------------------------------------------------------
// Escaping
// ---------------------------------------------------------------------------

/// Minimal HTML escaping for all user-sourced text.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SpecItem;

    fn product() -> ProductRecord {
        ProductRecord {
            ean: "4711034567890".into(),
            mpn: Some("90NB0XX1".into()),
            name: Some("ASUS Zenbook 14 OLED 4711034567890".into()),
            brand: Some("ASUS".into()),
            category: Some("Notebooks".into()),
            price: 999.0,
            stock: 5,
            spec_sheet: None,
            description: None,
            short_description: None,
            image_urls: vec![],
        }
    }

    fn attrs(pairs: &[(AttrKey, &str)]) -> AttributeMap {
        pairs
            .iter()
            .map(|(k, v)| (*k, v.to_string()))
            .collect()
    }

    fn resolution(attrs: AttributeMap, description: Option<String>) -> Resolution {
        Resolution {
            attrs,
            description,
            short_circuited: false,
            source_url: None,
        }
    }

    #[test]
    fn title_never_contains_the_ean() {
        let title = compose_title(&product(), &attrs(&[(AttrKey::Ram, "16 GB")]));
        assert!(!title.contains("4711034567890"), "title was: {title}");
        assert!(title.contains("Zenbook"));
    }

    #[test]
    fn title_prefers_well_formed_short_description() {
        let mut p = product();
        p.short_description = Some("ASUS Zenbook 14 OLED ultraportable notebook".into());
        let title = compose_title(&p, &AttributeMap::new());
        assert_eq!(title, "ASUS Zenbook 14 OLED ultraportable notebook");
    }

    #[test]
    fn title_rejects_code_like_short_description() {
        let mut p = product();
        p.short_description = Some("NB-ZB14-4711034567".into());
        let title = compose_title(&p, &AttributeMap::new());
        assert!(title.contains("Zenbook"));
    }

    #[test]
    fn title_is_bounded() {
        let long_attrs = attrs(&[
            (AttrKey::Processor, "Intel Core Ultra 7 155H with vPro technology"),
            (AttrKey::Ram, "32 GB DDR5-5600 SO-DIMM dual channel"),
            (AttrKey::Storage, "2 TB PCIe 4.0 NVMe SSD"),
            (AttrKey::DisplaySize, "14.5 Zoll"),
            (AttrKey::Os, "Windows 11 Professional 64-bit"),
        ]);
        let title = compose_title(&product(), &long_attrs);
        assert!(title.chars().count() <= 150);
    }

    #[test]
    fn brand_category_fallback_when_nothing_else_known() {
        let mut p = product();
        p.name = None;
        p.short_description = None;
        let title = compose_title(&p, &AttributeMap::new());
        assert_eq!(title, "ASUS Notebooks");
    }

    #[test]
    fn spec_table_escapes_and_skips_empty_rows() {
        let sheet = SpecSheet {
            items: vec![
                SpecItem {
                    name: "Prozessor".into(),
                    value: "Intel <Core> i5 & friends".into(),
                    unit: None,
                },
                SpecItem {
                    name: "".into(),
                    value: "orphan".into(),
                    unit: None,
                },
                SpecItem {
                    name: "Gewicht".into(),
                    value: "".into(),
                    unit: Some("kg".into()),
                },
            ],
        };
        let table = compose_spec_table(&sheet).unwrap();
        assert!(table.contains("Intel &lt;Core&gt; i5 &amp; friends"));
        assert_eq!(table.matches("<tr>").count(), 1);
        assert!(table.starts_with("<table"));
        assert!(table.ends_with("</table>"));
    }

    #[test]
    fn empty_sheet_yields_no_table() {
        assert!(compose_spec_table(&SpecSheet::default()).is_none());
        let blank = SpecSheet {
            items: vec![SpecItem {
                name: "Akku".into(),
                value: "   ".into(),
                unit: None,
            }],
        };
        assert!(compose_spec_table(&blank).is_none());
    }

    #[test]
    fn description_carries_marker_and_footer() {
        let html = compose_description(
            &product(),
            &attrs(&[(AttrKey::Processor, "Intel Core i7")]),
            Segment::Ultrabook,
            None,
            None,
        );
        assert!(html.contains(DESCRIPTION_MARKER));
        assert!(html.contains("service-note"));
        assert!(html.contains("<h3>Performance</h3>"));
        assert!(html.starts_with("<div"));
        assert!(html.ends_with("</div>"));
    }

    #[test]
    fn composing_twice_never_nests_wrappers() {
        let a = attrs(&[(AttrKey::Processor, "Intel Core i7"), (AttrKey::Ram, "16 GB")]);
        let first = compose_description(&product(), &a, Segment::Generic, None, None);
        let second =
            compose_description(&product(), &a, Segment::Generic, None, Some(first.as_str()));
        assert_eq!(first, second);
        assert_eq!(second.matches(DESCRIPTION_MARKER).count(), 1);
    }

    #[test]
    fn listing_recomposition_is_byte_identical() {
        let p = product();
        let a = attrs(&[(AttrKey::Processor, "Intel Core i7"), (AttrKey::Gpu, "RTX 4060")]);
        let first = compose_listing(&p, &resolution(a.clone(), None));
        let second = compose_listing(
            &p,
            &resolution(a, Some(first.description_html.clone())),
        );
        assert_eq!(first, second);
    }

    #[test]
    fn feature_sections_are_gated_on_presence() {
        let html = compose_description(&product(), &AttributeMap::new(), Segment::Generic, None, None);
        assert!(!html.contains("<h3>Performance</h3>"));
        assert!(!html.contains("<h3>Display</h3>"));
        assert!(!html.contains("<h3>Graphics</h3>"));
    }

    #[test]
    fn segment_detection() {
        let p = product();
        assert_eq!(
            detect_segment(&p, &attrs(&[(AttrKey::Gpu, "GeForce RTX 4070")])),
            Segment::Gaming
        );
        assert_eq!(
            detect_segment(&p, &attrs(&[(AttrKey::Weight, "1.2 kg")])),
            Segment::Ultrabook
        );

        let mut biz = product();
        biz.name = Some("Lenovo ThinkPad T14".into());
        assert_eq!(detect_segment(&biz, &AttributeMap::new()), Segment::Business);

        let mut plain = product();
        plain.name = Some("Aspire 3".into());
        assert_eq!(detect_segment(&plain, &AttributeMap::new()), Segment::Generic);
    }

    #[test]
    fn tags_include_brand_category_segment_and_attrs() {
        let a = attrs(&[
            (AttrKey::PcType, "Notebook"),
            (AttrKey::Processor, "Intel Core i7-1355U"),
            (AttrKey::Ram, "16 GB"),
            (AttrKey::Storage, "512 GB SSD"),
            (AttrKey::Gpu, "Iris Xe"),
        ]);
        let tags = compose_tags(&product(), &a, Segment::Ultrabook);
        assert!(tags.contains(&"ASUS".to_string()));
        assert!(tags.contains(&"Notebooks".to_string()));
        assert!(tags.contains(&"Ultrabook".to_string()));
        // Device rules: pc_type, processor, ram, storage — not gpu.
        assert!(tags.contains(&"16 GB".to_string()));
        assert!(!tags.iter().any(|t| t.contains("Iris")));
        assert!(tags.len() <= 7);
    }

    #[test]
    fn tags_are_deduplicated_case_insensitively() {
        let mut p = product();
        p.brand = Some("asus".into());
        p.name = Some("ASUS Vivobook".into());
        let a = attrs(&[(AttrKey::PcType, "Notebook")]);
        let mut tags = compose_tags(&p, &a, Segment::Generic);
        tags.sort();
        tags.dedup();
        let unique = tags.len();
        let tags2 = compose_tags(&p, &a, Segment::Generic);
        assert_eq!(tags2.len(), unique);
    }

    #[test]
    fn monitor_tag_rules_differ_from_notebook_rules() {
        let mut p = product();
        p.category = Some("Monitore".into());
        p.name = Some("Dell U2723QE".into());
        let a = attrs(&[
            (AttrKey::DisplaySize, "27 Zoll"),
            (AttrKey::Resolution, "3840 x 2160"),
            (AttrKey::Processor, "irrelevant"),
        ]);
        let tags = compose_tags(&p, &a, Segment::Generic);
        assert!(tags.contains(&"27 Zoll".to_string()));
        assert!(!tags.iter().any(|t| t.contains("irrelevant")));
    }

    #[test]
    fn promo_is_stable_per_product_and_varies_across_products() {
        let p = product();
        let a = attrs(&[(AttrKey::Ram, "16 GB")]);
        let first = compose_promo(&p, &a, Segment::Generic);
        let second = compose_promo(&p, &a, Segment::Generic);
        assert_eq!(first, second);
        assert!(first.contains("16 GB"));

        // Different trade identifiers should (eventually) roll different copy.
        let mut other = product();
        let mut any_different = false;
        for i in 0..16 {
            other.ean = format!("400000000000{i}");
            if compose_promo(&other, &a, Segment::Generic) != first {
                any_different = true;
                break;
            }
        }
        assert!(any_different);
    }

    #[test]
    fn promo_without_features_still_reads_well() {
        let promo = compose_promo(&product(), &AttributeMap::new(), Segment::Gaming);
        assert!(promo.contains(" — "));
    }

    #[test]
    fn escape_html_covers_all_specials() {
        assert_eq!(
            escape_html(r#"<a href="x">&'"#),
            "&lt;a href=&quot;x&quot;&gt;&amp;&#39;"
        );
    }
}
