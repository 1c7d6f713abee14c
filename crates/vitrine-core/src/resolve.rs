//! Layered enrichment resolution: local structured data, validated external
//! lookup, AI-assisted extraction.
//!
//! Layers run strictly in sequence because each is gated by the previous
//! one. Every external failure degrades — to the next candidate, the next
//! site, or an empty contribution — so resolution itself never fails a
//! record. The merge is trust-ordered: externally sourced values only fill
//! gaps the local layer left.

use crate::attrs::{AttrKey, AttributeMap};
use crate::extract::{extract_attributes, is_negative_value};
use crate::models::ProductRecord;
use crate::traits::{Cleaner, Extractor, Fetcher, SearchProvider};

/// Attribute keys that must all be present for Layer 1 to short-circuit.
pub const REQUIRED_KEYS: &[AttrKey] = &[
    AttrKey::Processor,
    AttrKey::Ram,
    AttrKey::Storage,
    AttrKey::Gpu,
    AttrKey::Os,
];

/// One trusted retailer/catalog site, in trust order.
#[derive(Debug, Clone)]
pub struct LookupSite {
    pub name: &'static str,
    /// Search endpoint with a `{query}` placeholder.
    pub search_url: &'static str,
}

/// Built-in trust-ordered lookup sites.
pub fn default_lookup_sites() -> Vec<LookupSite> {
    vec![
        LookupSite {
            name: "geizhals",
            search_url: "https://geizhals.de/?fs={query}",
        },
        LookupSite {
            name: "idealo",
            search_url: "https://www.idealo.de/preisvergleich/MainSearchProductCategory.html?q={query}",
        },
        LookupSite {
            name: "icecat",
            search_url: "https://icecat.biz/en/search?keyword={query}",
        },
    ]
}

/// A candidate page that passed identity validation.
#[derive(Debug, Clone)]
pub struct ValidatedPage {
    pub url: String,
    /// Cleaned, size-capped text.
    pub text: String,
}

/// Tagged outcome of the external lookup layer.
#[derive(Debug, Clone)]
pub enum LookupOutcome {
    Found(ValidatedPage),
    NotFound,
}

/// Result of resolving one product.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub attrs: AttributeMap,
    /// Existing description text carried over from the record.
    pub description: Option<String>,
    /// True when Layer 1 alone satisfied the required set.
    pub short_circuited: bool,
    /// Validated page the AI layer read, if any.
    pub source_url: Option<String>,
}

/// Tuning knobs for the resolver.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Candidate URLs fetched per (site, term) pair.
    pub max_candidates: usize,
    /// Cleaned-text cap handed to the AI layer, in bytes.
    pub max_page_bytes: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_candidates: 3,
            max_page_bytes: 24_000,
        }
    }
}

/// Orchestrates the three resolution layers over injected seams.
pub struct EnrichmentResolver<F, C, S, E>
where
    F: Fetcher,
    C: Cleaner,
    S: SearchProvider,
    E: Extractor,
{
    fetcher: F,
    cleaner: C,
    search: S,
    extractor: E,
    sites: Vec<LookupSite>,
    config: ResolverConfig,
}

impl<F, C, S, E> EnrichmentResolver<F, C, S, E>
where
    F: Fetcher,
    C: Cleaner,
    S: SearchProvider,
    E: Extractor,
{
    pub fn new(fetcher: F, cleaner: C, search: S, extractor: E) -> Self {
        Self {
            fetcher,
            cleaner,
            search,
            extractor,
            sites: default_lookup_sites(),
            config: ResolverConfig::default(),
        }
    }

    pub fn with_sites(mut self, sites: Vec<LookupSite>) -> Self {
        self.sites = sites;
        self
    }

    pub fn with_config(mut self, config: ResolverConfig) -> Self {
        self.config = config;
        self
    }

    /// Resolve the most complete attribute map achievable for one product.
    ///
    /// Infallible by design: every upstream failure degrades to a smaller
    /// contribution, never an error.
    pub async fn resolve(&self, product: &ProductRecord) -> Resolution {
        // Layer 1: local structured data.
        let sheet = product.spec_sheet.clone().unwrap_or_default();
        let mut attrs = extract_attributes(&sheet, product.category.as_deref());

        if attrs.has_all(REQUIRED_KEYS) {
            tracing::info!(ean = %product.ean, "Layer 1 complete, skipping external lookup");
            return Resolution {
                attrs,
                description: product.description.clone(),
                short_circuited: true,
                source_url: None,
            };
        }

        // Layer 2: validated external lookup.
        let outcome = self.lookup(product).await;

        // Layer 3: AI-assisted extraction, only over a validated page.
        let mut source_url = None;
        if let LookupOutcome::Found(page) = outcome {
            let label = product_label(product);
            match self.extractor.extract_attributes(&page.text, &label).await {
                Ok(raw) => {
                    let candidates = parse_ai_attributes(&raw);
                    let filled = attrs.fill_missing(&candidates);
                    tracing::info!(
                        ean = %product.ean,
                        url = %page.url,
                        candidates = candidates.len(),
                        filled,
                        "AI extraction merged under local attributes"
                    );
                }
                Err(e) => {
                    // Degrade to an empty contribution.
                    tracing::warn!(ean = %product.ean, error = %e, "AI extraction failed");
                }
            }
            source_url = Some(page.url);
        }

        Resolution {
            attrs,
            description: product.description.clone(),
            short_circuited: false,
            source_url,
        }
    }

    /// Layer 2: query each site with successive search terms until some
    /// candidate page validates. "Not found" is a normal outcome.
    pub async fn lookup(&self, product: &ProductRecord) -> LookupOutcome {
        let terms = search_terms(product);
        if terms.is_empty() {
            return LookupOutcome::NotFound;
        }

        for site in &self.sites {
            for term in &terms {
                let urls = match self.search.search(site.search_url, term).await {
                    Ok(urls) => urls,
                    Err(e) => {
                        tracing::warn!(site = site.name, term = %term, error = %e, "Search failed");
                        continue;
                    }
                };

                for url in urls.iter().take(self.config.max_candidates) {
                    let html = match self.fetcher.fetch(url).await {
                        Ok(html) => html,
                        Err(e) => {
                            tracing::debug!(url = %url, error = %e, "Candidate fetch failed");
                            continue;
                        }
                    };

                    if !contains_identity(&html, product) {
                        // Same category, wrong model. Never contributes.
                        tracing::debug!(url = %url, "Candidate lacks identity markers, discarded");
                        continue;
                    }

                    let text = match self.cleaner.clean(&html) {
                        Ok(text) => text,
                        Err(e) => {
                            tracing::debug!(url = %url, error = %e, "Candidate clean failed");
                            continue;
                        }
                    };

                    tracing::info!(site = site.name, url = %url, "Candidate page validated");
                    return LookupOutcome::Found(ValidatedPage {
                        url: url.clone(),
                        text: truncate_to_bytes(&text, self.config.max_page_bytes),
                    });
                }
            }
        }

        LookupOutcome::NotFound
    }
}

/// Candidate search terms, most specific first.
fn search_terms(product: &ProductRecord) -> Vec<String> {
    let mut terms = vec![product.ean.trim().to_string()];
    if let Some(mpn) = &product.mpn
        && !mpn.trim().is_empty()
    {
        terms.push(mpn.trim().to_string());
    }
    if let Some(name) = &product.name
        && !name.trim().is_empty()
    {
        terms.push(name.trim().to_string());
    }
    terms.retain(|t| !t.is_empty());
    terms
}

/// A candidate is valid only if its raw text carries the trade identifier
/// or the manufacturer part number verbatim.
fn contains_identity(raw: &str, product: &ProductRecord) -> bool {
    let ean = product.ean.trim();
    if !ean.is_empty() && raw.contains(ean) {
        return true;
    }
    match &product.mpn {
        Some(mpn) if !mpn.trim().is_empty() => raw.contains(mpn.trim()),
        _ => false,
    }
}

fn product_label(product: &ProductRecord) -> String {
    match (&product.brand, &product.name) {
        (Some(b), Some(n)) => format!("{b} {n}"),
        (None, Some(n)) => n.clone(),
        (Some(b), None) => b.clone(),
        (None, None) => product.ean.clone(),
    }
}

fn truncate_to_bytes(text: &str, cap: usize) -> String {
    if text.len() <= cap {
        return text.to_string();
    }
    let mut end = cap;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}

/// Parse the AI layer's raw response into candidate attributes.
///
/// Accepts either a flat JSON object or pipe-delimited `key|value` lines.
/// Anything else — unknown keys, empty or boilerplate values, garbled
/// lines — is skipped, never an error.
pub fn parse_ai_attributes(raw: &str) -> AttributeMap {
    let mut map = AttributeMap::new();
    let trimmed = strip_code_fences(raw.trim());

    if trimmed.starts_with('{') {
        if let Ok(serde_json::Value::Object(obj)) =
            serde_json::from_str::<serde_json::Value>(trimmed)
        {
            for (key, value) in obj {
                let Ok(attr) = key.parse::<AttrKey>() else {
                    continue;
                };
                if let Some(s) = value.as_str()
                    && !is_negative_value(s)
                {
                    map.set_if_absent(attr, s);
                }
            }
        }
        return map;
    }

    for line in trimmed.lines() {
        let Some((key, value)) = line.split_once('|') else {
            continue;
        };
        let Ok(attr) = key.parse::<AttrKey>() else {
            continue;
        };
        let value = value.trim();
        if !value.is_empty() && !is_negative_value(value) {
            map.set_if_absent(attr, value);
        }
    }
    map
}

fn strip_code_fences(raw: &str) -> &str {
    let raw = raw.trim();
    let Some(stripped) = raw.strip_prefix("```") else {
        return raw;
    };
    // Drop the info string (e.g. "json") up to the first newline.
    let stripped = match stripped.find('\n') {
        Some(idx) => &stripped[idx + 1..],
        None => stripped,
    };
    stripped.strip_suffix("```").unwrap_or(stripped).trim()
}
