use scraper::{Html, Selector};
use url::Url;
use vitrine_core::error::AppError;
use vitrine_core::traits::{Fetcher, SearchProvider};

/// Link paths that are site chrome, never product pages.
const LINK_BLACKLIST: &[&str] = &[
    "login",
    "account",
    "cart",
    "warenkorb",
    "wishlist",
    "merkzettel",
    "hilfe",
    "impressum",
    "datenschutz",
    "agb",
    "kontakt",
    "newsletter",
];

/// Keyword search against a retailer/catalog site's search endpoint.
///
/// Formats the site's `{query}` URL, fetches the result page, and pulls
/// candidate product links out of it. Candidates are same-host links only —
/// identity validation happens downstream in the resolver, this layer just
/// narrows the haystack.
#[derive(Clone)]
pub struct CatalogSearch<F> {
    fetcher: F,
    max_results: usize,
}

impl<F: Fetcher> CatalogSearch<F> {
    pub fn new(fetcher: F) -> Self {
        Self {
            fetcher,
            max_results: 5,
        }
    }

    pub fn with_max_results(mut self, max: usize) -> Self {
        self.max_results = max;
        self
    }
}

impl<F: Fetcher> SearchProvider for CatalogSearch<F> {
    async fn search(&self, search_url: &str, term: &str) -> Result<Vec<String>, AppError> {
        let encoded: String = url::form_urlencoded::byte_serialize(term.as_bytes()).collect();
        let url = search_url.replace("{query}", &encoded);

        tracing::debug!(url = %url, "Searching catalog site");
        let html = self.fetcher.fetch(&url).await?;

        Ok(extract_candidate_links(&html, &url, self.max_results))
    }
}

/// Pull same-host candidate links out of a search-result page, in document
/// order, deduplicated.
fn extract_candidate_links(html: &str, base_url: &str, max: usize) -> Vec<String> {
    let Ok(base) = Url::parse(base_url) else {
        return Vec::new();
    };
    let document = Html::parse_document(html);
    let selector = Selector::parse("a[href]").expect("static selector");

    let mut seen = Vec::new();
    for element in document.select(&selector) {
        if seen.len() == max {
            break;
        }
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let Ok(resolved) = base.join(href) else {
            continue;
        };
        if resolved.scheme() != "http" && resolved.scheme() != "https" {
            continue;
        }
        if resolved.host_str() != base.host_str() {
            continue;
        }
        let path = resolved.path();
        if path.len() <= 1 {
            continue;
        }
        let path_lc = path.to_lowercase();
        if LINK_BLACKLIST.iter().any(|b| path_lc.contains(b)) {
            continue;
        }
        // Strip fragments; keep query strings (some shops key products on them).
        let mut clean = resolved.clone();
        clean.set_fragment(None);
        let candidate = clean.to_string();
        if candidate == base_url || seen.contains(&candidate) {
            continue;
        }
        seen.push(candidate);
    }
    seen
}
