use std::sync::Arc;

use htmd::HtmlToMarkdown;
use vitrine_core::error::AppError;
use vitrine_core::traits::Cleaner;

/// HTML-to-text cleaner using htmd.
///
/// Strips non-content elements (script, style, navigation chrome) so the
/// AI layer sees only the page's actual copy and the identity markers the
/// resolver validated against stay intact.
pub struct HtmdCleaner {
    converter: Arc<HtmlToMarkdown>,
}

impl Clone for HtmdCleaner {
    fn clone(&self) -> Self {
        Self {
            converter: Arc::clone(&self.converter),
        }
    }
}

impl HtmdCleaner {
    pub fn new() -> Self {
        let converter = HtmlToMarkdown::builder()
            .skip_tags(vec![
                "script", "style", "nav", "footer", "header", "aside", "noscript", "iframe",
                "svg", "form",
            ])
            .build();

        Self {
            converter: Arc::new(converter),
        }
    }
}

impl Default for HtmdCleaner {
    fn default() -> Self {
        Self::new()
    }
}

impl Cleaner for HtmdCleaner {
    fn clean(&self, html: &str) -> Result<String, AppError> {
        self.converter
            .convert(html)
            .map_err(|e| AppError::CleanerError(e.to_string()))
    }
}
