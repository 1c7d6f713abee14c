//! Orchestrates the staging pipeline for one product:
//! resolve → compose → upsert.

use crate::compose::compose_listing;
use crate::error::AppError;
use crate::models::{listing_content_hash, ExportRecord, NewExportRecord, ProductRecord};
use crate::resolve::EnrichmentResolver;
use crate::traits::{Cleaner, ExportStore, Extractor, Fetcher, SearchProvider};

/// Outcome of staging one product.
#[derive(Debug, Clone)]
pub struct StageResult {
    pub record: ExportRecord,
    /// True when the stored content differs from the previous staging.
    pub changed: bool,
    /// True when Layer 1 satisfied the required attribute set by itself.
    pub short_circuited: bool,
    pub attribute_count: usize,
}

/// Runs the enrichment pipeline and persists the staged listing.
///
/// Generic over all external dependencies via traits, enabling dependency
/// injection and testability without real HTTP, LLM, or database calls.
pub struct StagingService<F, C, S, E, St>
where
    F: Fetcher,
    C: Cleaner,
    S: SearchProvider,
    E: Extractor,
    St: ExportStore,
{
    resolver: EnrichmentResolver<F, C, S, E>,
    store: St,
}

impl<F, C, S, E, St> StagingService<F, C, S, E, St>
where
    F: Fetcher,
    C: Cleaner,
    S: SearchProvider,
    E: Extractor,
    St: ExportStore,
{
    pub fn new(resolver: EnrichmentResolver<F, C, S, E>, store: St) -> Self {
        Self { resolver, store }
    }

    /// Stage one product: resolve attributes, compose the listing, upsert
    /// the export record. The upsert resets the record's sync state to
    /// pending, so a re-staged record is always picked up by the next
    /// sync run.
    pub async fn stage(&self, product: &ProductRecord) -> Result<StageResult, AppError> {
        tracing::info!(ean = %product.ean, "Resolving attributes");
        let resolution = self.resolver.resolve(product).await;

        let listing = compose_listing(product, &resolution);
        if listing.spec_table_html.is_none() {
            // Completeness signal: no row qualified for the table.
            tracing::warn!(ean = %product.ean, "No specification table for this listing");
        }

        let metafields = resolution.attrs.to_metafields();
        let content_hash = listing_content_hash(&listing, &metafields);

        let new_record = NewExportRecord {
            ean: product.ean.clone(),
            title: listing.title,
            description_html: listing.description_html,
            spec_table_html: listing.spec_table_html,
            tags: listing.tags,
            short_description: listing.short_description,
            promo_text: listing.promo_text,
            metafields,
            image_urls: product.image_urls.clone(),
            price: product.price,
            stock: product.stock,
            brand: product.brand.clone(),
            category: product.category.clone(),
            content_hash,
        };

        let (record, changed) = self.store.upsert(&new_record).await?;
        tracing::info!(
            ean = %product.ean,
            changed,
            attributes = resolution.attrs.len(),
            short_circuited = resolution.short_circuited,
            "Staged listing"
        );

        Ok(StageResult {
            record,
            changed,
            short_circuited: resolution.short_circuited,
            attribute_count: resolution.attrs.len(),
        })
    }
}
