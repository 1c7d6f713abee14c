use std::future::Future;

use uuid::Uuid;

use crate::error::AppError;
use crate::models::{ExportRecord, NewExportRecord, SyncState};

/// Fetches raw HTML content from a URL.
pub trait Fetcher: Send + Sync + Clone {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<String, AppError>> + Send;
}

/// Converts raw HTML into clean text, stripping script/style/navigation.
pub trait Cleaner: Send + Sync + Clone {
    fn clean(&self, html: &str) -> Result<String, AppError>;
}

/// Extracts candidate attribute lines from page text using an LLM.
///
/// Returns the model's raw response; parsing is the resolver's job and is
/// fully defensive, so a malformed response can never fail a record.
pub trait Extractor: Send + Sync + Clone {
    fn extract_attributes(
        &self,
        content: &str,
        product_label: &str,
    ) -> impl Future<Output = Result<String, AppError>> + Send;
}

/// Searches one catalog/retailer site for candidate product page URLs.
pub trait SearchProvider: Send + Sync + Clone {
    /// Returns candidate URLs for `term` on the site whose search endpoint
    /// is `search_url` (with the `{query}` placeholder still in place).
    fn search(
        &self,
        search_url: &str,
        term: &str,
    ) -> impl Future<Output = Result<Vec<String>, AppError>> + Send;
}

/// Persists and retrieves export-staging records.
pub trait ExportStore: Send + Sync + Clone {
    /// Create or fully overwrite the record for `record.ean`. Always resets
    /// the sync state to pending and clears the last error; preserves the
    /// platform id. The bool is true when the stored content changed.
    fn upsert(
        &self,
        record: &NewExportRecord,
    ) -> impl Future<Output = Result<(ExportRecord, bool), AppError>> + Send;

    fn get(&self, ean: &str) -> impl Future<Output = Result<Option<ExportRecord>, AppError>> + Send;

    /// Snapshot of records eligible for upload (pending or error).
    fn eligible(&self) -> impl Future<Output = Result<Vec<ExportRecord>, AppError>> + Send;

    /// Persist a recovered platform id. Authoritative once set.
    fn set_platform_id(
        &self,
        id: Uuid,
        platform_id: i64,
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    fn mark_uploaded(&self, id: Uuid) -> impl Future<Output = Result<(), AppError>> + Send;

    fn mark_error(
        &self,
        id: Uuid,
        message: &str,
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    fn counts_by_state(
        &self,
    ) -> impl Future<Output = Result<Vec<(SyncState, i64)>, AppError>> + Send;
}

/// A product as the commerce platform reports it.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteProduct {
    pub id: i64,
    pub handle: String,
    pub image_count: usize,
}

/// Full listing payload submitted on create and update.
#[derive(Debug, Clone)]
pub struct ListingPayload {
    pub title: String,
    pub body_html: String,
    pub vendor: Option<String>,
    pub product_type: Option<String>,
    pub tags: Vec<String>,
    pub handle: String,
    pub price: f64,
    pub quantity: i64,
    pub image_urls: Vec<String>,
    /// Namespaced typed metafields, as serialized by `AttributeMap`.
    pub metafields: serde_json::Value,
}

/// Client for the external commerce platform's product resource.
pub trait ShopClient: Send + Sync + Clone {
    /// Look up by platform id. `Ok(None)` when the id no longer resolves.
    fn get_product(
        &self,
        id: i64,
    ) -> impl Future<Output = Result<Option<RemoteProduct>, AppError>> + Send;

    /// Look up by the stable handle. `Ok(None)` when unknown.
    fn find_by_handle(
        &self,
        handle: &str,
    ) -> impl Future<Output = Result<Option<RemoteProduct>, AppError>> + Send;

    fn create_product(
        &self,
        payload: &ListingPayload,
    ) -> impl Future<Output = Result<RemoteProduct, AppError>> + Send;

    /// Update metadata, metafields, price and quantity. Images are handled
    /// separately via `replace_images`.
    fn update_product(
        &self,
        id: i64,
        payload: &ListingPayload,
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Delete all remote images and submit the local list wholesale.
    fn replace_images(
        &self,
        id: i64,
        image_urls: &[String],
    ) -> impl Future<Output = Result<(), AppError>> + Send;
}
