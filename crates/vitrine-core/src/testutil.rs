//! Test utilities: mock implementations of all core traits.
//!
//! Handwritten mocks for dependency injection in unit tests. All mocks use
//! `Arc<Mutex<_>>` for interior mutability, allowing test assertions on
//! recorded calls.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{compute_hash, ExportRecord, NewExportRecord, SyncState};
use crate::traits::{
    Cleaner, ExportStore, Extractor, Fetcher, ListingPayload, RemoteProduct, SearchProvider,
    ShopClient,
};

// ---------------------------------------------------------------------------
// MockFetcher
// ---------------------------------------------------------------------------

/// Mock fetcher that returns a configurable response.
#[derive(Clone)]
pub struct MockFetcher {
    /// Queue of responses. Each call pops the first element.
    /// If empty, returns a default HTML string.
    responses: Arc<Mutex<Vec<Result<String, AppError>>>>,
    pub calls: Arc<Mutex<Vec<String>>>,
}

impl MockFetcher {
    pub fn new(html: &str) -> Self {
        Self {
            responses: Arc::new(Mutex::new(vec![Ok(html.to_string())])),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_error(error: AppError) -> Self {
        Self {
            responses: Arc::new(Mutex::new(vec![Err(error)])),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_responses(responses: Vec<Result<String, AppError>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl Fetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<String, AppError> {
        self.calls.lock().unwrap().push(url.to_string());
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok("<html><body>default</body></html>".to_string())
        } else {
            responses.remove(0)
        }
    }
}

// ---------------------------------------------------------------------------
// MockCleaner
// ---------------------------------------------------------------------------

/// Mock cleaner that passes input through or fails once.
#[derive(Clone)]
pub struct MockCleaner {
    error: Arc<Mutex<Option<AppError>>>,
}

impl MockCleaner {
    /// Creates a cleaner that returns the input unchanged.
    pub fn passthrough() -> Self {
        Self {
            error: Arc::new(Mutex::new(None)),
        }
    }

    pub fn with_error(error: AppError) -> Self {
        Self {
            error: Arc::new(Mutex::new(Some(error))),
        }
    }
}

impl Cleaner for MockCleaner {
    fn clean(&self, html: &str) -> Result<String, AppError> {
        let mut err = self.error.lock().unwrap();
        if let Some(e) = err.take() {
            return Err(e);
        }
        Ok(html.to_string())
    }
}

// ---------------------------------------------------------------------------
// MockExtractor
// ---------------------------------------------------------------------------

/// Mock AI extractor returning configurable raw text.
#[derive(Clone)]
pub struct MockExtractor {
    responses: Arc<Mutex<Vec<Result<String, AppError>>>>,
}

impl MockExtractor {
    pub fn new(raw: &str) -> Self {
        Self {
            responses: Arc::new(Mutex::new(vec![Ok(raw.to_string())])),
        }
    }

    pub fn with_error(error: AppError) -> Self {
        Self {
            responses: Arc::new(Mutex::new(vec![Err(error)])),
        }
    }
}

impl Extractor for MockExtractor {
    async fn extract_attributes(
        &self,
        _content: &str,
        _product_label: &str,
    ) -> Result<String, AppError> {
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok(String::new())
        } else {
            responses.remove(0)
        }
    }
}

// ---------------------------------------------------------------------------
// MockSearch
// ---------------------------------------------------------------------------

/// Mock search provider with a queue of URL lists.
#[derive(Clone)]
pub struct MockSearch {
    responses: Arc<Mutex<Vec<Result<Vec<String>, AppError>>>>,
    call_count: Arc<Mutex<usize>>,
}

impl MockSearch {
    /// Always returns no candidates.
    pub fn empty() -> Self {
        Self {
            responses: Arc::new(Mutex::new(Vec::new())),
            call_count: Arc::new(Mutex::new(0)),
        }
    }

    /// First call returns these URLs; later calls return none.
    pub fn with_urls(urls: Vec<String>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(vec![Ok(urls)])),
            call_count: Arc::new(Mutex::new(0)),
        }
    }

    pub fn with_error(error: AppError) -> Self {
        Self {
            responses: Arc::new(Mutex::new(vec![Err(error)])),
            call_count: Arc::new(Mutex::new(0)),
        }
    }

    pub fn calls(&self) -> usize {
        *self.call_count.lock().unwrap()
    }
}

impl SearchProvider for MockSearch {
    async fn search(&self, _search_url: &str, _term: &str) -> Result<Vec<String>, AppError> {
        *self.call_count.lock().unwrap() += 1;
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok(Vec::new())
        } else {
            responses.remove(0)
        }
    }
}

// ---------------------------------------------------------------------------
// MockExportStore
// ---------------------------------------------------------------------------

/// Mock export store backed by an in-memory map keyed by EAN.
#[derive(Clone)]
pub struct MockExportStore {
    records: Arc<Mutex<BTreeMap<String, ExportRecord>>>,
    pub upserts: Arc<Mutex<Vec<NewExportRecord>>>,
    pub platform_ids: Arc<Mutex<Vec<(Uuid, i64)>>>,
    pub uploaded: Arc<Mutex<Vec<Uuid>>>,
    pub errors: Arc<Mutex<Vec<(Uuid, String)>>>,
    upsert_error: Arc<Mutex<Option<AppError>>>,
    mark_uploaded_error: Arc<Mutex<Option<AppError>>>,
}

impl MockExportStore {
    pub fn empty() -> Self {
        Self::with_records(Vec::new())
    }

    pub fn with_records(records: Vec<ExportRecord>) -> Self {
        let map = records.into_iter().map(|r| (r.ean.clone(), r)).collect();
        Self {
            records: Arc::new(Mutex::new(map)),
            upserts: Arc::new(Mutex::new(Vec::new())),
            platform_ids: Arc::new(Mutex::new(Vec::new())),
            uploaded: Arc::new(Mutex::new(Vec::new())),
            errors: Arc::new(Mutex::new(Vec::new())),
            upsert_error: Arc::new(Mutex::new(None)),
            mark_uploaded_error: Arc::new(Mutex::new(None)),
        }
    }

    pub fn fail_next_upsert(&self, error: AppError) {
        *self.upsert_error.lock().unwrap() = Some(error);
    }

    pub fn fail_next_mark_uploaded(&self, error: AppError) {
        *self.mark_uploaded_error.lock().unwrap() = Some(error);
    }

    /// Force a stored record into a state, e.g. to simulate a prior failed
    /// run.
    pub fn force_state(&self, ean: &str, state: SyncState) {
        let mut records = self.records.lock().unwrap();
        if let Some(r) = records.get_mut(ean) {
            r.state = state;
        }
    }

    pub fn stored(&self, ean: &str) -> Option<ExportRecord> {
        self.records.lock().unwrap().get(ean).cloned()
    }
}

impl ExportStore for MockExportStore {
    async fn upsert(&self, record: &NewExportRecord) -> Result<(ExportRecord, bool), AppError> {
        let mut err = self.upsert_error.lock().unwrap();
        if let Some(e) = err.take() {
            return Err(e);
        }
        drop(err);

        self.upserts.lock().unwrap().push(record.clone());

        let mut records = self.records.lock().unwrap();
        let existing = records.get(&record.ean);
        let changed = existing
            .map(|e| e.content_hash != record.content_hash)
            .unwrap_or(true);
        let (id, platform_id, created_at) = existing
            .map(|e| (e.id, e.platform_id, e.created_at))
            .unwrap_or_else(|| (Uuid::new_v4(), None, Utc::now()));

        let stored = ExportRecord {
            id,
            ean: record.ean.clone(),
            title: record.title.clone(),
            description_html: record.description_html.clone(),
            spec_table_html: record.spec_table_html.clone(),
            tags: record.tags.clone(),
            short_description: record.short_description.clone(),
            promo_text: record.promo_text.clone(),
            metafields: record.metafields.clone(),
            image_urls: record.image_urls.clone(),
            price: record.price,
            stock: record.stock,
            brand: record.brand.clone(),
            category: record.category.clone(),
            content_hash: record.content_hash.clone(),
            platform_id,
            state: SyncState::Pending,
            last_error: None,
            created_at,
            updated_at: Utc::now(),
        };
        records.insert(record.ean.clone(), stored.clone());
        Ok((stored, changed))
    }

    async fn get(&self, ean: &str) -> Result<Option<ExportRecord>, AppError> {
        Ok(self.records.lock().unwrap().get(ean).cloned())
    }

    async fn eligible(&self) -> Result<Vec<ExportRecord>, AppError> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.state.is_eligible())
            .cloned()
            .collect())
    }

    async fn set_platform_id(&self, id: Uuid, platform_id: i64) -> Result<(), AppError> {
        self.platform_ids.lock().unwrap().push((id, platform_id));
        let mut records = self.records.lock().unwrap();
        if let Some(r) = records.values_mut().find(|r| r.id == id) {
            r.platform_id = Some(platform_id);
        }
        Ok(())
    }

    async fn mark_uploaded(&self, id: Uuid) -> Result<(), AppError> {
        let mut err = self.mark_uploaded_error.lock().unwrap();
        if let Some(e) = err.take() {
            return Err(e);
        }
        drop(err);

        self.uploaded.lock().unwrap().push(id);
        let mut records = self.records.lock().unwrap();
        if let Some(r) = records.values_mut().find(|r| r.id == id) {
            r.state = SyncState::Uploaded;
            r.last_error = None;
        }
        Ok(())
    }

    async fn mark_error(&self, id: Uuid, message: &str) -> Result<(), AppError> {
        self.errors.lock().unwrap().push((id, message.to_string()));
        let mut records = self.records.lock().unwrap();
        if let Some(r) = records.values_mut().find(|r| r.id == id) {
            r.state = SyncState::Error;
            r.last_error = Some(message.to_string());
        }
        Ok(())
    }

    async fn counts_by_state(&self) -> Result<Vec<(SyncState, i64)>, AppError> {
        let records = self.records.lock().unwrap();
        let mut counts: BTreeMap<&'static str, (SyncState, i64)> = BTreeMap::new();
        for r in records.values() {
            counts
                .entry(r.state.as_str())
                .or_insert((r.state, 0))
                .1 += 1;
        }
        Ok(counts.into_values().collect())
    }
}

// ---------------------------------------------------------------------------
// MockShopClient
// ---------------------------------------------------------------------------

/// Mock commerce-platform client with an in-memory remote catalog.
#[derive(Clone)]
pub struct MockShopClient {
    products: Arc<Mutex<HashMap<i64, RemoteProduct>>>,
    handles: Arc<Mutex<HashMap<String, i64>>>,
    next_id: Arc<Mutex<i64>>,
    call_delay: Duration,
    /// Successful creates, in order.
    pub creates: Arc<Mutex<Vec<ListingPayload>>>,
    /// Every create attempt, including failed ones.
    pub create_calls: Arc<Mutex<usize>>,
    /// Successful updates by platform id, in order.
    pub updates: Arc<Mutex<Vec<i64>>>,
    pub replaced_images: Arc<Mutex<Vec<(i64, Vec<String>)>>>,
    create_errors: Arc<Mutex<Vec<AppError>>>,
    create_errors_for: Arc<Mutex<HashMap<String, Vec<AppError>>>>,
    update_errors: Arc<Mutex<Vec<AppError>>>,
}

impl MockShopClient {
    /// A platform that knows no products yet.
    pub fn empty() -> Self {
        Self {
            products: Arc::new(Mutex::new(HashMap::new())),
            handles: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(Mutex::new(1000)),
            call_delay: Duration::ZERO,
            creates: Arc::new(Mutex::new(Vec::new())),
            create_calls: Arc::new(Mutex::new(0)),
            updates: Arc::new(Mutex::new(Vec::new())),
            replaced_images: Arc::new(Mutex::new(Vec::new())),
            create_errors: Arc::new(Mutex::new(Vec::new())),
            create_errors_for: Arc::new(Mutex::new(HashMap::new())),
            update_errors: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A platform already carrying one product under the given handle.
    pub fn with_product(id: i64, handle: &str, image_count: usize) -> Self {
        let client = Self::empty();
        client.products.lock().unwrap().insert(
            id,
            RemoteProduct {
                id,
                handle: handle.to_string(),
                image_count,
            },
        );
        client.handles.lock().unwrap().insert(handle.to_string(), id);
        client
    }

    /// Add an artificial latency to every call.
    pub fn with_call_delay(mut self, delay: Duration) -> Self {
        self.call_delay = delay;
        self
    }

    pub fn fail_next_create(&self, error: AppError) {
        self.create_errors.lock().unwrap().push(error);
    }

    /// Queue a create failure only for the payload with this handle.
    pub fn fail_next_create_for(&self, handle: &str, error: AppError) {
        self.create_errors_for
            .lock()
            .unwrap()
            .entry(handle.to_string())
            .or_default()
            .push(error);
    }

    pub fn fail_next_update(&self, error: AppError) {
        self.update_errors.lock().unwrap().push(error);
    }

    async fn delay(&self) {
        if !self.call_delay.is_zero() {
            tokio::time::sleep(self.call_delay).await;
        }
    }
}

impl ShopClient for MockShopClient {
    async fn get_product(&self, id: i64) -> Result<Option<RemoteProduct>, AppError> {
        self.delay().await;
        Ok(self.products.lock().unwrap().get(&id).cloned())
    }

    async fn find_by_handle(&self, handle: &str) -> Result<Option<RemoteProduct>, AppError> {
        self.delay().await;
        let handles = self.handles.lock().unwrap();
        let products = self.products.lock().unwrap();
        Ok(handles.get(handle).and_then(|id| products.get(id)).cloned())
    }

    async fn create_product(&self, payload: &ListingPayload) -> Result<RemoteProduct, AppError> {
        self.delay().await;
        *self.create_calls.lock().unwrap() += 1;

        {
            let mut per_handle = self.create_errors_for.lock().unwrap();
            if let Some(queue) = per_handle.get_mut(&payload.handle)
                && !queue.is_empty()
            {
                return Err(queue.remove(0));
            }
        }
        {
            let mut errors = self.create_errors.lock().unwrap();
            if !errors.is_empty() {
                return Err(errors.remove(0));
            }
        }

        let id = {
            let mut next = self.next_id.lock().unwrap();
            *next += 1;
            *next
        };
        let remote = RemoteProduct {
            id,
            handle: payload.handle.clone(),
            image_count: payload.image_urls.len(),
        };
        self.products.lock().unwrap().insert(id, remote.clone());
        self.handles
            .lock()
            .unwrap()
            .insert(payload.handle.clone(), id);
        self.creates.lock().unwrap().push(payload.clone());
        Ok(remote)
    }

    async fn update_product(&self, id: i64, _payload: &ListingPayload) -> Result<(), AppError> {
        self.delay().await;
        let mut errors = self.update_errors.lock().unwrap();
        if !errors.is_empty() {
            return Err(errors.remove(0));
        }
        drop(errors);
        self.updates.lock().unwrap().push(id);
        Ok(())
    }

    async fn replace_images(&self, id: i64, image_urls: &[String]) -> Result<(), AppError> {
        self.delay().await;
        self.replaced_images
            .lock()
            .unwrap()
            .push((id, image_urls.to_vec()));
        let mut products = self.products.lock().unwrap();
        if let Some(p) = products.get_mut(&id) {
            p.image_count = image_urls.len();
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

/// Create a dummy export record for testing.
pub fn make_export_record(ean: &str, state: SyncState) -> ExportRecord {
    ExportRecord {
        id: Uuid::new_v4(),
        ean: ean.to_string(),
        title: format!("Test product {ean}"),
        description_html: "<div class=\"product-description\" data-composed=\"vitrine\"><p>Test</p></div>"
            .to_string(),
        spec_table_html: None,
        tags: vec!["Test".to_string()],
        short_description: "Test product".to_string(),
        promo_text: "The smart choice. Order today!".to_string(),
        metafields: serde_json::json!({}),
        image_urls: vec![format!("https://img.test/{ean}.jpg")],
        price: 99.9,
        stock: 10,
        brand: Some("ASUS".to_string()),
        category: Some("Notebooks".to_string()),
        content_hash: compute_hash(ean),
        platform_id: None,
        state,
        last_error: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}
