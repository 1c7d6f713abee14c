//! Rate-limited, idempotent upload dispatcher.
//!
//! A run operates over a snapshot of eligible records taken at start.
//! Records are processed in small fixed-size batches; calls within a batch
//! run concurrently, batches run strictly in sequence with an enforced
//! pause — that ordering is the sole protection of the platform's rate
//! budget. Per-record failures never abort sibling records; only a
//! persistence failure aborts the run.

use std::future::Future;
use std::time::Duration;

use crate::error::AppError;
use crate::models::ExportRecord;
use crate::traits::{ExportStore, ListingPayload, RemoteProduct, ShopClient};

/// Dispatch and backoff tuning.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Records uploaded concurrently per batch.
    pub batch_size: usize,
    /// Pause between batches, tuned to the platform's leaky-bucket
    /// replenishment rate.
    pub batch_pause: Duration,
    /// Bounded retry count for rate-limited calls.
    pub max_rate_limit_retries: u32,
    /// Fallback wait when the platform sends no Retry-After hint.
    pub default_retry_after: Duration,
    /// Safety margin added on top of every rate-limit wait.
    pub retry_margin: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            batch_size: 4,
            batch_pause: Duration::from_secs(2),
            max_rate_limit_retries: 3,
            default_retry_after: Duration::from_secs(2),
            retry_margin: Duration::from_millis(500),
        }
    }
}

/// Tagged result of identity resolution against the platform.
#[derive(Debug, Clone)]
pub enum ResolveOutcome {
    Found(RemoteProduct),
    NotFound,
}

/// Summary of one sync run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub total: usize,
    pub uploaded: usize,
    pub failed: usize,
}

/// Uploads eligible export records to the commerce platform.
pub struct SyncEngine<C, S>
where
    C: ShopClient,
    S: ExportStore,
{
    client: C,
    store: S,
    config: SyncConfig,
}

impl<C, S> SyncEngine<C, S>
where
    C: ShopClient,
    S: ExportStore,
{
    pub fn new(client: C, store: S) -> Self {
        Self {
            client,
            store,
            config: SyncConfig::default(),
        }
    }

    pub fn with_config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    /// Run one sync pass over a snapshot of eligible records.
    pub async fn run(&self) -> Result<SyncReport, AppError> {
        let snapshot = self.store.eligible().await?;
        let mut report = SyncReport {
            total: snapshot.len(),
            ..Default::default()
        };
        tracing::info!(records = snapshot.len(), "Sync run starting");

        let mut first_batch = true;
        for batch in snapshot.chunks(self.config.batch_size.max(1)) {
            if !first_batch {
                tokio::time::sleep(self.config.batch_pause).await;
            }
            first_batch = false;

            let outcomes =
                futures::future::join_all(batch.iter().map(|record| self.sync_one(record))).await;

            for outcome in outcomes {
                match outcome {
                    Ok(true) => report.uploaded += 1,
                    Ok(false) => report.failed += 1,
                    // Persistence failure is fatal for the whole run.
                    Err(e) => return Err(e),
                }
            }
        }

        tracing::info!(
            total = report.total,
            uploaded = report.uploaded,
            failed = report.failed,
            "Sync run finished"
        );
        Ok(report)
    }

    /// Upload one record. Returns Ok(true) on upload, Ok(false) when the
    /// failure was recorded on the record, Err only on persistence failure.
    async fn sync_one(&self, record: &ExportRecord) -> Result<bool, AppError> {
        match self.upload(record).await {
            Ok(()) => {
                self.store.mark_uploaded(record.id).await?;
                tracing::info!(ean = %record.ean, "Uploaded");
                Ok(true)
            }
            Err(e @ AppError::DatabaseError(_)) => Err(e),
            Err(e) => {
                tracing::warn!(ean = %record.ean, error = %e, "Upload failed");
                self.store.mark_error(record.id, &e.to_string()).await?;
                Ok(false)
            }
        }
    }

    async fn upload(&self, record: &ExportRecord) -> Result<(), AppError> {
        let payload = payload_for(record);

        match self.resolve_identity(record).await? {
            ResolveOutcome::Found(remote) => {
                self.with_backoff(|| self.client.update_product(remote.id, &payload))
                    .await?;
                // Cheap heuristic: only touch images when the counts differ.
                if remote.image_count != record.image_urls.len() {
                    self.with_backoff(|| self.client.replace_images(remote.id, &record.image_urls))
                        .await?;
                }
            }
            ResolveOutcome::NotFound => {
                let created = self
                    .with_backoff(|| self.client.create_product(&payload))
                    .await?;
                self.store.set_platform_id(record.id, created.id).await?;
            }
        }
        Ok(())
    }

    /// Resolve-or-create: stored id first, then the stable handle. A
    /// recovered id is persisted immediately so future runs skip the
    /// fallback.
    async fn resolve_identity(&self, record: &ExportRecord) -> Result<ResolveOutcome, AppError> {
        if let Some(id) = record.platform_id {
            if let Some(remote) = self.with_backoff(|| self.client.get_product(id)).await? {
                return Ok(ResolveOutcome::Found(remote));
            }
            tracing::warn!(ean = %record.ean, platform_id = id, "Stale platform id, trying handle");
        }

        let handle = record.handle();
        if let Some(remote) = self.with_backoff(|| self.client.find_by_handle(&handle)).await? {
            self.store.set_platform_id(record.id, remote.id).await?;
            tracing::info!(ean = %record.ean, platform_id = remote.id, "Recovered id via handle");
            return Ok(ResolveOutcome::Found(remote));
        }

        Ok(ResolveOutcome::NotFound)
    }

    /// Retry a rate-limited call, honouring the platform's Retry-After
    /// hint, up to the configured attempt bound. Only the throttled call
    /// waits; concurrent records keep their own schedule.
    async fn with_backoff<T, Op, Fut>(&self, mut op: Op) -> Result<T, AppError>
    where
        Op: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        let mut attempt = 0u32;
        loop {
            match op().await {
                Err(AppError::RateLimited { retry_after })
                    if attempt < self.config.max_rate_limit_retries =>
                {
                    attempt += 1;
                    let wait = retry_after
                        .map(Duration::from_secs_f64)
                        .unwrap_or(self.config.default_retry_after)
                        + self.config.retry_margin;
                    tracing::warn!(
                        attempt,
                        wait_ms = wait.as_millis() as u64,
                        "Rate limited, backing off"
                    );
                    tokio::time::sleep(wait).await;
                }
                other => return other,
            }
        }
    }
}

/// Full create/update payload for a staged record.
fn payload_for(record: &ExportRecord) -> ListingPayload {
    ListingPayload {
        title: record.title.clone(),
        body_html: record.description_html.clone(),
        vendor: record.brand.clone(),
        product_type: record.category.clone(),
        tags: record.tags.clone(),
        handle: record.handle(),
        price: record.price,
        quantity: record.stock,
        image_urls: record.image_urls.clone(),
        metafields: record.metafields.clone(),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;
    use crate::models::SyncState;
    use crate::testutil::*;

    fn fast_config() -> SyncConfig {
        SyncConfig {
            batch_size: 4,
            batch_pause: Duration::from_millis(10),
            max_rate_limit_retries: 3,
            default_retry_after: Duration::from_millis(50),
            retry_margin: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn new_record_is_created_with_images_and_id_persisted() {
        let record = make_export_record("4711034567890", SyncState::Pending);
        let store = MockExportStore::with_records(vec![record.clone()]);
        let client = MockShopClient::empty();
        let engine = SyncEngine::new(client.clone(), store.clone()).with_config(fast_config());

        let report = engine.run().await.unwrap();

        assert_eq!(report, SyncReport { total: 1, uploaded: 1, failed: 0 });
        {
            let creates = client.creates.lock().unwrap();
            assert_eq!(creates.len(), 1);
            assert_eq!(creates[0].handle, record.handle());
            assert_eq!(creates[0].image_urls, record.image_urls);
        }
        // Created id persisted, record marked uploaded.
        assert_eq!(store.platform_ids.lock().unwrap().len(), 1);
        assert_eq!(*store.uploaded.lock().unwrap(), vec![record.id]);
    }

    #[tokio::test]
    async fn existing_record_is_updated_not_recreated() {
        let mut record = make_export_record("4711034567890", SyncState::Pending);
        record.platform_id = Some(900);
        let store = MockExportStore::with_records(vec![record.clone()]);
        let client = MockShopClient::with_product(900, &record.handle(), record.image_urls.len());
        let engine = SyncEngine::new(client.clone(), store.clone()).with_config(fast_config());

        let report = engine.run().await.unwrap();

        assert_eq!(report.uploaded, 1);
        assert_eq!(client.creates.lock().unwrap().len(), 0);
        assert_eq!(*client.updates.lock().unwrap(), vec![900]);
        // Image counts match: no wholesale replacement.
        assert!(client.replaced_images.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn image_count_mismatch_triggers_wholesale_replacement() {
        let mut record = make_export_record("4711034567890", SyncState::Pending);
        record.platform_id = Some(900);
        record.image_urls = vec!["https://img/1.jpg".into(), "https://img/2.jpg".into()];
        let store = MockExportStore::with_records(vec![record.clone()]);
        let client = MockShopClient::with_product(900, &record.handle(), 5);
        let engine = SyncEngine::new(client.clone(), store.clone()).with_config(fast_config());

        engine.run().await.unwrap();

        let replaced = client.replaced_images.lock().unwrap();
        assert_eq!(replaced.len(), 1);
        assert_eq!(replaced[0].0, 900);
        assert_eq!(replaced[0].1.len(), 2);
    }

    #[tokio::test]
    async fn stale_id_falls_back_to_handle_and_persists_recovered_id() {
        let mut record = make_export_record("4711034567890", SyncState::Pending);
        record.platform_id = Some(55); // no longer resolves
        let store = MockExportStore::with_records(vec![record.clone()]);
        let client = MockShopClient::with_product(77, &record.handle(), record.image_urls.len());
        let engine = SyncEngine::new(client.clone(), store.clone()).with_config(fast_config());

        let report = engine.run().await.unwrap();

        assert_eq!(report.uploaded, 1);
        assert_eq!(*store.platform_ids.lock().unwrap(), vec![(record.id, 77)]);
        assert_eq!(*client.updates.lock().unwrap(), vec![77]);
        assert_eq!(client.creates.lock().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn rate_limit_waits_at_least_the_hint_then_retries() {
        let record = make_export_record("4711034567890", SyncState::Pending);
        let store = MockExportStore::with_records(vec![record.clone()]);
        let client = MockShopClient::empty();
        client.fail_next_create(AppError::RateLimited {
            retry_after: Some(0.2),
        });
        let engine = SyncEngine::new(client.clone(), store.clone()).with_config(fast_config());

        let start = Instant::now();
        let report = engine.run().await.unwrap();

        assert!(start.elapsed() >= Duration::from_millis(200));
        assert_eq!(report.uploaded, 1);
        assert_eq!(*client.create_calls.lock().unwrap(), 2);
        assert_eq!(client.creates.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn rate_limit_exhaustion_fails_only_that_record() {
        let limited = make_export_record("4711034567890", SyncState::Pending);
        let healthy = make_export_record("4000000000001", SyncState::Pending);
        let store = MockExportStore::with_records(vec![limited.clone(), healthy.clone()]);
        let client = MockShopClient::empty();
        for _ in 0..4 {
            client.fail_next_create_for(&limited.handle(), AppError::RateLimited {
                retry_after: Some(0.01),
            });
        }
        let engine = SyncEngine::new(client.clone(), store.clone()).with_config(SyncConfig {
            max_rate_limit_retries: 3,
            default_retry_after: Duration::from_millis(10),
            retry_margin: Duration::ZERO,
            ..fast_config()
        });

        let report = engine.run().await.unwrap();

        assert_eq!(report, SyncReport { total: 2, uploaded: 1, failed: 1 });
        assert_eq!(*store.uploaded.lock().unwrap(), vec![healthy.id]);
        let errors = store.errors.lock().unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].0, limited.id);
    }

    #[tokio::test]
    async fn platform_rejection_is_terminal_for_the_run() {
        let record = make_export_record("4711034567890", SyncState::Pending);
        let store = MockExportStore::with_records(vec![record.clone()]);
        let client = MockShopClient::empty();
        client.fail_next_create(AppError::PlatformRejected("title can't be blank".into()));
        let engine = SyncEngine::new(client.clone(), store.clone()).with_config(fast_config());

        let report = engine.run().await.unwrap();

        assert_eq!(report.failed, 1);
        // No retry: exactly one create attempt, nothing created.
        assert_eq!(*client.create_calls.lock().unwrap(), 1);
        assert_eq!(client.creates.lock().unwrap().len(), 0);
        let errors = store.errors.lock().unwrap();
        assert!(errors[0].1.contains("title can't be blank"));
    }

    #[tokio::test]
    async fn error_state_records_are_retried_next_run() {
        let record = make_export_record("4711034567890", SyncState::Error);
        let store = MockExportStore::with_records(vec![record.clone()]);
        let client = MockShopClient::empty();
        let engine = SyncEngine::new(client.clone(), store.clone()).with_config(fast_config());

        let report = engine.run().await.unwrap();
        assert_eq!(report.uploaded, 1);
    }

    #[tokio::test]
    async fn uploaded_records_are_not_in_the_snapshot() {
        let record = make_export_record("4711034567890", SyncState::Uploaded);
        let store = MockExportStore::with_records(vec![record]);
        let client = MockShopClient::empty();
        let engine = SyncEngine::new(client.clone(), store.clone()).with_config(fast_config());

        let report = engine.run().await.unwrap();
        assert_eq!(report, SyncReport::default());
    }

    #[tokio::test]
    async fn persistence_failure_aborts_the_run() {
        let record = make_export_record("4711034567890", SyncState::Pending);
        let store = MockExportStore::with_records(vec![record]);
        store.fail_next_mark_uploaded(AppError::DatabaseError("connection lost".into()));
        let client = MockShopClient::empty();
        let engine = SyncEngine::new(client.clone(), store.clone()).with_config(fast_config());

        let err = engine.run().await.unwrap_err();
        assert!(matches!(err, AppError::DatabaseError(_)));
    }

    #[tokio::test]
    async fn batch_members_run_concurrently() {
        // Four records, one batch: with a per-call delay of 50ms a serial
        // engine would need 200ms+; concurrent dispatch stays well under.
        let records: Vec<_> = (0..4)
            .map(|i| make_export_record(&format!("400000000000{i}"), SyncState::Pending))
            .collect();
        let store = MockExportStore::with_records(records);
        let client = MockShopClient::empty().with_call_delay(Duration::from_millis(50));
        let engine = SyncEngine::new(client.clone(), store.clone()).with_config(fast_config());

        let start = Instant::now();
        let report = engine.run().await.unwrap();

        assert_eq!(report.uploaded, 4);
        assert!(start.elapsed() < Duration::from_millis(190));
    }

    #[tokio::test]
    async fn batches_are_paced() {
        let records: Vec<_> = (0..4)
            .map(|i| make_export_record(&format!("400000000000{i}"), SyncState::Pending))
            .collect();
        let store = MockExportStore::with_records(records);
        let client = MockShopClient::empty();
        let engine = SyncEngine::new(client.clone(), store.clone()).with_config(SyncConfig {
            batch_size: 1,
            batch_pause: Duration::from_millis(30),
            ..fast_config()
        });

        let start = Instant::now();
        engine.run().await.unwrap();
        // Three pauses between four single-record batches.
        assert!(start.elapsed() >= Duration::from_millis(90));
    }
}
