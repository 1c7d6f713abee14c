use chrono::{DateTime, Utc};
use sqlx::{PgPool, Pool, Postgres};
use uuid::Uuid;
use vitrine_core::error::AppError;
use vitrine_core::models::{ExportRecord, NewExportRecord, SyncState};

/// Repository for export-staging records in PostgreSQL.
///
/// One row per product, keyed by EAN. The upsert fully overwrites the
/// generated fields and unconditionally resets the sync state to pending —
/// regeneration invalidates any prior upload status, and an error-state
/// record is re-queued even when its content did not change.
#[derive(Clone)]
pub struct ExportRecordRepository {
    pool: Pool<Postgres>,
}

impl ExportRecordRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run pending migrations from the migrations/ directory.
    pub async fn migrate(&self) -> Result<(), AppError> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;
        Ok(())
    }

    /// Create or fully overwrite the record for `record.ean`. Returns the
    /// stored row and whether the content hash changed.
    pub async fn upsert(
        &self,
        record: &NewExportRecord,
    ) -> Result<(ExportRecord, bool), AppError> {
        let previous_hash: Option<(String,)> =
            sqlx::query_as("SELECT content_hash FROM export_records WHERE ean = $1")
                .bind(&record.ean)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        let changed = previous_hash
            .map(|(hash,)| hash != record.content_hash)
            .unwrap_or(true);

        let row = sqlx::query_as::<_, ExportRecordRow>(
            r#"
            INSERT INTO export_records (
                ean, title, description_html, spec_table_html, tags,
                short_description, promo_text, metafields, image_urls,
                price, stock, brand, category, content_hash, state
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, 'pending')
            ON CONFLICT (ean) DO UPDATE SET
                title = EXCLUDED.title,
                description_html = EXCLUDED.description_html,
                spec_table_html = EXCLUDED.spec_table_html,
                tags = EXCLUDED.tags,
                short_description = EXCLUDED.short_description,
                promo_text = EXCLUDED.promo_text,
                metafields = EXCLUDED.metafields,
                image_urls = EXCLUDED.image_urls,
                price = EXCLUDED.price,
                stock = EXCLUDED.stock,
                brand = EXCLUDED.brand,
                category = EXCLUDED.category,
                content_hash = EXCLUDED.content_hash,
                state = 'pending',
                last_error = NULL,
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(&record.ean)
        .bind(&record.title)
        .bind(&record.description_html)
        .bind(&record.spec_table_html)
        .bind(&record.tags)
        .bind(&record.short_description)
        .bind(&record.promo_text)
        .bind(&record.metafields)
        .bind(&record.image_urls)
        .bind(record.price)
        .bind(record.stock)
        .bind(&record.brand)
        .bind(&record.category)
        .bind(&record.content_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok((row.try_into()?, changed))
    }

    pub async fn get(&self, ean: &str) -> Result<Option<ExportRecord>, AppError> {
        let row = sqlx::query_as::<_, ExportRecordRow>(
            "SELECT * FROM export_records WHERE ean = $1",
        )
        .bind(ean)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        row.map(TryInto::try_into).transpose()
    }

    /// Snapshot of records eligible for upload: pending or error.
    pub async fn eligible(&self) -> Result<Vec<ExportRecord>, AppError> {
        let rows = sqlx::query_as::<_, ExportRecordRow>(
            r#"
            SELECT * FROM export_records
            WHERE state IN ('pending', 'error')
            ORDER BY updated_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// All records, for status reporting.
    pub async fn all(&self) -> Result<Vec<ExportRecord>, AppError> {
        let rows = sqlx::query_as::<_, ExportRecordRow>(
            "SELECT * FROM export_records ORDER BY ean ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    pub async fn set_platform_id(&self, id: Uuid, platform_id: i64) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE export_records SET platform_id = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(platform_id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;
        Ok(())
    }

    pub async fn mark_uploaded(&self, id: Uuid) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE export_records
            SET state = 'uploaded', last_error = NULL, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;
        Ok(())
    }

    pub async fn mark_error(&self, id: Uuid, message: &str) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE export_records
            SET state = 'error', last_error = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(message)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;
        Ok(())
    }

    pub async fn counts_by_state(&self) -> Result<Vec<(SyncState, i64)>, AppError> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT state, COUNT(*) FROM export_records GROUP BY state ORDER BY state",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        rows.into_iter()
            .map(|(state, count)| {
                state
                    .parse::<SyncState>()
                    .map(|s| (s, count))
                    .map_err(AppError::DatabaseError)
            })
            .collect()
    }

    /// Check database connectivity.
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;
        Ok(())
    }
}

// -- Internal row type for sqlx deserialization --

#[derive(sqlx::FromRow)]
struct ExportRecordRow {
    id: Uuid,
    ean: String,
    title: String,
    description_html: String,
    spec_table_html: Option<String>,
    tags: Vec<String>,
    short_description: String,
    promo_text: String,
    metafields: serde_json::Value,
    image_urls: Vec<String>,
    price: f64,
    stock: i64,
    brand: Option<String>,
    category: Option<String>,
    content_hash: String,
    platform_id: Option<i64>,
    state: String,
    last_error: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ExportRecordRow> for ExportRecord {
    type Error = AppError;

    fn try_from(row: ExportRecordRow) -> Result<Self, AppError> {
        let state = row
            .state
            .parse::<SyncState>()
            .map_err(AppError::DatabaseError)?;
        Ok(ExportRecord {
            id: row.id,
            ean: row.ean,
            title: row.title,
            description_html: row.description_html,
            spec_table_html: row.spec_table_html,
            tags: row.tags,
            short_description: row.short_description,
            promo_text: row.promo_text,
            metafields: row.metafields,
            image_urls: row.image_urls,
            price: row.price,
            stock: row.stock,
            brand: row.brand,
            category: row.category,
            content_hash: row.content_hash,
            platform_id: row.platform_id,
            state,
            last_error: row.last_error,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

// -- Trait implementation --

impl vitrine_core::traits::ExportStore for ExportRecordRepository {
    async fn upsert(&self, record: &NewExportRecord) -> Result<(ExportRecord, bool), AppError> {
        ExportRecordRepository::upsert(self, record).await
    }

    async fn get(&self, ean: &str) -> Result<Option<ExportRecord>, AppError> {
        ExportRecordRepository::get(self, ean).await
    }

    async fn eligible(&self) -> Result<Vec<ExportRecord>, AppError> {
        ExportRecordRepository::eligible(self).await
    }

    async fn set_platform_id(&self, id: Uuid, platform_id: i64) -> Result<(), AppError> {
        ExportRecordRepository::set_platform_id(self, id, platform_id).await
    }

    async fn mark_uploaded(&self, id: Uuid) -> Result<(), AppError> {
        ExportRecordRepository::mark_uploaded(self, id).await
    }

    async fn mark_error(&self, id: Uuid, message: &str) -> Result<(), AppError> {
        ExportRecordRepository::mark_error(self, id, message).await
    }

    async fn counts_by_state(&self) -> Result<Vec<(SyncState, i64)>, AppError> {
        ExportRecordRepository::counts_by_state(self).await
    }
}
