use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use testcontainers::core::{ContainerPort, WaitFor};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, GenericImage, ImageExt};
use vitrine_core::models::NewExportRecord;

/// SQL migration statements, executed one at a time.
const MIGRATIONS: &[&str] = &[
    // 0001_create_export_records.sql
    r#"CREATE TABLE IF NOT EXISTS export_records (
        id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
        ean VARCHAR(64) NOT NULL UNIQUE,
        title TEXT NOT NULL,
        description_html TEXT NOT NULL,
        spec_table_html TEXT,
        tags TEXT[] NOT NULL DEFAULT '{}',
        short_description TEXT NOT NULL DEFAULT '',
        promo_text TEXT NOT NULL DEFAULT '',
        metafields JSONB NOT NULL DEFAULT '{}',
        image_urls TEXT[] NOT NULL DEFAULT '{}',
        price DOUBLE PRECISION NOT NULL DEFAULT 0,
        stock BIGINT NOT NULL DEFAULT 0,
        brand TEXT,
        category TEXT,
        content_hash VARCHAR(64) NOT NULL,
        platform_id BIGINT,
        state VARCHAR(20) NOT NULL DEFAULT 'pending',
        last_error TEXT,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        CONSTRAINT chk_export_records_state CHECK (
            state IN ('pending', 'uploaded', 'error')
        )
    )"#,
    r#"CREATE INDEX IF NOT EXISTS idx_export_records_eligible
        ON export_records(updated_at) WHERE state IN ('pending', 'error')"#,
    r#"CREATE INDEX IF NOT EXISTS idx_export_records_platform_id
        ON export_records(platform_id) WHERE platform_id IS NOT NULL"#,
];

/// Spins up a PostgreSQL container and returns a connected pool.
///
/// The `ContainerAsync` must be kept in scope for the test duration —
/// dropping it will stop the container.
pub async fn setup_test_db() -> (PgPool, ContainerAsync<GenericImage>) {
    let container = GenericImage::new("postgres", "16")
        .with_exposed_port(ContainerPort::Tcp(5432))
        .with_wait_for(WaitFor::message_on_stderr(
            "database system is ready to accept connections",
        ))
        .with_env_var("POSTGRES_PASSWORD", "postgres")
        .with_env_var("POSTGRES_DB", "vitrine_test")
        .start()
        .await
        .expect("Failed to start PostgreSQL container");

    let host = container.get_host().await.expect("Failed to get host");
    let port = container
        .get_host_port_ipv4(5432)
        .await
        .expect("Failed to get port");

    let connection_string = format!("postgresql://postgres:postgres@{host}:{port}/vitrine_test");

    // Retry connection until container is fully ready
    const MAX_RETRIES: u32 = 30;
    let mut retries = 0;
    let pool = loop {
        match PgPoolOptions::new()
            .max_connections(5)
            .connect(&connection_string)
            .await
        {
            Ok(pool) => break pool,
            Err(e) => {
                retries += 1;
                if retries >= MAX_RETRIES {
                    panic!("Failed to connect to database after {MAX_RETRIES} retries: {e}");
                }
                tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            }
        }
    };

    for migration in MIGRATIONS {
        sqlx::query(migration)
            .execute(&pool)
            .await
            .expect("Failed to run migration");
    }

    (pool, container)
}

/// A staged record ready to upsert.
pub fn make_new_record(ean: &str) -> NewExportRecord {
    NewExportRecord {
        ean: ean.to_string(),
        title: format!("ASUS Zenbook {ean}"),
        description_html: "<div class=\"product-description\" data-composed=\"vitrine\"><p>Test</p></div>".to_string(),
        spec_table_html: Some("<table class=\"spec-table\"><tbody><tr><th>CPU</th><td>i7</td></tr></tbody></table>".to_string()),
        tags: vec!["ASUS".to_string(), "Notebooks".to_string()],
        short_description: "ASUS Zenbook".to_string(),
        promo_text: "The smart choice. Order today!".to_string(),
        metafields: serde_json::json!({
            "ram": {"namespace": "specs", "key": "ram", "value": "16 GB", "type": "single_line_text_field"}
        }),
        image_urls: vec![format!("https://img.test/{ean}.jpg")],
        price: 999.0,
        stock: 4,
        brand: Some("ASUS".to_string()),
        category: Some("Notebooks".to_string()),
        content_hash: vitrine_core::compute_hash(ean),
    }
}
