use vitrine_core::models::SyncState;
use vitrine_db::ExportRecordRepository;

use crate::integration::common::{make_new_record, setup_test_db};

#[tokio::test]
async fn upsert_creates_then_overwrites() {
    let (pool, _container) = setup_test_db().await;
    let repo = ExportRecordRepository::new(pool);

    let (created, changed) = repo.upsert(&make_new_record("4711034567890")).await.unwrap();
    assert!(changed, "first staging is always a change");
    assert_eq!(created.state, SyncState::Pending);
    assert_eq!(created.tags, vec!["ASUS".to_string(), "Notebooks".to_string()]);

    let mut update = make_new_record("4711034567890");
    update.title = "ASUS Zenbook 14 OLED".to_string();
    update.content_hash = vitrine_core::compute_hash("different");
    let (updated, changed) = repo.upsert(&update).await.unwrap();

    assert!(changed);
    assert_eq!(updated.id, created.id, "row identity is stable across upserts");
    assert_eq!(updated.title, "ASUS Zenbook 14 OLED");
}

#[tokio::test]
async fn upsert_with_same_hash_reports_unchanged() {
    let (pool, _container) = setup_test_db().await;
    let repo = ExportRecordRepository::new(pool);

    repo.upsert(&make_new_record("4711034567890")).await.unwrap();
    let (_, changed) = repo.upsert(&make_new_record("4711034567890")).await.unwrap();
    assert!(!changed);
}

#[tokio::test]
async fn upsert_resets_error_state_even_when_unchanged() {
    let (pool, _container) = setup_test_db().await;
    let repo = ExportRecordRepository::new(pool);

    let (record, _) = repo.upsert(&make_new_record("4711034567890")).await.unwrap();
    repo.mark_error(record.id, "boom").await.unwrap();

    let (restaged, changed) = repo.upsert(&make_new_record("4711034567890")).await.unwrap();
    assert!(!changed);
    assert_eq!(restaged.state, SyncState::Pending);
    assert!(restaged.last_error.is_none());
}

#[tokio::test]
async fn upsert_preserves_platform_id() {
    let (pool, _container) = setup_test_db().await;
    let repo = ExportRecordRepository::new(pool);

    let (record, _) = repo.upsert(&make_new_record("4711034567890")).await.unwrap();
    repo.set_platform_id(record.id, 4242).await.unwrap();

    let (restaged, _) = repo.upsert(&make_new_record("4711034567890")).await.unwrap();
    assert_eq!(restaged.platform_id, Some(4242));
}

#[tokio::test]
async fn eligible_returns_pending_and_error_only() {
    let (pool, _container) = setup_test_db().await;
    let repo = ExportRecordRepository::new(pool);

    let (pending, _) = repo.upsert(&make_new_record("4000000000001")).await.unwrap();
    let (errored, _) = repo.upsert(&make_new_record("4000000000002")).await.unwrap();
    let (uploaded, _) = repo.upsert(&make_new_record("4000000000003")).await.unwrap();

    repo.mark_error(errored.id, "platform said no").await.unwrap();
    repo.mark_uploaded(uploaded.id).await.unwrap();

    let eligible = repo.eligible().await.unwrap();
    let ids: Vec<_> = eligible.iter().map(|r| r.id).collect();
    assert!(ids.contains(&pending.id));
    assert!(ids.contains(&errored.id));
    assert!(!ids.contains(&uploaded.id));
}

#[tokio::test]
async fn state_transitions_round_trip() {
    let (pool, _container) = setup_test_db().await;
    let repo = ExportRecordRepository::new(pool);

    let (record, _) = repo.upsert(&make_new_record("4711034567890")).await.unwrap();

    repo.mark_error(record.id, "rate limited out").await.unwrap();
    let stored = repo.get("4711034567890").await.unwrap().unwrap();
    assert_eq!(stored.state, SyncState::Error);
    assert_eq!(stored.last_error.as_deref(), Some("rate limited out"));

    repo.mark_uploaded(record.id).await.unwrap();
    let stored = repo.get("4711034567890").await.unwrap().unwrap();
    assert_eq!(stored.state, SyncState::Uploaded);
    assert!(stored.last_error.is_none());
}

#[tokio::test]
async fn metafields_and_arrays_round_trip() {
    let (pool, _container) = setup_test_db().await;
    let repo = ExportRecordRepository::new(pool);

    let (record, _) = repo.upsert(&make_new_record("4711034567890")).await.unwrap();
    assert_eq!(record.metafields["ram"]["value"], "16 GB");
    assert_eq!(record.image_urls.len(), 1);
    assert!(record.spec_table_html.as_deref().unwrap().contains("<tr>"));
}

#[tokio::test]
async fn counts_by_state_groups_correctly() {
    let (pool, _container) = setup_test_db().await;
    let repo = ExportRecordRepository::new(pool);

    for i in 0..3 {
        repo.upsert(&make_new_record(&format!("400000000000{i}")))
            .await
            .unwrap();
    }
    let (one, _) = repo.upsert(&make_new_record("4000000000009")).await.unwrap();
    repo.mark_uploaded(one.id).await.unwrap();

    let counts = repo.counts_by_state().await.unwrap();
    let pending = counts
        .iter()
        .find(|(s, _)| *s == SyncState::Pending)
        .map(|(_, c)| *c);
    let uploaded = counts
        .iter()
        .find(|(s, _)| *s == SyncState::Uploaded)
        .map(|(_, c)| *c);
    assert_eq!(pending, Some(3));
    assert_eq!(uploaded, Some(1));
}

#[tokio::test]
async fn get_returns_none_for_unknown_ean() {
    let (pool, _container) = setup_test_db().await;
    let repo = ExportRecordRepository::new(pool);

    assert!(repo.get("0000000000000").await.unwrap().is_none());
}

#[tokio::test]
async fn health_check_succeeds() {
    let (pool, _container) = setup_test_db().await;
    let repo = ExportRecordRepository::new(pool);

    repo.health_check().await.unwrap();
}
