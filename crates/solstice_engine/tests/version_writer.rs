//! Version writer protocol tests against the in-memory store double.

mod common;

use std::sync::atomic::Ordering;

use chrono::Utc;
use common::MockStore;
use solstice_engine::writer::{replace_current, AttachmentInput, DocumentUpload, WriterError};

fn upload(project_id: i64, code: &str) -> DocumentUpload {
    DocumentUpload {
        project_id,
        doc_type_code: Some(code.to_string()),
        legacy_type: None,
        submitted_at: Some(Utc::now()),
        issued_at: None,
        is_archived: false,
        attachment: None,
        actor: Some("tester".to_string()),
    }
}

#[tokio::test]
async fn first_upload_gets_version_one_and_becomes_current() {
    let store = MockStore::new();
    let doc = replace_current(&store, &upload(1, "PPA")).await.unwrap();

    assert_eq!(doc.version, 1);
    assert!(doc.is_current);
    let current = store.current_rows(1, "PPA");
    assert_eq!(current.len(), 1);
    assert_eq!(current[0].id, doc.id);
}

#[tokio::test]
async fn replace_assigns_next_version_and_demotes_the_old_current() {
    let store = MockStore::new();
    let first = replace_current(&store, &upload(1, "PPA")).await.unwrap();
    let second = replace_current(&store, &upload(1, "PPA")).await.unwrap();

    assert_eq!(second.version, 2);
    let current = store.current_rows(1, "PPA");
    assert_eq!(current.len(), 1);
    assert_eq!(current[0].id, second.id);

    let all = store.all_rows(1, "PPA");
    assert_eq!(all.len(), 2);
    let old = all.iter().find(|d| d.id == first.id).unwrap();
    assert!(!old.is_current);
    assert!(!old.is_deleted);

    let versions: Vec<i64> = all.iter().map(|d| d.version).collect();
    assert_eq!(versions.iter().collect::<std::collections::HashSet<_>>().len(), 2);
}

#[tokio::test]
async fn keys_are_versioned_independently() {
    let store = MockStore::new();
    replace_current(&store, &upload(1, "PPA")).await.unwrap();
    let other_project = replace_current(&store, &upload(2, "PPA")).await.unwrap();
    let other_type = replace_current(&store, &upload(1, "GRID_APP")).await.unwrap();

    assert_eq!(other_project.version, 1);
    assert_eq!(other_type.version, 1);
}

#[tokio::test]
async fn version_race_is_retried_and_succeeds() {
    let store = MockStore::new();
    replace_current(&store, &upload(1, "PPA")).await.unwrap();

    // A concurrent writer wins the first insert; ours retries with a fresh
    // version read and lands on the next number.
    store.inject_conflicts.store(1, Ordering::SeqCst);
    let doc = replace_current(&store, &upload(1, "PPA")).await.unwrap();

    assert_eq!(doc.version, 2);
    let current = store.current_rows(1, "PPA");
    assert_eq!(current.len(), 1);
    assert_eq!(current[0].version, 2);
}

#[tokio::test]
async fn exhausted_retries_surface_a_version_conflict() {
    let store = MockStore::new();
    store.inject_conflicts.store(10, Ordering::SeqCst);

    let err = replace_current(&store, &upload(1, "PPA")).await.unwrap_err();
    match err {
        WriterError::VersionConflict {
            project_id,
            type_key,
            attempts,
        } => {
            assert_eq!(project_id, 1);
            assert_eq!(type_key, "PPA");
            assert_eq!(attempts, 3);
        }
        other => panic!("expected VersionConflict, got {other:?}"),
    }
    assert!(store.all_rows(1, "PPA").is_empty());
}

#[tokio::test]
async fn demote_failure_rolls_back_and_keeps_the_old_current() {
    let store = MockStore::new();
    let first = replace_current(&store, &upload(1, "PPA")).await.unwrap();

    store.fail_demote.store(true, Ordering::SeqCst);
    let err = replace_current(&store, &upload(1, "PPA")).await.unwrap_err();
    assert!(matches!(err, WriterError::DemotionFailed { .. }));

    // Prior valid state untouched; the stage-2 row is rolled back.
    let current = store.current_rows(1, "PPA");
    assert_eq!(current.len(), 1);
    assert_eq!(current[0].id, first.id);

    let orphan = store
        .all_rows(1, "PPA")
        .into_iter()
        .find(|d| d.id != first.id)
        .unwrap();
    assert!(orphan.is_deleted);
    assert!(!orphan.is_current);
}

#[tokio::test]
async fn promote_failure_rolls_back_leaving_at_most_one_current() {
    let store = MockStore::new();
    replace_current(&store, &upload(1, "PPA")).await.unwrap();

    store.fail_promote.store(true, Ordering::SeqCst);
    let err = replace_current(&store, &upload(1, "PPA")).await.unwrap_err();
    assert!(matches!(err, WriterError::PromotionFailed { .. }));

    // The old current was already demoted, so the key is briefly without a
    // current row; never with two.
    let current = store.current_rows(1, "PPA");
    assert!(current.len() <= 1);

    let rolled_back = store
        .all_rows(1, "PPA")
        .into_iter()
        .find(|d| d.version == 2)
        .unwrap();
    assert!(rolled_back.is_deleted);

    // A retry after the outage recovers the key.
    store.fail_promote.store(false, Ordering::SeqCst);
    let doc = replace_current(&store, &upload(1, "PPA")).await.unwrap();
    assert!(doc.is_current);
    assert_eq!(store.current_rows(1, "PPA").len(), 1);
}

#[tokio::test]
async fn at_most_one_current_holds_across_mixed_outcomes() {
    let store = MockStore::new();

    for round in 0..6 {
        store.fail_demote.store(round == 2, Ordering::SeqCst);
        store.fail_promote.store(round == 4, Ordering::SeqCst);
        let _ = replace_current(&store, &upload(1, "PPA")).await;
        assert!(
            store.current_rows(1, "PPA").len() <= 1,
            "invariant broken after round {round}"
        );
    }

    // Versions among surviving rows stay unique.
    let live: Vec<i64> = store
        .all_rows(1, "PPA")
        .into_iter()
        .filter(|d| !d.is_deleted)
        .map(|d| d.version)
        .collect();
    let unique: std::collections::HashSet<i64> = live.iter().copied().collect();
    assert_eq!(live.len(), unique.len());
}

#[tokio::test]
async fn attachment_and_audit_follow_a_successful_promote() {
    let store = MockStore::new();
    let mut up = upload(1, "PPA");
    up.attachment = Some(AttachmentInput {
        file_name: "ppa_signed.pdf".to_string(),
        storage_ref: "drive://solstice/ppa_signed.pdf".to_string(),
    });

    let doc = replace_current(&store, &up).await.unwrap();
    assert_eq!(doc.attachment_count, 1);
    assert_eq!(store.attachments.lock().unwrap().len(), 1);

    let audits = store.audits.lock().unwrap();
    assert_eq!(audits.len(), 1);
    assert_eq!(audits[0].0, "document");
    assert_eq!(audits[0].2, "replace_current");
}

#[tokio::test]
async fn attachment_failure_does_not_unwind_the_document_write() {
    let store = MockStore::new();
    store.fail_attachment.store(true, Ordering::SeqCst);

    let mut up = upload(1, "PPA");
    up.attachment = Some(AttachmentInput {
        file_name: "ppa.pdf".to_string(),
        storage_ref: "drive://ppa.pdf".to_string(),
    });

    let doc = replace_current(&store, &up).await.unwrap();
    assert!(doc.is_current);
    assert_eq!(doc.attachment_count, 0);
    assert_eq!(store.current_rows(1, "PPA").len(), 1);
}

#[tokio::test]
async fn upload_without_any_type_key_is_rejected() {
    let store = MockStore::new();
    let up = DocumentUpload {
        project_id: 1,
        doc_type_code: None,
        legacy_type: None,
        submitted_at: None,
        issued_at: None,
        is_archived: false,
        attachment: None,
        actor: None,
    };
    let err = replace_current(&store, &up).await.unwrap_err();
    assert!(matches!(err, WriterError::MissingTypeKey));
}

#[tokio::test]
async fn legacy_label_is_used_as_the_versioning_key() {
    let store = MockStore::new();
    let up = DocumentUpload {
        project_id: 1,
        doc_type_code: None,
        legacy_type: Some("同意備案".to_string()),
        submitted_at: None,
        issued_at: Some(Utc::now()),
        is_archived: false,
        attachment: None,
        actor: None,
    };
    let doc = replace_current(&store, &up).await.unwrap();
    assert_eq!(doc.type_key, "同意備案");
    assert_eq!(store.current_rows(1, "同意備案").len(), 1);
}
