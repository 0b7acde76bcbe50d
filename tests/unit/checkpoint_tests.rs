/*!
 * Tests for checkpoint and structure persistence
 */

use yadtwai::document::{ContentSegment, SegmentList, MISSING_TRANSLATION_MARKER};
use yadtwai::session::{CheckpointStore, ResumeOutcome, SegmentStatus, StructureStore};

use crate::common;

#[test]
fn test_checkpointFile_shouldUseDocumentedFieldNames() {
    let dir = common::create_temp_dir().unwrap();
    let (mut store, _) = CheckpointStore::open(dir.path(), "abc");
    store.register_total(3);
    store.mark_completed(0);
    store.mark_failed(2, "timeout");
    store.persist().unwrap();

    let raw = std::fs::read_to_string(store.path()).unwrap();
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();

    assert_eq!(value["document_hash"], "abc");
    assert_eq!(value["completed_segments"], serde_json::json!([0]));
    assert_eq!(value["failed_segments"][0]["segment_id"], 2);
    assert_eq!(value["failed_segments"][0]["error"], "timeout");
    assert_eq!(value["total_segments"], 3);
    assert!(value["start_time"].is_string());
    assert!(value["last_update"].is_string());
}

#[test]
fn test_reopen_afterPartialRun_shouldOnlyReturnUnfinishedSegments() {
    let dir = common::create_temp_dir().unwrap();
    let mut segments = common::text_segments(4);
    {
        let (mut store, outcome) = CheckpointStore::open(dir.path(), "doc");
        assert_eq!(outcome, ResumeOutcome::Fresh);
        store.register_total(segments.len());
        segments.set_translation(0, "zero");
        segments.set_translation(1, "one");
        store.mark_completed(0);
        store.mark_completed(1);
        store.mark_failed(2, "rate limited");
        store.persist().unwrap();
        StructureStore::new(dir.path(), "doc").save(&segments).unwrap();
    }

    let (mut store, outcome) = CheckpointStore::open(dir.path(), "doc");
    let reloaded = StructureStore::new(dir.path(), "doc").load().unwrap();

    assert_eq!(outcome, ResumeOutcome::Resumed { completed: 2, failed: 1 });
    let pending: Vec<u64> = store.get_pending(&reloaded).iter().map(|s| s.segment_id).collect();
    assert_eq!(pending, vec![2, 3]);
    assert_eq!(store.status(2), SegmentStatus::Failed("rate limited".to_string()));

    let stats = store.progress_stats();
    assert_eq!((stats.total, stats.completed, stats.failed, stats.pending), (4, 2, 1, 2));
    assert_eq!(stats.completion_percentage(), 50.0);
}

#[test]
fn test_getPending_withStaleCompletion_shouldRetranslatePlaceholder() {
    let dir = common::create_temp_dir().unwrap();
    let mut segments = SegmentList::new(vec![
        ContentSegment::text(0, "ok"),
        ContentSegment::text(1, "lost"),
        ContentSegment::text(2, "never sent"),
    ])
    .unwrap();
    segments.set_translation(0, "d'accord");
    segments.set_translation(1, MISSING_TRANSLATION_MARKER);

    let (mut store, _) = CheckpointStore::open(dir.path(), "doc");
    store.mark_completed(0);
    store.mark_completed(1);

    let pending: Vec<u64> = store.get_pending(&segments).iter().map(|s| s.segment_id).collect();

    assert_eq!(pending, vec![1, 2]);
    assert_eq!(store.status(1), SegmentStatus::Pending);
    assert_eq!(store.status(0), SegmentStatus::Completed);
}

#[test]
fn test_structureSnapshot_withChangedDocument_shouldBeIgnored() {
    let dir = common::create_temp_dir().unwrap();
    StructureStore::new(dir.path(), "old").save(&common::text_segments(2)).unwrap();

    assert!(StructureStore::new(dir.path(), "new").load().is_none());
    assert_eq!(StructureStore::new(dir.path(), "old").load().unwrap().len(), 2);
}
