/*!
 * Tests for segmentation of unit streams into chapter-aware segments
 */

use yadtwai::document::toc::{parse_outline_csv, parse_outline_json, synthetic_page_outline};
use yadtwai::document::{segment_units, ContentType, ContentUnit, JsonUnitSource, PlainTextSource, TocUnifier, UnitSource};

use crate::common;

#[test]
fn test_plainTextSource_withSyntheticOutline_shouldSplitAtEveryPage() {
    let dir = common::create_temp_dir().unwrap();
    let content = "First paragraph.\n\nSecond paragraph.\u{c}Third paragraph on page two.\n";
    let path = common::create_test_file(dir.path(), "doc.txt", content).unwrap();

    let units = PlainTextSource::new(&path).read_units().unwrap();
    assert_eq!(units.len(), 3);

    let chapters = TocUnifier::new(false).unify(&synthetic_page_outline(PlainTextSource::page_count(content)));
    let segments = segment_units(units, &chapters, 2000).unwrap();

    assert_eq!(segments.len(), 2);
    let first = segments.get(0).unwrap();
    assert_eq!(first.chapter_title, "Page 1");
    assert!(first.is_new_chapter);
    assert_eq!(first.original_text, "First paragraph.\n\nSecond paragraph.");
    let second = segments.get(1).unwrap();
    assert_eq!(second.chapter_title, "Page 2");
    assert_eq!(second.page_index, 1);
}

#[test]
fn test_jsonUnits_withCsvOutline_shouldAssignChaptersAndKeepImagesApart() {
    let units_json = r#"[
        {"key": 0, "content": "Cover text"},
        {"key": 1, "content": "Opening of chapter one"},
        {"key": 1, "content": "figures/map.png", "type": "image"},
        {"key": 2, "content": "More of chapter one"},
        {"key": 3, "content": "Chapter two starts"}
    ]"#;
    let outline = "page,title,level\n2,Chapter One,1\n4,Chapter Two,1\n";

    let units = JsonUnitSource::parse(units_json).unwrap();
    let chapters = TocUnifier::new(true).unify(&parse_outline_csv(outline).unwrap());
    let segments = segment_units(units, &chapters, 2000).unwrap();

    let summary: Vec<(u64, ContentType, &str, bool)> = segments
        .iter()
        .map(|s| (s.segment_id, s.content_type, s.chapter_title.as_str(), s.is_new_chapter))
        .collect();
    assert_eq!(
        summary,
        vec![
            (0, ContentType::Text, "Untitled", false),
            (1, ContentType::Text, "Chapter One", true),
            (2, ContentType::Image, "Chapter One", false),
            (3, ContentType::Text, "Chapter One", false),
            (4, ContentType::Text, "Chapter Two", true),
        ]
    );
    assert_eq!(segments.get(2).unwrap().image_path.as_deref(), Some("figures/map.png"));
}

#[test]
fn test_nestedOutline_withBreadcrumb_shouldPrefixPartTitle() {
    let outline = r#"[
        {"title": "Part I", "key": 0, "children": [
            {"title": "Chapter 1", "key": 1},
            {"title": "Chapter 2", "key": 2}
        ]}
    ]"#;
    let entries = parse_outline_json(outline).unwrap();
    let chapters = TocUnifier::new(true).unify(&entries);
    let units = vec![
        ContentUnit::text(0, "Part intro"),
        ContentUnit::text(1, "One"),
        ContentUnit::text(2, "Two"),
    ];

    let segments = segment_units(units, &chapters, 2000).unwrap();
    let titles: Vec<&str> = segments.iter().map(|s| s.chapter_title.as_str()).collect();

    assert_eq!(titles, vec!["Part I", "Part I > Chapter 1", "Part I > Chapter 2"]);
    assert!(segments.iter().all(|s| s.toc_level == 1));
}

#[test]
fn test_segmentUnits_withSmallChunkSize_shouldFlushOnThreshold() {
    let chapters = TocUnifier::new(false).unify(&[]);
    let units: Vec<ContentUnit> = (0..6).map(|i| ContentUnit::text(0, format!("{:010}", i))).collect();

    let segments = segment_units(units, &chapters, 25).unwrap();

    // 10 + 10 stays below 25, the third unit crosses it
    assert_eq!(segments.len(), 2);
    assert!(segments.iter().all(|s| s.original_text.split("\n\n").count() == 3));
    let ids: Vec<u64> = segments.iter().map(|s| s.segment_id).collect();
    assert_eq!(ids, vec![0, 1]);
}
