/*!
 * Document structure: content units, outlines and segmentation.
 *
 * - `model`: segments, unit keys and failure placeholders
 * - `source`: readers producing content units
 * - `toc`: outline parsing and the chapter map
 * - `segmenter`: the segmentation state machine
 */

pub mod model;
pub mod segmenter;
pub mod source;
pub mod toc;

pub use model::{
    failure_marker, is_failure_marker, ContentSegment, ContentType, SegmentList, UnitKey, EMPTY_RESPONSE_MARKER,
    MISSING_TRANSLATION_MARKER,
};
pub use segmenter::{segment_units, Segmenter};
pub use source::{ContentUnit, JsonUnitSource, PlainTextSource, UnitSource};
pub use toc::{ChapterInfo, ChapterMap, OutlineEntry, TocUnifier};
