/*!
 * Core document model types.
 *
 * A document is turned into an ordered list of [`ContentSegment`]s. Segment ids
 * are assigned once, in document order, and are the only key used to correlate
 * a segment across runs, checkpoints and concurrent batches.
 */

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::DocumentError;

/// Placeholder written when a batch response carried no translation for an id
pub const MISSING_TRANSLATION_MARKER: &str = "[Failed: Missing translation]";

/// Placeholder written when a backend returned an empty body
pub const EMPTY_RESPONSE_MARKER: &str = "[Failed: Empty response]";

/// Build the bracketed failure placeholder for a segment
pub fn failure_marker(reason: &str) -> String {
    let mut reason: String = reason
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .take(200)
        .collect();
    reason = reason.replace(']', ")");
    format!("[Failed: {}]", reason.trim())
}

/// Whether a translated text is one of the failure placeholders
pub fn is_failure_marker(text: &str) -> bool {
    let text = text.trim();
    text.starts_with("[Failed") || text.ends_with("Failed]") || text.contains("[Translation Failed")
}

/// Key of a content unit as produced by a format extractor.
///
/// Paged formats use the zero-based page index; flowing formats use an opaque
/// string such as a spine href.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UnitKey {
    /// Zero-based page index
    Page(usize),
    /// Opaque position key
    Name(String),
}

impl UnitKey {
    /// Page index carried by the key, if any
    pub fn page(&self) -> Option<usize> {
        match self {
            Self::Page(index) => Some(*index),
            Self::Name(_) => None,
        }
    }
}

impl fmt::Display for UnitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Page(index) => write!(f, "page {}", index),
            Self::Name(name) => write!(f, "{}", name),
        }
    }
}

impl From<usize> for UnitKey {
    fn from(index: usize) -> Self {
        Self::Page(index)
    }
}

impl From<&str> for UnitKey {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

/// Kind of payload a segment carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    #[default]
    Text,
    Image,
}

/// A persisted, translatable chunk of the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentSegment {
    /// Monotonic id, assigned once
    pub segment_id: u64,

    /// Source text (empty for images)
    #[serde(default)]
    pub original_text: String,

    /// Translation, empty until translated
    #[serde(default)]
    pub translated_text: String,

    /// First segment of a new chapter
    #[serde(default)]
    pub is_new_chapter: bool,

    /// Chapter title in effect for this segment
    #[serde(default)]
    pub chapter_title: String,

    /// Page the segment's last unit came from
    #[serde(default)]
    pub page_index: usize,

    /// Outline depth of the chapter
    #[serde(default = "default_toc_level")]
    pub toc_level: u32,

    /// Text or image payload
    #[serde(default)]
    pub content_type: ContentType,

    /// Path of the image file, present iff `content_type` is image
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_path: Option<String>,
}

fn default_toc_level() -> u32 {
    1
}

impl ContentSegment {
    /// New text segment with default structural metadata
    pub fn text(segment_id: u64, original_text: impl Into<String>) -> Self {
        Self {
            segment_id,
            original_text: original_text.into(),
            translated_text: String::new(),
            is_new_chapter: false,
            chapter_title: String::new(),
            page_index: 0,
            toc_level: 1,
            content_type: ContentType::Text,
            image_path: None,
        }
    }

    /// New image segment pointing at an extracted image file
    pub fn image(segment_id: u64, image_path: impl Into<String>) -> Self {
        Self {
            content_type: ContentType::Image,
            image_path: Some(image_path.into()),
            ..Self::text(segment_id, String::new())
        }
    }

    /// Set the chapter metadata
    pub fn with_chapter(mut self, title: impl Into<String>, level: u32, is_new_chapter: bool) -> Self {
        self.chapter_title = title.into();
        self.toc_level = level;
        self.is_new_chapter = is_new_chapter;
        self
    }

    /// Set the page index
    pub fn with_page(mut self, page_index: usize) -> Self {
        self.page_index = page_index;
        self
    }

    /// True when a real translation (not a placeholder) is present
    pub fn is_translated(&self) -> bool {
        !self.translated_text.trim().is_empty() && !is_failure_marker(&self.translated_text)
    }

    pub fn is_image(&self) -> bool {
        self.content_type == ContentType::Image
    }

    /// Check the image/text invariant
    pub fn validate(&self) -> Result<(), DocumentError> {
        let reason = match (self.content_type, &self.image_path) {
            (ContentType::Image, None) => "image segment without image_path",
            (ContentType::Image, Some(path)) if path.trim().is_empty() => "image segment with empty image_path",
            (ContentType::Text, Some(_)) => "text segment must not carry an image_path",
            _ => return Ok(()),
        };
        Err(DocumentError::InvalidSegment {
            segment_id: self.segment_id,
            reason: reason.to_string(),
        })
    }
}

/// Ordered list of segments in document order.
///
/// Ids increase strictly along the list, so lookups by id are binary searches
/// and never depend on a position remembered from an earlier run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SegmentList {
    segments: Vec<ContentSegment>,
}

impl SegmentList {
    /// Wrap segments that are already in document order
    pub fn new(segments: Vec<ContentSegment>) -> Result<Self, DocumentError> {
        let list = Self { segments };
        list.validate()?;
        Ok(list)
    }

    /// Check every segment plus the strictly increasing id order
    pub fn validate(&self) -> Result<(), DocumentError> {
        let mut previous: Option<u64> = None;
        for segment in &self.segments {
            segment.validate()?;
            if previous.is_some_and(|p| p >= segment.segment_id) {
                return Err(DocumentError::InvalidSegment {
                    segment_id: segment.segment_id,
                    reason: "segment ids are not strictly increasing".to_string(),
                });
            }
            previous = Some(segment.segment_id);
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ContentSegment> {
        self.segments.iter()
    }

    pub fn as_slice(&self) -> &[ContentSegment] {
        &self.segments
    }

    fn position(&self, segment_id: u64) -> Option<usize> {
        self.segments.binary_search_by_key(&segment_id, |s| s.segment_id).ok()
    }

    /// Segment with the given id
    pub fn get(&self, segment_id: u64) -> Option<&ContentSegment> {
        self.position(segment_id).map(|i| &self.segments[i])
    }

    /// The segment directly before the given id in document order
    pub fn previous(&self, segment_id: u64) -> Option<&ContentSegment> {
        match self.position(segment_id) {
            Some(i) if i > 0 => Some(&self.segments[i - 1]),
            _ => None,
        }
    }

    /// Store a translation; returns false when the id is unknown
    pub fn set_translation(&mut self, segment_id: u64, translated_text: impl Into<String>) -> bool {
        match self.position(segment_id) {
            Some(i) => {
                self.segments[i].translated_text = translated_text.into();
                true
            }
            None => false,
        }
    }

    /// Replace the chapter title of chapter-opening segments
    pub fn rename_chapters(&mut self, translated: &std::collections::HashMap<String, String>) -> usize {
        let mut renamed = 0;
        for segment in self.segments.iter_mut().filter(|s| s.is_new_chapter) {
            if let Some(title) = translated.get(&segment.chapter_title) {
                segment.chapter_title = title.clone();
                renamed += 1;
            }
        }
        renamed
    }

    /// Number of segments holding a real translation
    pub fn translated_count(&self) -> usize {
        self.segments.iter().filter(|s| s.is_translated()).count()
    }

    pub fn into_inner(self) -> Vec<ContentSegment> {
        self.segments
    }
}

impl<'a> IntoIterator for &'a SegmentList {
    type Item = &'a ContentSegment;
    type IntoIter = std::slice::Iter<'a, ContentSegment>;

    fn into_iter(self) -> Self::IntoIter {
        self.segments.iter()
    }
}
