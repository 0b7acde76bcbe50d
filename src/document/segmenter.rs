/*!
 * Segmentation state machine.
 *
 * Consumes content units in document order together with a [`ChapterMap`]
 * and emits [`ContentSegment`]s with monotonic ids. Text units are buffered
 * until the chunk size is reached or the chapter changes; every image unit
 * becomes a segment of its own.
 */

use log::{debug, info};

use crate::document::model::{ContentSegment, ContentType, SegmentList};
use crate::document::source::ContentUnit;
use crate::document::toc::ChapterMap;
use crate::errors::DocumentError;

/// Chapter title used until the outline names one
pub const DEFAULT_CHAPTER_TITLE: &str = "Untitled";

/// Segmentation state machine
#[derive(Debug)]
pub struct Segmenter<'a> {
    chapters: &'a ChapterMap,
    max_chunk_size: usize,

    chapter_title: String,
    chapter_level: u32,
    pending_chapter: bool,

    buffer: Vec<String>,
    buffer_len: usize,
    page_index: usize,

    next_id: u64,
    output: Vec<ContentSegment>,
}

impl<'a> Segmenter<'a> {
    pub fn new(chapters: &'a ChapterMap, max_chunk_size: usize) -> Self {
        Self {
            chapters,
            max_chunk_size,
            chapter_title: DEFAULT_CHAPTER_TITLE.to_string(),
            chapter_level: 1,
            pending_chapter: false,
            buffer: Vec::new(),
            buffer_len: 0,
            page_index: 0,
            next_id: 0,
            output: Vec::new(),
        }
    }

    /// Feed one unit
    pub fn push(&mut self, unit: ContentUnit) {
        match unit.content_type {
            ContentType::Image => self.push_image(unit),
            ContentType::Text => self.push_text(unit),
        }
    }

    fn push_image(&mut self, unit: ContentUnit) {
        self.flush();

        let segment = ContentSegment::image(self.next_id, unit.content)
            .with_chapter(self.chapter_title.clone(), self.chapter_level, false)
            .with_page(unit.key.page().unwrap_or(0));
        self.output.push(segment);
        self.next_id += 1;
    }

    fn push_text(&mut self, unit: ContentUnit) {
        if unit.content.trim().is_empty() {
            return;
        }

        if let Some(chapter) = self.chapters.get(&unit.key) {
            if chapter.title != self.chapter_title {
                self.flush();
                debug!("New chapter at {}: {}", unit.key, chapter.title);
                self.chapter_title = chapter.title.clone();
                self.chapter_level = chapter.level;
                self.pending_chapter = true;
            }
        }

        if let Some(page) = unit.key.page() {
            self.page_index = page;
        }

        self.buffer_len += unit.content.chars().count();
        self.buffer.push(unit.content);

        if self.buffer_len >= self.max_chunk_size {
            self.flush();
        }
    }

    /// Emit the buffered text as one segment
    fn flush(&mut self) {
        if self.buffer.is_empty() {
            return;
        }

        let text = self.buffer.join("\n\n");
        let segment = ContentSegment::text(self.next_id, text)
            .with_chapter(self.chapter_title.clone(), self.chapter_level, self.pending_chapter)
            .with_page(self.page_index);
        self.output.push(segment);

        self.next_id += 1;
        self.buffer.clear();
        self.buffer_len = 0;
        self.pending_chapter = false;
    }

    /// Flush whatever is left and return the segments
    pub fn finish(mut self) -> Vec<ContentSegment> {
        self.flush();
        self.output
    }
}

/// Run the state machine over a whole unit stream
pub fn segment_units<I>(units: I, chapters: &ChapterMap, max_chunk_size: usize) -> Result<SegmentList, DocumentError>
where
    I: IntoIterator<Item = ContentUnit>,
{
    let mut segmenter = Segmenter::new(chapters, max_chunk_size);
    for unit in units {
        segmenter.push(unit);
    }
    let segments = segmenter.finish();
    info!("Segmentation produced {} segments", segments.len());
    SegmentList::new(segments)
}
