/*!
 * Previous-segment context for batch prompts.
 *
 * The context of a batch is the tail of the source text that precedes it.
 * It only reads `original_text`, which is fixed before any translation
 * starts, so contexts can be computed up front and stay identical whatever
 * order concurrent batches complete in.
 */

use crate::app_config::ProcessingConfig;
use crate::document::{ContentSegment, SegmentList};

/// Builds the context string handed to each batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextBuilder {
    /// Characters of previous text to keep
    window: usize,
}

impl ContextBuilder {
    /// Keep the last quarter of a chunk, bounded by `max_context_length`
    pub fn new(max_chunk_size: usize, max_context_length: usize) -> Self {
        Self {
            window: (max_chunk_size / 4).max(1).min(max_context_length),
        }
    }

    pub fn from_config(processing: &ProcessingConfig) -> Self {
        Self::new(processing.max_chunk_size, processing.max_context_length)
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Context for a batch whose first segment has id `first_id`.
    ///
    /// Uses the closest earlier segment that carries source text; image
    /// segments in between are skipped.
    pub fn context_for(&self, segments: &SegmentList, first_id: u64) -> String {
        let mut cursor = first_id;
        while let Some(previous) = segments.previous(cursor) {
            let text = previous.original_text.trim();
            if !text.is_empty() {
                return tail_chars(text, self.window);
            }
            cursor = previous.segment_id;
        }
        String::new()
    }

    /// Contexts for every batch, in batch order
    pub fn precompute(&self, segments: &SegmentList, batches: &[Vec<ContentSegment>]) -> Vec<String> {
        batches
            .iter()
            .map(|batch| match batch.first() {
                Some(first) => self.context_for(segments, first.segment_id),
                None => String::new(),
            })
            .collect()
    }
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self::from_config(&ProcessingConfig::default())
    }
}

/// Last `count` characters of `text`
fn tail_chars(text: &str, count: usize) -> String {
    let total = text.chars().count();
    if total <= count {
        return text.to_string();
    }
    text.chars().skip(total - count).collect()
}
