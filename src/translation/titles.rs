/*!
 * Chapter title pre-translation.
 */

use log::{info, warn};

use crate::document::SegmentList;
use crate::language_utils;
use crate::translation::core::TranslationClient;

/// Unique chapter titles that still need translating, in document order
pub fn titles_to_translate(segments: &SegmentList, target_language: &str) -> Vec<String> {
    let mut titles: Vec<String> = Vec::new();
    for segment in segments.iter().filter(|s| s.is_new_chapter) {
        let title = segment.chapter_title.trim();
        if title.is_empty() || language_utils::looks_like_target_script(title, target_language) {
            continue;
        }
        if !titles.iter().any(|t| t == &segment.chapter_title) {
            titles.push(segment.chapter_title.clone());
        }
    }
    titles
}

/// Translate chapter titles in one request and rename chapter-opening segments.
///
/// Returns the number of segments renamed. A failed request keeps the
/// source titles.
pub async fn pretranslate_titles(client: &TranslationClient, segments: &mut SegmentList, target_language: &str) -> usize {
    let titles = titles_to_translate(segments, target_language);
    if titles.is_empty() {
        return 0;
    }

    info!("Translating {} chapter titles", titles.len());
    match client.translate_titles(&titles).await {
        Ok(translated) => {
            let renamed = segments.rename_chapters(&translated);
            info!("Renamed {} chapter openings", renamed);
            renamed
        }
        Err(e) => {
            warn!("Title translation failed, keeping source titles: {}", e);
            0
        }
    }
}
