/*!
 * Prompt construction for the translation client.
 *
 * This module provides:
 * - The system prompt template with JSON output rules
 * - User prompts for text batches, images, titles, term extraction and JSON repair
 */

pub mod templates;

// Re-export main types
pub use templates::{
    batch_prompt, format_glossary, glossary_prompt, image_prompt, repair_prompt, title_prompt, PromptTemplate,
    BROKEN_OUTPUT_HEADER, IMAGE_TASK_HEADER, INPUT_DATA_HEADER, PAIRS_HEADER, TITLES_HEADER,
};
