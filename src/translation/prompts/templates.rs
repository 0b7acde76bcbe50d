/*!
 * Prompt templates for document translation.
 *
 * Every prompt asks for a single JSON value so that responses can go
 * through the same strict-parse and salvage pipeline.
 */

use serde::Serialize;

use crate::translation::glossary::Glossary;

/// Section header preceding the batch payload
pub const INPUT_DATA_HEADER: &str = "# Input Data";
/// Section header preceding the title list
pub const TITLES_HEADER: &str = "# Titles";
/// Section header preceding translated sample pairs
pub const PAIRS_HEADER: &str = "# Translated Pairs";
/// Section header preceding output that needs fixing
pub const BROKEN_OUTPUT_HEADER: &str = "# Broken Output";
/// Marker of image translation prompts
pub const IMAGE_TASK_HEADER: &str = "# Image";

/// Longest sample text sent for term extraction
pub const MAX_GLOSSARY_SAMPLE_CHARS: usize = 8000;

/// System prompt template.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    /// The template string with placeholders
    template: String,
}

impl PromptTemplate {
    /// Output rules appended to every system prompt
    pub const JSON_RULES: &'static str = r#"## Output Requirements
- Return ONLY valid JSON, without commentary
- Keep every id exactly as given; never merge or split items
- Escape double quotes inside strings
- Follow the glossary strictly for names and key terms"#;

    pub fn new(template: &str) -> Self {
        Self {
            template: template.to_string(),
        }
    }

    /// Render the template with the given languages
    pub fn render(&self, source_language: &str, target_language: &str) -> String {
        let body = self
            .template
            .replace("{source_language}", source_language)
            .replace("{target_language}", target_language);
        format!("{}\n\n{}", body, Self::JSON_RULES)
    }
}

#[derive(Serialize)]
struct InputItem<'a> {
    id: u64,
    text: &'a str,
}

/// Render the glossary block, or `None` when there is nothing to enforce
pub fn format_glossary(glossary: Option<&Glossary>) -> Option<String> {
    let glossary = glossary.filter(|g| !g.is_empty())?;
    let lines: Vec<String> = glossary
        .iter()
        .map(|(source, target)| format!("- **{}**: Must be translated as **{}**", source, target))
        .collect();
    Some(lines.join("\n"))
}

/// User prompt for a text batch
pub fn batch_prompt(items: &[(u64, &str)], style: &str, context: &str, glossary: Option<&Glossary>) -> String {
    let mut prompt = String::new();

    prompt.push_str("# Style\n");
    prompt.push_str(style);
    prompt.push_str("\n\n");

    prompt.push_str("# Context from Previous Segments\n");
    if context.trim().is_empty() {
        prompt.push_str("(Beginning of document - no previous context)\n\n");
    } else {
        prompt.push_str("<previous_context>\n");
        prompt.push_str(context);
        prompt.push_str("\n</previous_context>\n");
        prompt.push_str("Use the context for continuity only; do not translate it.\n\n");
    }

    if let Some(block) = format_glossary(glossary) {
        prompt.push_str("# Glossary Reference\n<glossary>\n");
        prompt.push_str(&block);
        prompt.push_str("\n</glossary>\n\n");
    }

    prompt.push_str("# Task\n");
    prompt.push_str(
        "Translate the `text` of every item. Answer with a JSON array of objects \
         `{\"id\": <same id>, \"translation\": \"...\"}`, one per input item, in input order.\n\n",
    );

    let input: Vec<InputItem> = items.iter().map(|(id, text)| InputItem { id: *id, text }).collect();
    prompt.push_str(INPUT_DATA_HEADER);
    prompt.push('\n');
    prompt.push_str(&serde_json::to_string_pretty(&input).unwrap_or_else(|_| "[]".to_string()));
    prompt
}

/// User prompt for a single image segment
pub fn image_prompt(style: &str, context: &str) -> String {
    let context = if context.trim().is_empty() { "(none)" } else { context };
    format!(
        "{}\nTranslate all readable text in the attached image. Keep the reading order.\n\n\
         # Style\n{}\n\n# Context from Previous Segments\n{}\n\n\
         Answer with a JSON object {{\"translation\": \"...\"}}; answer {{\"translation\": \"[No text]\"}} when the image has no text.",
        IMAGE_TASK_HEADER, style, context
    )
}

/// User prompt for chapter title pre-translation
pub fn title_prompt(titles: &[String], style: &str) -> String {
    format!(
        "Translate the following list of document headers and titles.\n\n# Style\n{}\n\n\
         Output a flat JSON object whose keys are the source titles exactly as given and whose \
         values are the translations, e.g. {{\"Chapter 1\": \"...\", \"Index\": \"...\"}}.\n\n{}\n{}",
        style,
        TITLES_HEADER,
        serde_json::to_string_pretty(titles).unwrap_or_else(|_| "[]".to_string())
    )
}

/// User prompt for extracting terms from translated samples
pub fn glossary_prompt(pairs: &[(String, String)]) -> String {
    let mut samples = String::new();
    for (original, translated) in pairs {
        let block = format!("Original: {}\nTranslated: {}\n---\n", original, translated);
        if samples.chars().count() + block.chars().count() > MAX_GLOSSARY_SAMPLE_CHARS {
            let room = MAX_GLOSSARY_SAMPLE_CHARS.saturating_sub(samples.chars().count());
            samples.extend(block.chars().take(room));
            break;
        }
        samples.push_str(&block);
    }

    format!(
        "Extract proper nouns, names and recurring technical terms from the translated pairs below, \
         together with the translation that was used.\n\
         Output a flat JSON object mapping each source term to its translation. \
         Output {{}} when there is nothing worth fixing.\n\n{}\n{}",
        PAIRS_HEADER, samples
    )
}

/// User prompt asking the model to fix its own malformed JSON
pub fn repair_prompt(raw: &str, expected_ids: &[u64]) -> String {
    format!(
        "The text below was meant to be a JSON array of {{\"id\", \"translation\"}} objects for ids {:?} \
         but it is not valid JSON. Return the corrected JSON array only, keeping every translation unchanged.\n\n{}\n{}",
        expected_ids, BROKEN_OUTPUT_HEADER, raw
    )
}
