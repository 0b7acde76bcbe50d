/*!
 * Content unit sources.
 *
 * Format-specific extraction (PDF pages, EPUB spine items, ...) happens
 * outside this crate. Extractors hand over their output as a JSON unit file;
 * plain text files can be read directly.
 */

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::document::model::{ContentType, UnitKey};
use crate::errors::DocumentError;

/// Smallest atomic piece of a document: a paragraph, block, page or image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentUnit {
    /// Position key used for chapter lookup
    pub key: UnitKey,
    /// Text, or the image path for image units
    pub content: String,
    /// Kind of payload
    #[serde(rename = "type", default)]
    pub content_type: ContentType,
}

impl ContentUnit {
    pub fn text(key: impl Into<UnitKey>, content: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            content: content.into(),
            content_type: ContentType::Text,
        }
    }

    pub fn image(key: impl Into<UnitKey>, path: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            content: path.into(),
            content_type: ContentType::Image,
        }
    }
}

/// Yields content units in document order
pub trait UnitSource {
    /// All units of the document, in order
    fn read_units(&self) -> Result<Vec<ContentUnit>, DocumentError>;

    /// Short description for logs
    fn describe(&self) -> String;
}

fn read_file(path: &Path) -> Result<String, DocumentError> {
    std::fs::read_to_string(path).map_err(|e| DocumentError::MalformedInput {
        location: path.display().to_string(),
        message: e.to_string(),
    })
}

/// Reads a JSON array of `{"key", "content", "type"}` objects
#[derive(Debug, Clone)]
pub struct JsonUnitSource {
    path: PathBuf,
}

impl JsonUnitSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Parse units from an in-memory JSON string
    pub fn parse(content: &str) -> Result<Vec<ContentUnit>, DocumentError> {
        serde_json::from_str(content).map_err(|e| DocumentError::MalformedInput {
            location: format!("line {}, column {}", e.line(), e.column()),
            message: e.to_string(),
        })
    }
}

impl UnitSource for JsonUnitSource {
    fn read_units(&self) -> Result<Vec<ContentUnit>, DocumentError> {
        let content = read_file(&self.path)?;
        Self::parse(&content).map_err(|e| match e {
            DocumentError::MalformedInput { location, message } => DocumentError::MalformedInput {
                location: format!("{} ({})", self.path.display(), location),
                message,
            },
            other => other,
        })
    }

    fn describe(&self) -> String {
        format!("unit file {}", self.path.display())
    }
}

/// Reads a plain text file.
///
/// Form feeds separate pages; blank lines separate paragraphs. Each paragraph
/// becomes one text unit keyed by its page index.
#[derive(Debug, Clone)]
pub struct PlainTextSource {
    path: PathBuf,
}

impl PlainTextSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn split(content: &str) -> Vec<ContentUnit> {
        let mut units = Vec::new();
        for (page, page_text) in content.split('\u{c}').enumerate() {
            let mut paragraph: Vec<&str> = Vec::new();
            for line in page_text.lines() {
                if line.trim().is_empty() {
                    if !paragraph.is_empty() {
                        units.push(ContentUnit::text(page, paragraph.join("\n")));
                        paragraph.clear();
                    }
                } else {
                    paragraph.push(line.trim_end());
                }
            }
            if !paragraph.is_empty() {
                units.push(ContentUnit::text(page, paragraph.join("\n")));
            }
        }
        units
    }

    /// Number of form-feed separated pages
    pub fn page_count(content: &str) -> usize {
        content.split('\u{c}').count()
    }
}

impl UnitSource for PlainTextSource {
    fn read_units(&self) -> Result<Vec<ContentUnit>, DocumentError> {
        Ok(Self::split(&read_file(&self.path)?))
    }

    fn describe(&self) -> String {
        format!("text file {}", self.path.display())
    }
}
