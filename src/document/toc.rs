/*!
 * Table-of-contents unification.
 *
 * Format extractors deliver outlines in different shapes (nested EPUB
 * navigation, flat PDF bookmarks, hand-written CSV files). They are all
 * flattened into [`OutlineEntry`] records in document order and folded into a
 * single [`ChapterMap`] keyed by unit key.
 */

use serde::Deserialize;
use std::collections::HashMap;
use std::collections::hash_map::Entry;

use crate::document::model::UnitKey;
use crate::errors::DocumentError;

/// One outline record in document order
#[derive(Debug, Clone, PartialEq)]
pub struct OutlineEntry {
    /// Unit the entry points at
    pub key: UnitKey,
    /// Title as written in the outline
    pub title: String,
    /// Depth, 1 = top level
    pub level: u32,
}

impl OutlineEntry {
    pub fn new(key: impl Into<UnitKey>, title: impl Into<String>, level: u32) -> Self {
        Self {
            key: key.into(),
            title: title.into(),
            level,
        }
    }
}

/// Resolved chapter information for a unit key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterInfo {
    pub title: String,
    pub level: u32,
}

/// Lookup from unit key to chapter; the first record for a key wins
#[derive(Debug, Clone, Default)]
pub struct ChapterMap {
    entries: HashMap<UnitKey, ChapterInfo>,
}

impl ChapterMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert unless the key is already mapped; returns whether it was inserted
    pub fn insert_first(&mut self, key: UnitKey, info: ChapterInfo) -> bool {
        match self.entries.entry(key) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(info);
                true
            }
        }
    }

    pub fn get(&self, key: &UnitKey) -> Option<&ChapterInfo> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Folds outline entries into a [`ChapterMap`]
#[derive(Debug, Clone)]
pub struct TocUnifier {
    use_breadcrumb: bool,
    separator: String,
}

impl TocUnifier {
    pub fn new(use_breadcrumb: bool) -> Self {
        Self {
            use_breadcrumb,
            separator: " > ".to_string(),
        }
    }

    /// Build the chapter map from entries given in document order.
    ///
    /// An ancestor stack is kept: every entry truncates it to `level - 1`
    /// titles and pushes its own. In breadcrumb mode the whole stack becomes
    /// the title and the level is flattened to 1.
    pub fn unify(&self, entries: &[OutlineEntry]) -> ChapterMap {
        let mut map = ChapterMap::new();
        let mut stack: Vec<String> = Vec::new();

        for entry in entries {
            let level = entry.level.max(1);
            let keep = (level - 1) as usize;
            if stack.len() > keep {
                stack.truncate(keep);
            }
            stack.push(entry.title.trim().to_string());

            let info = if self.use_breadcrumb {
                ChapterInfo {
                    title: stack.join(&self.separator),
                    level: 1,
                }
            } else {
                ChapterInfo {
                    title: entry.title.trim().to_string(),
                    level,
                }
            };

            if !map.insert_first(entry.key.clone(), info) {
                log::debug!("Outline entry '{}' ignored, {} already mapped", entry.title, entry.key);
            }
        }

        map
    }
}

/// One entry per page for documents without a native outline.
///
/// Use together with breadcrumbs disabled.
pub fn synthetic_page_outline(page_count: usize) -> Vec<OutlineEntry> {
    (0..page_count)
        .map(|page| OutlineEntry::new(page, format!("Page {}", page + 1), 1))
        .collect()
}

/// Nested outline node as found in outline JSON files
#[derive(Debug, Clone, Deserialize)]
pub struct OutlineNode {
    pub title: String,
    #[serde(default)]
    pub key: Option<UnitKey>,
    #[serde(default)]
    pub level: Option<u32>,
    #[serde(default)]
    pub children: Vec<OutlineNode>,
}

/// Flatten a nested outline depth-first.
///
/// Levels default to the nesting depth, href keys lose their `#fragment`,
/// nodes without a key only contribute their children.
pub fn flatten_outline(nodes: &[OutlineNode]) -> Vec<OutlineEntry> {
    fn walk(nodes: &[OutlineNode], depth: u32, out: &mut Vec<OutlineEntry>) {
        for node in nodes {
            if let Some(key) = &node.key {
                let key = match key {
                    UnitKey::Name(href) => {
                        let base = href.split('#').next().unwrap_or(href);
                        UnitKey::Name(base.to_string())
                    }
                    page => page.clone(),
                };
                out.push(OutlineEntry {
                    key,
                    title: node.title.clone(),
                    level: node.level.unwrap_or(depth),
                });
            }
            walk(&node.children, depth + 1, out);
        }
    }

    let mut out = Vec::new();
    walk(nodes, 1, &mut out);
    out
}

/// Parse an outline JSON document (a flat or nested array of nodes)
pub fn parse_outline_json(content: &str) -> Result<Vec<OutlineEntry>, DocumentError> {
    let nodes: Vec<OutlineNode> = serde_json::from_str(content).map_err(|e| DocumentError::MalformedInput {
        location: format!("line {}", e.line()),
        message: e.to_string(),
    })?;
    Ok(flatten_outline(&nodes))
}

/// Column positions of a CSV outline
#[derive(Debug, Clone, Copy)]
struct CsvColumns {
    page: usize,
    title: Option<usize>,
    level: Option<usize>,
}

impl CsvColumns {
    /// Locate the columns by header name, ignoring case
    fn from_header(record: &csv::StringRecord) -> Option<Self> {
        let find = |names: &[&str]| {
            record
                .iter()
                .position(|field| names.contains(&field.to_lowercase().as_str()))
        };
        Some(Self {
            page: find(&["page", "页码"])?,
            title: find(&["title", "标题"]),
            level: find(&["level", "层级"]),
        })
    }

    /// Headerless files are read as `page,title,level`
    fn positional() -> Self {
        Self {
            page: 0,
            title: Some(1),
            level: Some(2),
        }
    }
}

fn csv_error(line: u64, message: String) -> DocumentError {
    DocumentError::MalformedInput {
        location: format!("line {}", line),
        message,
    }
}

/// Parse a CSV outline with `page`, `title` and `level` columns.
///
/// Columns are found by header name in any order; a file without a header row
/// is read positionally. Pages are 1-based in the file and become 0-based
/// keys. A blank title turns into "Page N", a blank or missing level into 1.
/// Rows without a page, or with page 0, are skipped.
pub fn parse_outline_csv(content: &str) -> Result<Vec<OutlineEntry>, DocumentError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.trim_start_matches('\u{feff}').as_bytes());

    let mut columns: Option<CsvColumns> = None;
    let mut entries = Vec::new();

    for record in reader.records() {
        let record = record.map_err(|e| {
            let line = e.position().map_or(0, |p| p.line());
            csv_error(line, e.to_string())
        })?;
        let line = record.position().map_or(0, |p| p.line());

        let cols = match columns {
            Some(cols) => cols,
            None => {
                if let Some(header) = CsvColumns::from_header(&record) {
                    columns = Some(header);
                    continue;
                }
                *columns.insert(CsvColumns::positional())
            }
        };
        let field = |index: Option<usize>| index.and_then(|i| record.get(i)).unwrap_or("");

        let page_field = field(Some(cols.page));
        if page_field.is_empty() {
            continue;
        }
        let page: usize = page_field
            .parse()
            .map_err(|_| csv_error(line, format!("invalid page number '{}'", page_field)))?;
        if page == 0 {
            log::debug!("Outline row at line {} points at page 0, skipped", line);
            continue;
        }

        let level = match field(cols.level) {
            "" => 1,
            level => level
                .parse::<u32>()
                .map_err(|_| csv_error(line, format!("invalid level '{}'", level)))?,
        };
        let title = match field(cols.title) {
            "" => format!("Page {}", page),
            title => title.to_string(),
        };

        entries.push(OutlineEntry::new(page - 1, title, level.max(1)));
    }

    Ok(entries)
}
