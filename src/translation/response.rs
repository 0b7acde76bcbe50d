/*!
 * Parsing of backend replies.
 *
 * Replies are never trusted to be well-formed. A batch reply goes through:
 * 1. fence stripping,
 * 2. a strict JSON parse (bare array or `{"translations": [...]}`),
 * 3. regex salvage of `(id, translation)` pairs when the strict parse came up short,
 * 4. alignment onto the batch ids, with placeholders for ids nobody recovered.
 */

use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::document::MISSING_TRANSLATION_MARKER;
use crate::errors::TranslationError;

static FENCE_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)^```[A-Za-z]*\s*(.*?)\s*```$").unwrap());

/// Salvage patterns, tried in order; each captures `(id, translation)`
static SALVAGE_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    vec![
        (
            "strict",
            Regex::new(r#""id"\s*:\s*"?(\d+)"?\s*,\s*"translation"\s*:\s*"((?:[^"\\]|\\.)*)""#).unwrap(),
        ),
        (
            "single-quoted",
            Regex::new(r"'id'\s*:\s*(\d+)\s*,\s*'translation'\s*:\s*'((?:[^'\\]|\\.)*)'").unwrap(),
        ),
        (
            "loose",
            Regex::new(r#"(?s)"id"\s*:\s*(\d+).*?"translation"\s*:\s*"(.*?)""#).unwrap(),
        ),
        (
            "permissive",
            Regex::new(r#"(?is)id["'\s:]+(\d+).*?translation["'\s:]+["']([^"']*?)["']"#).unwrap(),
        ),
    ]
});

/// Longest raw payload echoed into logs
const LOG_PREVIEW_CHARS: usize = 300;

/// Which stage of the pipeline produced the kept items
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// The reply was valid JSON
    Strict,
    /// Pairs were pulled out of the text with a pattern
    Salvaged,
    /// Nothing usable was found
    Nothing,
}

/// Translations recovered from one reply, keyed by segment id
#[derive(Debug, Clone)]
pub struct RecoveredItems {
    /// Translations of ids that belong to the batch
    pub by_id: HashMap<u64, String>,
    /// Stage that produced `by_id`
    pub recovery: Recovery,
}

/// A batch reply mapped onto the input order
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedBatch {
    /// One entry per input id, placeholders included
    pub translations: Vec<String>,
    /// Ids that received the missing placeholder
    pub missing: Vec<u64>,
}

/// Shorten a payload for log output
pub fn preview(raw: &str) -> String {
    let mut text: String = raw.chars().take(LOG_PREVIEW_CHARS).collect();
    if raw.chars().count() > LOG_PREVIEW_CHARS {
        text.push_str("...");
    }
    text
}

/// Remove a surrounding markdown code fence, if any
pub fn strip_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    match FENCE_REGEX.captures(trimmed).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str(),
        None => trimmed,
    }
}

/// Decode JSON string escapes in a salvaged fragment
pub fn unescape(fragment: &str) -> String {
    match serde_json::from_str::<String>(&format!("\"{}\"", fragment)) {
        Ok(decoded) => decoded,
        Err(_) => fragment
            .replace("\\n", "\n")
            .replace("\\t", "\t")
            .replace("\\\"", "\"")
            .replace("\\'", "'")
            .replace("\\\\", "\\"),
    }
}

fn id_of(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn translation_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn items_from_value(value: &Value) -> Option<Vec<(u64, String)>> {
    let array = match value {
        Value::Array(items) => items,
        Value::Object(map) => match map.get("translations") {
            Some(Value::Array(items)) => items,
            _ => return None,
        },
        _ => return None,
    };

    Some(
        array
            .iter()
            .filter_map(|item| {
                let id = id_of(item.get("id")?)?;
                let translation = translation_of(item.get("translation")?)?;
                Some((id, translation))
            })
            .collect(),
    )
}

/// Strict structured parse of a batch reply
///
/// Accepts the whole text as JSON, or the outermost `[...]` / `{...}` span when
/// the model wrapped the payload in prose.
pub fn parse_strict(text: &str) -> Option<Vec<(u64, String)>> {
    if let Ok(value) = serde_json::from_str::<Value>(text) {
        return items_from_value(&value);
    }

    for (open, close) in [('[', ']'), ('{', '}')] {
        if let (Some(start), Some(end)) = (text.find(open), text.rfind(close)) {
            if start < end {
                if let Ok(value) = serde_json::from_str::<Value>(&text[start..=end]) {
                    if let Some(items) = items_from_value(&value) {
                        return Some(items);
                    }
                }
            }
        }
    }
    None
}

/// Pull `(id, translation)` pairs out of raw text with the first pattern that matches
pub fn salvage(text: &str) -> Vec<(u64, String)> {
    for (name, pattern) in SALVAGE_PATTERNS.iter() {
        let pairs: Vec<(u64, String)> = pattern
            .captures_iter(text)
            .filter_map(|caps| {
                let id = caps.get(1)?.as_str().parse().ok()?;
                Some((id, unescape(caps.get(2)?.as_str())))
            })
            .collect();
        if !pairs.is_empty() {
            debug!("Salvaged {} pairs with the {} pattern", pairs.len(), name);
            return pairs;
        }
    }
    Vec::new()
}

fn keep_valid(pairs: Vec<(u64, String)>, expected: &HashSet<u64>) -> HashMap<u64, String> {
    let mut by_id = HashMap::new();
    for (id, translation) in pairs {
        if expected.contains(&id) && !translation.trim().is_empty() {
            by_id.entry(id).or_insert(translation);
        }
    }
    by_id
}

/// Run the strict parse and, when it falls short, the salvage; keep the better of the two
pub fn recover(raw: &str, expected_ids: &[u64]) -> RecoveredItems {
    let expected: HashSet<u64> = expected_ids.iter().copied().collect();
    let text = strip_fences(raw);

    let strict = parse_strict(text).map(|pairs| keep_valid(pairs, &expected)).unwrap_or_default();
    if strict.len() == expected.len() {
        return RecoveredItems {
            by_id: strict,
            recovery: Recovery::Strict,
        };
    }

    let salvaged = keep_valid(salvage(text), &expected);
    if salvaged.len() > strict.len() {
        warn!(
            "Strict parse recovered {} of {} items, salvage recovered {}",
            strict.len(),
            expected.len(),
            salvaged.len()
        );
        RecoveredItems {
            by_id: salvaged,
            recovery: Recovery::Salvaged,
        }
    } else if strict.is_empty() {
        RecoveredItems {
            by_id: strict,
            recovery: Recovery::Nothing,
        }
    } else {
        RecoveredItems {
            by_id: strict,
            recovery: Recovery::Strict,
        }
    }
}

/// Map recovered items onto the batch order
///
/// Fails with `IncompleteBatch` when the share of missing ids exceeds
/// `missing_ratio_threshold`, and with `MalformedResponse` when nothing at all
/// was recovered.
pub fn align(
    raw: &str,
    expected_ids: &[u64],
    recovered: RecoveredItems,
    missing_ratio_threshold: f64,
) -> Result<AlignedBatch, TranslationError> {
    let total = expected_ids.len();
    if total == 0 {
        return Ok(AlignedBatch {
            translations: Vec::new(),
            missing: Vec::new(),
        });
    }

    if recovered.recovery == Recovery::Nothing {
        debug!("Unusable reply: {}", preview(raw));
        return Err(TranslationError::MalformedResponse {
            message: format!("no translations recovered for {} ids", total),
            raw: raw.to_string(),
        });
    }

    let mut by_id = recovered.by_id;
    let mut translations = Vec::with_capacity(total);
    let mut missing = Vec::new();
    for id in expected_ids {
        match by_id.remove(id) {
            Some(text) => translations.push(text),
            None => {
                missing.push(*id);
                translations.push(MISSING_TRANSLATION_MARKER.to_string());
            }
        }
    }

    if missing.len() as f64 / total as f64 > missing_ratio_threshold {
        return Err(TranslationError::IncompleteBatch {
            missing: missing.len(),
            total,
            raw: raw.to_string(),
        });
    }
    if !missing.is_empty() {
        warn!("Batch reply missing ids {:?}; placeholders inserted", missing);
    }

    Ok(AlignedBatch { translations, missing })
}

/// Parse a flat `{"source": "target"}` object, as returned for titles and terms
pub fn parse_string_map(raw: &str) -> Option<BTreeMap<String, String>> {
    let text = strip_fences(raw);
    let candidate = match serde_json::from_str::<Value>(text) {
        Ok(value) => value,
        Err(_) => {
            let start = text.find('{')?;
            let end = text.rfind('}')?;
            if start >= end {
                return None;
            }
            serde_json::from_str::<Value>(&text[start..=end]).ok()?
        }
    };

    let map = candidate.as_object()?;
    Some(
        map.iter()
            .filter_map(|(k, v)| {
                let value = v.as_str()?.trim();
                let key = k.trim();
                (!key.is_empty() && !value.is_empty()).then(|| (key.to_string(), value.to_string()))
            })
            .collect(),
    )
}

/// Extract the text of a single-image reply
///
/// Prefers `{"translation": ...}`; any other non-empty reply is taken as plain text.
pub fn parse_image_reply(raw: &str) -> String {
    let text = strip_fences(raw);
    if let Ok(value) = serde_json::from_str::<Value>(text) {
        if let Some(translation) = value.get("translation").and_then(translation_of) {
            return translation;
        }
    }
    if let Some(pair) = salvage(text).into_iter().next() {
        return pair.1;
    }
    text.to_string()
}
