/*!
 * Recovery of per-item translations from free-form tool output.
 *
 * The tool is asked for strict JSON but may answer with bare JSON, JSON in a
 * markdown fence, JSON surrounded by prose, a differently shaped structure,
 * or plain text. Strategies are tried in a fixed order:
 *
 * 1. the whole trimmed output
 * 2. the content of each fenced block
 * 3. every balanced `{...}` / `[...]` span, left to right
 * 4. for a single-item batch, the plain text itself
 *
 * A strategy only counts when normalization yields at least one row.
 */

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

use super::normalizer::TranslationItem;
use crate::errors::{tail_excerpt, ExtractionError, EXCERPT_MAX_CHARS};

/// Upper bound on balanced-span candidates tried per output
const MAX_SCAN_CANDIDATES: usize = 256;

/// Upper bound on bytes walked by the balanced scan, summed over all openers
pub const MAX_SCAN_BYTES: usize = 4 * 1024 * 1024;

// Opening fence, optional format tag, lazily captured body, closing fence
static FENCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```[ \t]*[A-Za-z0-9_+.\-]*[ \t]*\r?\n?(.*?)```").unwrap());

/// One translated item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResult {
    pub id: String,
    #[serde(rename = "translatedText")]
    pub translated_text: String,
}

impl BatchResult {
    pub fn new(id: impl Into<String>, translated_text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            translated_text: translated_text.into(),
        }
    }
}

/// Which recovery path produced the rows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionStrategy {
    WholeOutput,
    FencedBlock,
    BalancedScan,
    PlainText,
}

/// Rows recovered from one tool output
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub rows: Vec<BatchResult>,
    pub strategy: ExtractionStrategy,
}

/// Accepted top-level shapes, in priority order
#[derive(Deserialize)]
#[serde(untagged)]
enum Payload {
    List(Vec<Row>),
    Envelope(Envelope),
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(default)]
    results: Option<Vec<Row>>,
    #[serde(default)]
    translations: Option<Vec<Row>>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Row {
    Text(String),
    Record(RowRecord),
    Other(Value),
}

#[derive(Deserialize)]
struct RowRecord {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default, rename = "translatedText")]
    translated_text: Option<Value>,
    #[serde(default)]
    translation: Option<Value>,
    #[serde(default)]
    text: Option<Value>,
}

impl RowRecord {
    fn resolved_id(&self) -> Option<String> {
        match self.id.as_ref()? {
            Value::String(s) => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    fn resolved_text(&self) -> Option<&str> {
        [&self.translated_text, &self.translation, &self.text]
            .into_iter()
            .find_map(|field| match field {
                Some(Value::String(s)) if !s.trim().is_empty() => Some(s.as_str()),
                _ => None,
            })
    }
}

/// Recover `{id, translatedText}` rows for `batch` from raw tool output
pub fn extract_results(raw: &str, batch: &[TranslationItem]) -> Result<Extraction, ExtractionError> {
    let trimmed = raw.trim();

    if let Some(rows) = parse_rows(trimmed, batch) {
        return Ok(Extraction { rows, strategy: ExtractionStrategy::WholeOutput });
    }

    for captures in FENCE_RE.captures_iter(trimmed) {
        if let Some(inner) = captures.get(1) {
            if let Some(rows) = parse_rows(inner.as_str().trim(), batch) {
                return Ok(Extraction { rows, strategy: ExtractionStrategy::FencedBlock });
            }
        }
    }

    if let Some(rows) = scan_balanced(trimmed, batch) {
        return Ok(Extraction { rows, strategy: ExtractionStrategy::BalancedScan });
    }

    if batch.len() == 1 && !is_structured(trimmed) {
        let text = strip_outer_quotes(trimmed).trim();
        if !text.is_empty() {
            return Ok(Extraction {
                rows: vec![BatchResult::new(batch[0].id.clone(), text)],
                strategy: ExtractionStrategy::PlainText,
            });
        }
    }

    Err(ExtractionError::NoStructuredResult {
        excerpt: tail_excerpt(raw, EXCERPT_MAX_CHARS),
    })
}

/// Parse one candidate and normalize it; `None` unless at least one row survives
fn parse_rows(candidate: &str, batch: &[TranslationItem]) -> Option<Vec<BatchResult>> {
    if candidate.is_empty() {
        return None;
    }
    let payload: Payload = serde_json::from_str(candidate).ok()?;
    let rows = normalize_payload(payload, batch);
    if rows.is_empty() { None } else { Some(rows) }
}

fn normalize_payload(payload: Payload, batch: &[TranslationItem]) -> Vec<BatchResult> {
    let rows = match payload {
        Payload::List(rows) => rows,
        Payload::Envelope(envelope) => match (envelope.results, envelope.translations) {
            (Some(results), _) if !results.is_empty() => results,
            (_, Some(translations)) => translations,
            _ => Vec::new(),
        },
    };

    let mut seen = HashSet::new();
    let mut results = Vec::with_capacity(rows.len());
    for (index, row) in rows.into_iter().enumerate() {
        let resolved = match row {
            // Bare strings can only be attributed by position
            Row::Text(text) => batch
                .get(index)
                .map(|item| (item.id.clone(), text.trim().to_string())),
            Row::Record(record) => match (record.resolved_id(), record.resolved_text()) {
                (Some(id), Some(text)) => Some((id, text.trim().to_string())),
                _ => None,
            },
            Row::Other(_) => None,
        };

        if let Some((id, text)) = resolved {
            if id.is_empty() || text.is_empty() || !seen.insert(id.clone()) {
                continue;
            }
            results.push(BatchResult::new(id, text));
        }
    }
    results
}

/// Try every balanced span starting at an opening brace or bracket
fn scan_balanced(text: &str, batch: &[TranslationItem]) -> Option<Vec<BatchResult>> {
    let bytes = text.as_bytes();
    let mut budget = MAX_SCAN_BYTES;
    let mut attempts = 0;

    for (start, &byte) in bytes.iter().enumerate() {
        if budget == 0 {
            break;
        }
        if byte != b'{' && byte != b'[' {
            continue;
        }
        let Some(end) = span_end(bytes, start, &mut budget) else {
            continue;
        };
        attempts += 1;
        if let Some(rows) = parse_rows(&text[start..=end], batch) {
            return Some(rows);
        }
        if attempts >= MAX_SCAN_CANDIDATES {
            break;
        }
    }
    None
}

/// Index of the delimiter closing the one at `start`, skipping string contents
pub fn balanced_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut unlimited = usize::MAX;
    span_end(bytes, start, &mut unlimited)
}

/// `balanced_end` walking at most `budget` bytes; the bytes walked are
/// deducted from `budget`
fn span_end(bytes: &[u8], start: usize, budget: &mut usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    let window = bytes.get(start..)?.iter().take(*budget);
    let mut walked = 0;

    for (offset, &byte) in window.enumerate() {
        walked += 1;
        if in_string {
            if escaped {
                escaped = false;
            } else if byte == b'\\' {
                escaped = true;
            } else if byte == b'"' {
                in_string = false;
            }
            continue;
        }

        match byte {
            b'"' => in_string = true,
            b'{' | b'[' => depth += 1,
            b'}' | b']' => {
                if depth <= 1 {
                    *budget -= walked;
                    return (depth == 1).then_some(start + offset);
                }
                depth -= 1;
            }
            _ => {}
        }
    }
    *budget -= walked;
    None
}

/// Whole output is itself a JSON object or array.
///
/// Such output already failed every structured strategy, so it is a JSON
/// answer of the wrong shape. Returning it verbatim would put raw JSON in
/// place of the translation.
fn is_structured(text: &str) -> bool {
    (text.starts_with('{') || text.starts_with('['))
        && serde_json::from_str::<Value>(text).is_ok()
}

fn strip_outer_quotes(text: &str) -> &str {
    const QUOTES: [char; 6] = ['"', '\'', '“', '”', '「', '」'];
    let text = text.strip_prefix(QUOTES).unwrap_or(text);
    text.strip_suffix(QUOTES).unwrap_or(text)
}
