/*!
 * Input item normalization.
 *
 * Turns the raw `{id?, text}` candidates of a request into validated,
 * length-bounded items with ids that are unique within the request.
 */

use log::{debug, warn};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;

/// Marker appended to text that was clipped to the per-item limit
pub const TRUNCATION_MARKER: &str = "…";

/// A candidate item as supplied by the client
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawItem {
    /// Optional caller-supplied id; numbers are accepted and stringified
    #[serde(default, deserialize_with = "lenient_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Text to translate
    #[serde(default)]
    pub text: String,
}

impl RawItem {
    pub fn new(id: Option<&str>, text: &str) -> Self {
        Self {
            id: id.map(str::to_string),
            text: text.to_string(),
        }
    }
}

/// A validated item ready for translation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranslationItem {
    pub id: String,
    pub text: String,
}

/// Validate, identify and clip raw items
///
/// Items whose text is blank are dropped. A caller id that already appeared
/// earlier in the request drops the later item. Items without an id get the
/// positional id `item-{index}`.
pub fn normalize_items(raw: &[RawItem], max_chars: usize) -> Vec<TranslationItem> {
    let caller_ids: HashSet<&str> = raw
        .iter()
        .filter(|item| !item.text.trim().is_empty())
        .filter_map(|item| item.id.as_deref().map(str::trim))
        .filter(|id| !id.is_empty())
        .collect();

    let mut seen: HashSet<String> = HashSet::with_capacity(raw.len());
    let mut items = Vec::with_capacity(raw.len());

    for (index, candidate) in raw.iter().enumerate() {
        let text = candidate.text.trim();
        if text.is_empty() {
            debug!("Dropping item {} with empty text", index);
            continue;
        }

        let id = match candidate.id.as_deref().map(str::trim).filter(|id| !id.is_empty()) {
            Some(id) => {
                if seen.contains(id) {
                    warn!("Dropping item {} with duplicate id '{}'", index, id);
                    continue;
                }
                id.to_string()
            }
            None => generate_id(index, &caller_ids, &seen),
        };

        seen.insert(id.clone());
        items.push(TranslationItem {
            id,
            text: clip_text(text, max_chars),
        });
    }

    items
}

/// Positional id that collides with neither caller ids nor ids handed out so far
fn generate_id(index: usize, caller_ids: &HashSet<&str>, seen: &HashSet<String>) -> String {
    let base = format!("item-{}", index);
    let taken = |candidate: &str| caller_ids.contains(candidate) || seen.contains(candidate);
    if !taken(&base) {
        return base;
    }
    (2..)
        .map(|n| format!("{}-{}", base, n))
        .find(|candidate| !taken(candidate))
        .unwrap_or(base)
}

/// Clip `text` to at most `max_chars` characters, marker included
pub fn clip_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let marker_len = TRUNCATION_MARKER.chars().count();
    let keep = max_chars.saturating_sub(marker_len);
    let mut clipped: String = text.chars().take(keep).collect();
    clipped.truncate(clipped.trim_end().len());
    clipped.push_str(TRUNCATION_MARKER);
    clipped
}

fn lenient_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}
