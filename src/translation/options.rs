/*!
 * Translation options carried by a request.
 *
 * Every option has a default and numeric options are clamped into range;
 * nothing in here rejects a request.
 */

use serde::{Deserialize, Serialize};

use crate::app_config::ServiceConfig;
use crate::language_utils;

/// Smallest and largest number of items sent to the tool in one invocation
pub const MIN_BATCH_SIZE: usize = 1;
pub const MAX_BATCH_SIZE: usize = 20;

/// Bounds for the per-item character limit
pub const MIN_CHARS_PER_ITEM: usize = 20;
pub const MAX_CHARS_PER_ITEM: usize = 5000;

/// How the front end renders the result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TranslationMode {
    /// Translation is shown next to the original text
    #[default]
    Bilingual,
    /// Translation replaces the original text
    TranslationOnly,
}

impl TranslationMode {
    /// Lenient parsing; unknown values fall back to the default
    pub fn parse_lenient(value: &str) -> Self {
        match value.trim().to_lowercase().replace('_', "-").as_str() {
            "translation-only" | "translationonly" | "replace" => Self::TranslationOnly,
            _ => Self::Bilingual,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bilingual => "bilingual",
            Self::TranslationOnly => "translation-only",
        }
    }
}

/// Register of the translated text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    #[default]
    Natural,
    Faithful,
    Concise,
}

impl Tone {
    /// Lenient parsing; unknown values fall back to the default
    pub fn parse_lenient(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "faithful" => Self::Faithful,
            "concise" => Self::Concise,
            _ => Self::Natural,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Natural => "natural",
            Self::Faithful => "faithful",
            Self::Concise => "concise",
        }
    }
}

/// Resolved options for one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationOptions {
    pub source_lang: String,
    pub target_lang: String,
    pub model: String,
    pub mode: TranslationMode,
    pub tone: Tone,
    pub batch_size: usize,
    pub max_chars_per_item: usize,
}

impl TranslationOptions {
    /// Options built purely from the service defaults
    pub fn from_defaults(defaults: &ServiceConfig) -> Self {
        Self {
            source_lang: defaults.default_source_language.clone(),
            target_lang: defaults.default_target_language.clone(),
            model: defaults.default_model.clone(),
            mode: TranslationMode::default(),
            tone: Tone::default(),
            batch_size: clamp_batch_size(defaults.default_batch_size),
            max_chars_per_item: clamp_max_chars(defaults.default_max_chars_per_item),
        }
    }

    /// Resolve raw request fields against the service defaults
    #[allow(clippy::too_many_arguments)]
    pub fn resolve(
        defaults: &ServiceConfig,
        source_lang: Option<&str>,
        target_lang: Option<&str>,
        model: Option<&str>,
        mode: Option<&str>,
        tone: Option<&str>,
        batch_size: Option<i64>,
        max_chars_per_item: Option<i64>,
    ) -> Self {
        let mut options = Self::from_defaults(defaults);

        if let Some(source) = non_empty(source_lang) {
            options.source_lang = if language_utils::is_auto(source) {
                language_utils::AUTO_DETECT.to_string()
            } else {
                source.to_string()
            };
        }
        if let Some(target) = non_empty(target_lang) {
            options.target_lang = target.to_string();
        }
        if let Some(model) = non_empty(model) {
            options.model = model.to_string();
        }
        if let Some(mode) = mode {
            options.mode = TranslationMode::parse_lenient(mode);
        }
        if let Some(tone) = tone {
            options.tone = Tone::parse_lenient(tone);
        }
        if let Some(size) = batch_size {
            options.batch_size = clamp_batch_size(size.max(0) as usize);
        }
        if let Some(max_chars) = max_chars_per_item {
            options.max_chars_per_item = clamp_max_chars(max_chars.max(0) as usize);
        }

        options
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

pub fn clamp_batch_size(size: usize) -> usize {
    size.clamp(MIN_BATCH_SIZE, MAX_BATCH_SIZE)
}

pub fn clamp_max_chars(max_chars: usize) -> usize {
    max_chars.clamp(MIN_CHARS_PER_ITEM, MAX_CHARS_PER_ITEM)
}
