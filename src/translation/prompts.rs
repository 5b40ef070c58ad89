/*!
 * Prompt construction for batch translation.
 *
 * One prompt is sent per chunk. It carries the language pair, the tone and
 * mode instructions, the strict output schema, and the chunk's items as JSON.
 */

use serde::Serialize;

use super::normalizer::TranslationItem;
use super::options::{Tone, TranslationMode, TranslationOptions};
use crate::language_utils;

/// System prompt template for fragment translation.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    /// The template string with placeholders
    template: String,
}

impl PromptTemplate {
    /// The default instruction block.
    pub const FRAGMENT_TRANSLATOR: &'static str = r#"You are a professional translator working on text fragments taken from a web page.

## Task
- {source_instruction}
- Translate every item into {target_language}.
- {tone_instruction}
- {mode_instruction}

## Rules
- Translate each item independently; never merge, split, reorder or drop items.
- Keep URLs, code, numbers, product names and placeholders unchanged.
- Keep the `id` of every item exactly as given.
- Do not run any commands and do not modify any files.

## Output
Respond with JSON only, no commentary and no markdown fences, in exactly this shape:
{"results":[{"id":"<item id>","translatedText":"<translation>"}]}"#;

    /// Create a new prompt template.
    pub fn new(template: &str) -> Self {
        Self {
            template: template.to_string(),
        }
    }

    /// Create the default fragment translator template.
    pub fn fragment_translator() -> Self {
        Self::new(Self::FRAGMENT_TRANSLATOR)
    }

    /// Render the template for the given options.
    pub fn render(&self, options: &TranslationOptions) -> String {
        self.template
            .replace("{source_instruction}", &source_instruction(&options.source_lang))
            .replace("{target_language}", &language_utils::describe_language(&options.target_lang))
            .replace("{tone_instruction}", tone_instruction(options.tone))
            .replace("{mode_instruction}", mode_instruction(options.mode))
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self::fragment_translator()
    }
}

fn source_instruction(source_lang: &str) -> String {
    if language_utils::is_auto(source_lang) {
        "Detect the source language of each item automatically.".to_string()
    } else {
        format!(
            "The source language is {}.",
            language_utils::describe_language(source_lang)
        )
    }
}

fn tone_instruction(tone: Tone) -> &'static str {
    match tone {
        Tone::Natural => "Use natural, fluent phrasing that reads as if originally written in the target language.",
        Tone::Faithful => "Stay faithful to the source: preserve structure, terminology and nuance even where it reads less fluently.",
        Tone::Concise => "Be concise: convey the meaning in as few words as the target language comfortably allows.",
    }
}

fn mode_instruction(mode: TranslationMode) -> &'static str {
    match mode {
        TranslationMode::Bilingual => {
            "The translation is shown directly below the original text, so output only the translation itself."
        }
        TranslationMode::TranslationOnly => {
            "The translation replaces the original text on the page, so it must read as complete standalone text."
        }
    }
}

/// Items block appended after the instructions
#[derive(Debug, Serialize)]
struct PromptItems<'a> {
    items: Vec<PromptItem<'a>>,
}

#[derive(Debug, Serialize)]
struct PromptItem<'a> {
    id: &'a str,
    text: &'a str,
}

/// Build the full prompt for one chunk
pub fn build_batch_prompt(options: &TranslationOptions, items: &[TranslationItem]) -> String {
    let payload = PromptItems {
        items: items
            .iter()
            .map(|item| PromptItem { id: &item.id, text: &item.text })
            .collect(),
    };
    let items_json = serde_json::to_string_pretty(&payload).unwrap_or_else(|_| "{}".to_string());

    format!(
        "{}\n\n## Input\n{}\n",
        PromptTemplate::fragment_translator().render(options),
        items_json
    )
}
