/*!
 * Translation of text fragments through the external tool.
 *
 * - `options`: per-request options resolved against configured defaults
 * - `normalizer`: id assignment, deduplication and clipping of raw items
 * - `cache`: bounded in-memory cache of finished translations
 * - `prompts`: the batch prompt sent to the tool
 * - `extractor`: recovery of structured results from free-form tool output
 * - `orchestrator`: the per-request pipeline tying the above together
 */

pub use self::cache::{CacheKey, CacheStats, TranslationCache};
pub use self::extractor::{extract_results, BatchResult, Extraction, ExtractionStrategy};
pub use self::normalizer::{normalize_items, RawItem, TranslationItem};
pub use self::options::{Tone, TranslationMode, TranslationOptions};
pub use self::orchestrator::{BatchOrchestrator, ResponseMeta, TranslateRequest, TranslateResponse};
pub use self::prompts::{build_batch_prompt, PromptTemplate};

pub mod cache;
pub mod extractor;
pub mod normalizer;
pub mod options;
pub mod orchestrator;
pub mod prompts;
