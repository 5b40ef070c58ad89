use anyhow::{Result, anyhow};
use isolang::Language;

/// Language utilities for BCP 47 style language tags
///
/// Requests carry tags such as `en`, `zh-CN` or `pt_BR`. Only the primary
/// subtag is resolved through ISO 639; the region is kept verbatim so that
/// prompts can still ask for a regional variant.

/// Marker for "let the tool detect the source language"
pub const AUTO_DETECT: &str = "auto";

/// Whether a source language asks for automatic detection
pub fn is_auto(code: &str) -> bool {
    let code = code.trim();
    code.is_empty() || code.eq_ignore_ascii_case(AUTO_DETECT)
}

/// Split a tag into its primary language subtag and optional region
pub fn split_tag(code: &str) -> (String, Option<String>) {
    let code = code.trim();
    let mut parts = code.splitn(2, ['-', '_']);
    let primary = parts.next().unwrap_or_default().to_lowercase();
    let region = parts
        .next()
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty());
    (primary, region)
}

/// Normalize a primary language subtag to ISO 639-2/T (3-letter) format
pub fn normalize_to_part2t(code: &str) -> Result<String> {
    let normalized_code = code.trim().to_lowercase();

    // If it's a 2-letter code, convert to 3-letter
    if normalized_code.len() == 2 {
        if let Some(lang) = Language::from_639_1(&normalized_code) {
            return Ok(lang.to_639_3().to_string());
        }
    }
    // If it's already a 3-letter code, ensure it's ISO 639-2/T
    else if normalized_code.len() == 3 {
        if Language::from_639_3(&normalized_code).is_some() {
            return Ok(normalized_code);
        }

        // ISO 639-2/B codes that differ from their 639-2/T form
        match normalized_code.as_str() {
            "fre" => return Ok("fra".to_string()),
            "ger" => return Ok("deu".to_string()),
            "dut" => return Ok("nld".to_string()),
            "gre" => return Ok("ell".to_string()),
            "chi" => return Ok("zho".to_string()),
            "cze" => return Ok("ces".to_string()),
            "ice" => return Ok("isl".to_string()),
            "per" => return Ok("fas".to_string()),
            "rum" => return Ok("ron".to_string()),
            "slo" => return Ok("slk".to_string()),
            _ => {}
        }
    }

    Err(anyhow!("Cannot normalize invalid language code: {}", code))
}

/// Get the English language name from a tag, ignoring any region subtag
pub fn get_language_name(code: &str) -> Result<String> {
    let (primary, _) = split_tag(code);
    let normalized = normalize_to_part2t(&primary)?;
    let lang = Language::from_639_3(&normalized)
        .ok_or_else(|| anyhow!("Failed to get language from code: {}", normalized))?;

    Ok(lang.to_name().to_string())
}

/// Human readable label for prompts, e.g. `Chinese (zh-CN)`
///
/// Unknown tags are passed through unchanged; the tool may still understand them.
pub fn describe_language(code: &str) -> String {
    let code = code.trim();
    match get_language_name(code) {
        Ok(name) => format!("{} ({})", name, code),
        Err(_) => code.to_string(),
    }
}
