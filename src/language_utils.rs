use anyhow::{anyhow, Result};
use isolang::Language;

/// Language utilities for the language hints stored in settings
///
/// Hints may be ISO 639-1 / 639-2 codes ("en", "fas", "per") or free text
/// ("Brazilian Portuguese"). Codes are expanded to English language names
/// before they are placed into prompts.

/// ISO 639-2/B codes that differ from their 639-2/T counterpart
fn bibliographic_to_terminology(code: &str) -> Option<&'static str> {
    match code {
        "fre" => Some("fra"),
        "ger" => Some("deu"),
        "dut" => Some("nld"),
        "gre" => Some("ell"),
        "chi" => Some("zho"),
        "cze" => Some("ces"),
        "ice" => Some("isl"),
        "alb" => Some("sqi"),
        "arm" => Some("hye"),
        "baq" => Some("eus"),
        "bur" => Some("mya"),
        "per" => Some("fas"),
        "geo" => Some("kat"),
        "may" => Some("msa"),
        "mac" => Some("mkd"),
        "rum" => Some("ron"),
        "slo" => Some("slk"),
        "wel" => Some("cym"),
        _ => None,
    }
}

/// Normalize a language code to ISO 639-2/T (3-letter) format
pub fn normalize_to_part2t(code: &str) -> Result<String> {
    let normalized_code = code.trim().to_lowercase();

    match normalized_code.len() {
        2 => {
            if let Some(lang) = Language::from_639_1(&normalized_code) {
                return Ok(lang.to_639_3().to_string());
            }
        }
        3 => {
            if Language::from_639_3(&normalized_code).is_some() {
                return Ok(normalized_code);
            }
            if let Some(part2t) = bibliographic_to_terminology(&normalized_code) {
                return Ok(part2t.to_string());
            }
        }
        _ => {}
    }

    Err(anyhow!("Cannot normalize invalid language code: {}", code))
}

/// Get the English language name from a code
pub fn get_language_name(code: &str) -> Result<String> {
    let normalized = normalize_to_part2t(code)?;
    let lang = Language::from_639_3(&normalized)
        .ok_or_else(|| anyhow!("Failed to get language from code: {}", normalized))?;

    Ok(lang.to_name().to_string())
}

/// Name to use for a language hint inside a prompt.
///
/// Known codes become their English name; anything else is used verbatim.
pub fn prompt_language_name(hint: &str) -> String {
    let hint = hint.trim();
    get_language_name(hint).unwrap_or_else(|_| hint.to_string())
}

/// Check a UI locale such as "en" or "pt-BR" (the language part must be a known code)
pub fn is_valid_locale(locale: &str) -> bool {
    let language = locale.split(['-', '_']).next().unwrap_or_default();
    normalize_to_part2t(language).is_ok()
}
