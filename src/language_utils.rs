//! Language utilities for language hints and script detection
//!
//! This module normalizes ISO 639-1 (2-letter) and ISO 639-2 (3-letter)
//! language codes and detects Thai script in arbitrary text.

use anyhow::{Result, anyhow};
use isolang::Language;

/// First code point of the Thai Unicode block
const THAI_BLOCK_START: char = '\u{0E00}';

/// Last code point of the Thai Unicode block
const THAI_BLOCK_END: char = '\u{0E7F}';

/// Check whether a hint means "detect automatically"
pub fn is_auto(code: &str) -> bool {
    let code = code.trim();
    code.is_empty() || code.eq_ignore_ascii_case("auto")
}

/// Normalize a language code to ISO 639-2/T (3-letter) format
pub fn normalize_to_part2t(code: &str) -> Result<String> {
    let normalized_code = code.trim().to_lowercase();

    if normalized_code.len() == 2 {
        if let Some(lang) = Language::from_639_1(&normalized_code) {
            return Ok(lang.to_639_3().to_string());
        }
    } else if normalized_code.len() == 3 {
        if Language::from_639_3(&normalized_code).is_some() {
            return Ok(normalized_code);
        }
    } else if let Some(lang) = Language::from_name(&capitalize(&normalized_code)) {
        // Full English names such as "thai" or "english"
        return Ok(lang.to_639_3().to_string());
    }

    Err(anyhow!("Cannot normalize invalid language code: {}", code))
}

/// Two-letter ISO 639-1 code for a hint, as expected by speech services
pub fn to_part1(code: &str) -> Option<String> {
    if is_auto(code) {
        return None;
    }
    let normalized = normalize_to_part2t(code).ok()?;
    Language::from_639_3(&normalized)?
        .to_639_1()
        .map(|c| c.to_string())
}

/// Get the language name from a code
pub fn get_language_name(code: &str) -> Result<String> {
    let normalized = normalize_to_part2t(code)?;
    let lang = Language::from_639_3(&normalized)
        .ok_or_else(|| anyhow!("Failed to get language from code: {}", normalized))?;

    Ok(lang.to_name().to_string())
}

/// Check if a language hint designates Thai
pub fn is_thai_language(code: &str) -> bool {
    matches!(normalize_to_part2t(code).as_deref(), Ok("tha"))
}

/// Check if a character lies in the Thai Unicode block
pub fn is_thai_char(c: char) -> bool {
    (THAI_BLOCK_START..=THAI_BLOCK_END).contains(&c)
}

/// Check if a character is a Thai mark that renders on top of or below its base
///
/// Such marks do not occupy a display cell of their own.
pub fn is_thai_combining(c: char) -> bool {
    matches!(c, '\u{0E31}' | '\u{0E34}'..='\u{0E3A}' | '\u{0E47}'..='\u{0E4E}')
}

/// Check if text contains any Thai character
pub fn contains_thai(text: &str) -> bool {
    text.chars().any(is_thai_char)
}

/// Share of non-whitespace code points that are Thai (0.0 for blank text)
pub fn thai_ratio(text: &str) -> f64 {
    let mut total = 0usize;
    let mut thai = 0usize;
    for c in text.chars().filter(|c| !c.is_whitespace()) {
        total += 1;
        if is_thai_char(c) {
            thai += 1;
        }
    }

    if total == 0 {
        0.0
    } else {
        thai as f64 / total as f64
    }
}

/// Number of display cells of a string; Thai combining marks take none
pub fn display_width(text: &str) -> usize {
    text.chars().filter(|c| !is_thai_combining(*c)).count()
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
