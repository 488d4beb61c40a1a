//! Line breaking for space-delimited scripts

use crate::language_utils::display_width;

/// Split text at its first colon into a heading and the remainder
///
/// The heading keeps its colon. Returns `None` when either side is empty.
pub(crate) fn split_heading(text: &str) -> Option<(String, String)> {
    let idx = text.find(':')?;
    let heading = text[..=idx].trim();
    let rest = text[idx + 1..].trim();
    if heading.len() <= 1 || rest.is_empty() {
        return None;
    }
    Some((heading.to_string(), rest.to_string()))
}

/// Whether a word belongs to the closing-word table (case and punctuation insensitive)
fn is_closing_word(word: &str, closing_words: &[String]) -> bool {
    let bare: String = word
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '&')
        .collect::<String>()
        .to_lowercase();
    !bare.is_empty() && closing_words.iter().any(|w| w.eq_ignore_ascii_case(&bare))
}

/// Break index for a two-line split that starts the second line on a closing word
///
/// Only breaks inside the middle third of the word sequence are considered;
/// the one closest to the centre wins, earlier on ties.
pub(crate) fn closing_word_break(words: &[&str], closing_words: &[String]) -> Option<usize> {
    let n = words.len();
    if n < 2 {
        return None;
    }
    let lo = n.div_ceil(3).max(1);
    let hi = (2 * n / 3).min(n - 1);
    let centre = n as f64 / 2.0;

    (lo..=hi)
        .filter(|&b| is_closing_word(words[b], closing_words))
        .min_by(|&a, &b| {
            let da = (a as f64 - centre).abs();
            let db = (b as f64 - centre).abs();
            da.total_cmp(&db).then(a.cmp(&b))
        })
}

/// Distribute words across `lines` lines by count, earlier lines taking the remainder
pub(crate) fn distribute_evenly(words: &[&str], lines: usize) -> Vec<String> {
    let lines = lines.clamp(1, words.len().max(1));
    let base = words.len() / lines;
    let extra = words.len() % lines;

    let mut out = Vec::with_capacity(lines);
    let mut idx = 0;
    for i in 0..lines {
        let take = base + usize::from(i < extra);
        if take == 0 {
            continue;
        }
        out.push(words[idx..idx + take].join(" "));
        idx += take;
    }
    out
}

/// Split words into the target number of lines
pub(crate) fn split_words(words: &[&str], target_lines: usize, closing_words: &[String]) -> Vec<String> {
    if target_lines == 2 {
        if let Some(b) = closing_word_break(words, closing_words) {
            return vec![words[..b].join(" "), words[b..].join(" ")];
        }
    }
    distribute_evenly(words, target_lines)
}

/// Greedy word wrap bounded by display cells and words per line
///
/// A word wider than `max_cells` gets a line of its own.
pub(crate) fn greedy_wrap(words: &[&str], max_cells: usize, max_words: usize) -> Vec<String> {
    let max_words = if max_words == 0 { usize::MAX } else { max_words };
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_cells = 0;
    let mut current_words = 0;

    for word in words {
        let w = display_width(word);
        let fits = current_words == 0 || (current_cells + 1 + w <= max_cells && current_words < max_words);
        if !fits {
            lines.push(std::mem::take(&mut current));
            current_cells = 0;
            current_words = 0;
        }
        if current_words > 0 {
            current.push(' ');
            current_cells += 1;
        }
        current.push_str(word);
        current_cells += w;
        current_words += 1;
    }

    if !current.is_empty() {
        lines.push(current);
    }
    lines
}
