/*!
 * Thai word segmentation capability.
 *
 * Thai is written without spaces between words, so line breaking needs a
 * segmenter to find word boundaries. The shaper accepts any implementation;
 * when none is available the [`NullSegmenter`] declines and the shaper falls
 * back to particle heuristics.
 */

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use log::debug;

use crate::language_utils::is_thai_combining;

/// Splits text into ordered word tokens
pub trait ThaiSegmenter: Send + Sync {
    /// Segment text into tokens whose concatenation is the input.
    ///
    /// Returns `None` when the segmenter cannot handle the text.
    fn segment(&self, text: &str) -> Option<Vec<String>>;

    /// Short name used in logs
    fn name(&self) -> &str;
}

/// Segmenter that never segments, selecting the heuristic path
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSegmenter;

impl ThaiSegmenter for NullSegmenter {
    fn segment(&self, _text: &str) -> Option<Vec<String>> {
        None
    }

    fn name(&self) -> &str {
        "none"
    }
}

/// Dictionary based longest-match segmenter
///
/// Unknown runs are emitted as single tokens and whitespace is kept as its
/// own token, so the tokens always concatenate back to the input.
#[derive(Debug, Clone)]
pub struct DictionarySegmenter {
    words: HashSet<String>,
    max_word_chars: usize,
}

impl DictionarySegmenter {
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let words: HashSet<String> = words
            .into_iter()
            .map(Into::into)
            .map(|w| w.trim().to_string())
            .filter(|w| !w.is_empty())
            .collect();
        let max_word_chars = words.iter().map(|w| w.chars().count()).max().unwrap_or(0);

        Self { words, max_word_chars }
    }

    /// Load a word list with one word per line
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read word list: {}", path.display()))?;
        let segmenter = Self::new(content.lines());
        debug!("Loaded {} words from {}", segmenter.len(), path.display());
        Ok(segmenter)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Byte length of the longest dictionary word starting the text
    fn longest_match(&self, rest: &str) -> Option<usize> {
        let mut best = None;
        for (count, (idx, c)) in rest.char_indices().enumerate() {
            if count >= self.max_word_chars {
                break;
            }
            let end = idx + c.len_utf8();
            // A word may not end right before a mark belonging to its last base
            let next_is_mark = rest[end..].chars().next().is_some_and(is_thai_combining);
            if !next_is_mark && self.words.contains(&rest[..end]) {
                best = Some(end);
            }
        }
        best
    }
}

impl ThaiSegmenter for DictionarySegmenter {
    fn segment(&self, text: &str) -> Option<Vec<String>> {
        if self.words.is_empty() || text.is_empty() {
            return None;
        }

        let mut tokens = Vec::new();
        let mut unknown = String::new();
        let mut pos = 0;

        while pos < text.len() {
            let rest = &text[pos..];
            let Some(first) = rest.chars().next() else { break };

            if first.is_whitespace() {
                if !unknown.is_empty() {
                    tokens.push(std::mem::take(&mut unknown));
                }
                tokens.push(first.to_string());
                pos += first.len_utf8();
                continue;
            }

            if let Some(len) = self.longest_match(rest) {
                if !unknown.is_empty() {
                    tokens.push(std::mem::take(&mut unknown));
                }
                tokens.push(rest[..len].to_string());
                pos += len;
            } else {
                unknown.push(first);
                pos += first.len_utf8();
            }
        }

        if !unknown.is_empty() {
            tokens.push(unknown);
        }

        Some(tokens)
    }

    fn name(&self) -> &str {
        "dictionary"
    }
}
