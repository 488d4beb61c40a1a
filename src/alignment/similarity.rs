//! Text similarity used to score script/transcript matches

use std::collections::HashMap;

use crate::language_utils::is_thai_char;

/// Lower-case text and keep only letters, digits and Thai characters
pub fn normalize(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_alphanumeric() || is_thai_char(*c))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Character bigram counts of a text
#[derive(Debug, Clone, Default)]
pub struct BigramProfile {
    counts: HashMap<(char, char), usize>,
    total: usize,
    first: Option<char>,
    last: Option<char>,
}

impl BigramProfile {
    pub fn new(text: &str) -> Self {
        let mut profile = Self::default();
        for c in text.chars() {
            if let Some(prev) = profile.last {
                *profile.counts.entry((prev, c)).or_insert(0) += 1;
                profile.total += 1;
            }
            profile.first.get_or_insert(c);
            profile.last = Some(c);
        }
        profile
    }
}

/// Dice score of a growing text against a fixed target
///
/// Text can be added at either end; each added character updates the shared
/// bigram count in constant time, so scoring a group that grows one unit at
/// a time never re-reads the earlier units.
#[derive(Debug, Clone)]
pub struct GroupScorer<'a> {
    target: &'a BigramProfile,
    group: BigramProfile,
    shared: usize,
}

impl<'a> GroupScorer<'a> {
    pub fn new(target: &'a BigramProfile) -> Self {
        Self {
            target,
            group: BigramProfile::default(),
            shared: 0,
        }
    }

    fn add_pair(&mut self, pair: (char, char)) {
        let count = self.group.counts.entry(pair).or_insert(0);
        *count += 1;
        self.group.total += 1;
        if self.target.counts.get(&pair).is_some_and(|t| *count <= *t) {
            self.shared += 1;
        }
    }

    /// Extend the group with text after what it holds
    pub fn append(&mut self, text: &str) {
        for c in text.chars() {
            if let Some(prev) = self.group.last {
                self.add_pair((prev, c));
            }
            self.group.first.get_or_insert(c);
            self.group.last = Some(c);
        }
    }

    /// Extend the group with text before what it holds
    pub fn prepend(&mut self, text: &str) {
        for c in text.chars().rev() {
            if let Some(next) = self.group.first {
                self.add_pair((c, next));
            }
            self.group.last.get_or_insert(c);
            self.group.first = Some(c);
        }
    }

    /// Texts shorter than two characters compare by equality
    pub fn score(&self) -> f64 {
        let total = self.group.total + self.target.total;
        if total == 0 {
            return if self.group.first.is_some() && self.group.first == self.target.first {
                1.0
            } else {
                0.0
            };
        }
        2.0 * self.shared as f64 / total as f64
    }
}

/// Sørensen-Dice coefficient over character bigrams of already normalized text
///
/// Texts shorter than two characters compare by equality.
pub fn dice(a: &str, b: &str) -> f64 {
    let target = BigramProfile::new(b);
    let mut scorer = GroupScorer::new(&target);
    scorer.append(a);
    scorer.score()
}

/// Similarity of two raw texts after normalization
pub fn similarity(a: &str, b: &str) -> f64 {
    dice(&normalize(a), &normalize(b))
}
