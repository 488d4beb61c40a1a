/*!
 * Script to transcript alignment.
 *
 * The script is authoritative for wording, the transcript for timing. Both
 * follow the same narration, so the alignment is monotonic: a dynamic
 * programme over (script unit, transcript segment) pairs picks the grouping
 * that maximises similarity weighted by script length. Groups are either
 * one-to-one, several units sharing one segment, or one unit spanning
 * several segments.
 */

pub mod similarity;

use std::ops::Range;

use log::{debug, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::app_config::AlignmentConfig;
use crate::errors::AlignmentError;
use crate::language_utils::display_width;
use crate::subtitle_processor::{Cue, TranscriptSegment};

use similarity::{BigramProfile, GroupScorer, dice, normalize};

// @const: Sentence end followed by whitespace; decimals like "3.5" stay intact
static SENTENCE_END: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.!?。！？]+[\s]+|[。！？]+").unwrap());

/// One group of the chosen alignment
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedGroup {
    /// Script units in the group
    pub units: Range<usize>,
    /// Transcript segments in the group
    pub segments: Range<usize>,
    /// Similarity of the grouped texts (0.0-1.0)
    pub similarity: f64,
}

/// Alignment outcome with its score
#[derive(Debug, Clone)]
pub struct AlignmentResult {
    /// Timed cues carrying script text, one per script unit
    pub cues: Vec<Cue>,
    /// Weighted similarity over the whole script (0.0-1.0)
    pub score: f64,
    pub groups: Vec<AlignedGroup>,
}

#[derive(Debug, Clone, Copy)]
enum Step {
    Start,
    Pair,
    UnitsToSegment(usize),
    UnitToSegments(usize),
}

/// Split script text into sentence or phrase units
///
/// Units end at line breaks and at terminal punctuation; the punctuation
/// stays with its unit. Fragments without any letter are attached to the
/// preceding unit.
pub fn split_script(script: &str) -> Vec<String> {
    let mut units: Vec<String> = Vec::new();
    let mut pending = String::new();

    for line in script.lines() {
        let mut pieces = Vec::new();
        let mut last = 0;
        for m in SENTENCE_END.find_iter(line) {
            pieces.push(&line[last..m.end()]);
            last = m.end();
        }
        pieces.push(&line[last..]);

        for piece in pieces {
            let piece = piece.trim();
            if piece.is_empty() {
                continue;
            }
            if normalize(piece).is_empty() {
                match units.last_mut() {
                    Some(prev) => prev.push_str(piece),
                    None => pending.push_str(piece),
                }
                continue;
            }
            let mut unit = std::mem::take(&mut pending);
            unit.push_str(piece);
            units.push(unit);
        }
    }

    if !pending.is_empty() {
        units.push(pending);
    }
    units
}

/// Sort segments and repair what would break monotonic timing
///
/// Blank or inverted segments are dropped. A segment starting inside its
/// predecessor starts at the predecessor's end instead; one lying entirely
/// inside its predecessor is merged into it.
pub fn normalize_segments(segments: &[TranscriptSegment]) -> Vec<TranscriptSegment> {
    let mut sorted: Vec<TranscriptSegment> = segments
        .iter()
        .filter(|s| {
            let keep = !s.text.trim().is_empty() && s.end > s.start;
            if !keep {
                debug!("Dropping unusable segment {:.3}-{:.3}", s.start, s.end);
            }
            keep
        })
        .cloned()
        .collect();
    sorted.sort_by(|a, b| a.start.total_cmp(&b.start));

    let mut out: Vec<TranscriptSegment> = Vec::with_capacity(sorted.len());
    for mut seg in sorted {
        if let Some(prev) = out.last_mut() {
            if seg.start < prev.end {
                warn!(
                    "Transcript segments overlap by {:.3}s at {:.3}s, correcting",
                    prev.end - seg.start,
                    seg.start
                );
                if seg.end <= prev.end {
                    prev.text = format!("{} {}", prev.text.trim(), seg.text.trim());
                    continue;
                }
                seg.start = prev.end;
            }
        }
        out.push(seg);
    }
    out
}

/// Aligns script text against timed transcript segments
#[derive(Debug, Clone)]
pub struct ScriptAligner {
    config: AlignmentConfig,
}

impl Default for ScriptAligner {
    fn default() -> Self {
        Self::new(AlignmentConfig::default())
    }
}

impl ScriptAligner {
    pub fn new(config: AlignmentConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AlignmentConfig {
        &self.config
    }

    /// Align and return only the cues
    pub fn align(
        &self,
        segments: &[TranscriptSegment],
        script: &str,
        min_start: f64,
    ) -> Result<Vec<Cue>, AlignmentError> {
        self.align_detailed(segments, script, min_start).map(|r| r.cues)
    }

    /// Align and return cues together with the chosen groups and score
    pub fn align_detailed(
        &self,
        segments: &[TranscriptSegment],
        script: &str,
        min_start: f64,
    ) -> Result<AlignmentResult, AlignmentError> {
        let units = split_script(script);
        if units.is_empty() {
            return Err(AlignmentError::EmptyScript);
        }
        let segments = normalize_segments(segments);
        if segments.is_empty() {
            return Err(AlignmentError::EmptyTranscript);
        }

        let (groups, score) = self.best_groups(&units, &segments);
        info!(
            "Aligned {} script units to {} segments in {} groups (score {:.3})",
            units.len(),
            segments.len(),
            groups.len(),
            score
        );

        if score < self.config.min_similarity {
            return Err(AlignmentError::LowSimilarity {
                score,
                threshold: self.config.min_similarity,
            });
        }

        let mut cues = Vec::with_capacity(units.len());
        for group in &groups {
            self.emit_group(group, &units, &segments, &mut cues);
        }
        self.enforce_min_start(&mut cues, min_start);

        Ok(AlignmentResult { cues, score, groups })
    }

    /// Run the dynamic programme, returning groups in order and the viability score
    fn best_groups(&self, units: &[String], segments: &[TranscriptSegment]) -> (Vec<AlignedGroup>, f64) {
        let n = units.len();
        let m = segments.len();
        let unit_norm: Vec<String> = units.iter().map(|u| normalize(u)).collect();
        let seg_norm: Vec<String> = segments.iter().map(|s| normalize(&s.text)).collect();
        let weights: Vec<f64> = unit_norm.iter().map(|u| display_width(u).max(1) as f64).collect();
        let unit_profiles: Vec<BigramProfile> = unit_norm.iter().map(|u| BigramProfile::new(u)).collect();
        let seg_profiles: Vec<BigramProfile> = seg_norm.iter().map(|s| BigramProfile::new(s)).collect();
        let total_weight: f64 = weights.iter().sum();

        // Group bounds grow when one side is much longer so that (n, m) stays reachable
        let max_units = self.config.max_group_size.max(n.div_ceil(m)).max(1);
        let max_segs = self.config.max_group_size.max(m.div_ceil(n)).max(1);

        let mut score = vec![vec![f64::NEG_INFINITY; m + 1]; n + 1];
        let mut step = vec![vec![Step::Start; m + 1]; n + 1];
        score[0][0] = 0.0;

        for i in 1..=n {
            for j in 1..=m {
                let mut best = f64::NEG_INFINITY;
                let mut best_step = Step::Start;

                // units i-a..i against segment j-1, grown one unit at a time
                let mut scorer = GroupScorer::new(&seg_profiles[j - 1]);
                scorer.append(&unit_norm[i - 1]);
                let mut weight = weights[i - 1];
                let prev = score[i - 1][j - 1];
                if prev.is_finite() {
                    let s = prev + scorer.score() * weight;
                    if s > best {
                        best = s;
                        best_step = Step::Pair;
                    }
                }
                for a in 2..=max_units.min(i) {
                    scorer.prepend(&unit_norm[i - a]);
                    weight += weights[i - a];
                    let prev = score[i - a][j - 1];
                    if !prev.is_finite() {
                        continue;
                    }
                    let s = prev + scorer.score() * weight;
                    if s > best {
                        best = s;
                        best_step = Step::UnitsToSegment(a);
                    }
                }

                let mut scorer = GroupScorer::new(&unit_profiles[i - 1]);
                scorer.append(&seg_norm[j - 1]);
                for b in 2..=max_segs.min(j) {
                    scorer.prepend(&seg_norm[j - b]);
                    let prev = score[i - 1][j - b];
                    if !prev.is_finite() {
                        continue;
                    }
                    let s = prev + scorer.score() * weights[i - 1];
                    if s > best {
                        best = s;
                        best_step = Step::UnitToSegments(b);
                    }
                }

                score[i][j] = best;
                step[i][j] = best_step;
            }
        }

        let mut groups = Vec::new();
        let (mut i, mut j) = (n, m);
        while i > 0 && j > 0 {
            let (a, b) = match step[i][j] {
                Step::Pair => (1, 1),
                Step::UnitsToSegment(a) => (a, 1),
                Step::UnitToSegments(b) => (1, b),
                Step::Start => break,
            };
            let similarity = dice(&unit_norm[i - a..i].concat(), &seg_norm[j - b..j].concat());
            groups.push(AlignedGroup {
                units: i - a..i,
                segments: j - b..j,
                similarity,
            });
            i -= a;
            j -= b;
        }
        groups.reverse();

        let viability = if score[n][m].is_finite() && total_weight > 0.0 {
            score[n][m] / total_weight
        } else {
            0.0
        };
        (groups, viability)
    }

    /// Turn one group into cues
    fn emit_group(&self, group: &AlignedGroup, units: &[String], segments: &[TranscriptSegment], cues: &mut Vec<Cue>) {
        let start = segments[group.segments.start].start;
        let end = segments[group.segments.end - 1].end;

        if group.units.len() == 1 {
            debug!(
                "Unit {} spans segments {:?} ({:.3}-{:.3}, similarity {:.2})",
                group.units.start, group.segments, start, end, group.similarity
            );
            cues.push(Cue::raw(start, end, units[group.units.start].trim()));
            return;
        }

        // Several units share one time range, split by relative length
        let lengths: Vec<f64> = units[group.units.clone()]
            .iter()
            .map(|u| display_width(u.trim()).max(1) as f64)
            .collect();
        let total: f64 = lengths.iter().sum();
        let span = end - start;
        let mut cursor = start;
        for (k, (unit, len)) in units[group.units.clone()].iter().zip(&lengths).enumerate() {
            let next = if k + 1 == lengths.len() { end } else { cursor + span * len / total };
            cues.push(Cue::raw(cursor, next, unit.trim()));
            cursor = next;
        }
    }

    /// Clamp cues starting before `min_start`; later cues move only to keep order
    fn enforce_min_start(&self, cues: &mut [Cue], min_start: f64) {
        let min_duration = self.config.min_cue_duration.max(0.001);
        let mut prev_start = f64::NEG_INFINITY;

        for cue in cues.iter_mut() {
            if cue.start < min_start {
                cue.start = min_start;
            } else if cue.start < prev_start {
                let delta = prev_start - cue.start;
                cue.start += delta;
                cue.end += delta;
            }
            if cue.end - cue.start < 1e-9 {
                cue.end = cue.start + min_duration;
            }
            prev_start = cue.start;
        }
    }
}
