/*!
 * Line breaking for Thai text.
 *
 * Thai has no spaces between words. Break points come from a segmenter when
 * one is available, otherwise from particle and punctuation heuristics, and
 * as a last resort from cell-count chunking. No break ever separates a
 * combining mark from its base consonant.
 */

use log::{debug, warn};

use crate::app_config::ShapingConfig;
use crate::language_utils::{display_width, is_thai_combining};

use super::segmenter::ThaiSegmenter;

/// Byte offsets where each display cell starts, followed by the text length
///
/// `starts[k]` is the offset of cell `k`, so splitting at `starts[k]` puts
/// exactly `k` cells before the break.
pub(crate) fn cell_starts(text: &str) -> Vec<usize> {
    let mut starts: Vec<usize> = text
        .char_indices()
        .filter(|(_, c)| !is_thai_combining(*c))
        .map(|(i, _)| i)
        .collect();
    if let Some(first) = starts.first_mut() {
        *first = 0;
    }
    starts.push(text.len());
    starts
}

/// Whether a byte offset is a legal break (inside the text, not before a mark)
fn is_cell_boundary(text: &str, offset: usize) -> bool {
    offset > 0
        && offset < text.len()
        && text.is_char_boundary(offset)
        && !text[offset..].chars().next().is_some_and(is_thai_combining)
}

fn is_break_punctuation(c: char) -> bool {
    c.is_whitespace() || matches!(c, ',' | '.' | '!' | '?' | ';' | ':' | ')' | ']' | '"' | '\u{0E2F}' | '\u{0E46}' | '\u{0E5A}' | '\u{0E5B}')
}

/// Byte spans of every particle occurrence
fn particle_spans(text: &str, config: &ShapingConfig) -> Vec<(usize, usize)> {
    config
        .thai_prefix_particles
        .iter()
        .chain(config.thai_suffix_particles.iter())
        .filter(|p| !p.is_empty())
        .flat_map(|p| text.match_indices(p.as_str()).map(|(i, m)| (i, i + m.len())))
        .collect()
}

/// Candidate break offsets from particles, spaces and punctuation, sorted and unique
pub(crate) fn heuristic_candidates(text: &str, config: &ShapingConfig) -> Vec<usize> {
    let mut candidates = Vec::new();

    for particle in config.thai_prefix_particles.iter().filter(|p| !p.is_empty()) {
        candidates.extend(text.match_indices(particle.as_str()).map(|(i, _)| i));
    }
    for particle in config.thai_suffix_particles.iter().filter(|p| !p.is_empty()) {
        candidates.extend(text.match_indices(particle.as_str()).map(|(i, m)| i + m.len()));
    }
    for (i, c) in text.char_indices() {
        if is_break_punctuation(c) {
            let after = i + c.len_utf8();
            // break after a run of punctuation, never inside it
            if !text[after..].chars().next().is_some_and(is_break_punctuation) {
                candidates.push(after);
            }
        }
    }

    candidates.retain(|&off| is_cell_boundary(text, off));
    candidates.sort_unstable();
    candidates.dedup();
    candidates
}

/// Cut text at the given sorted offsets, trimming lines and dropping empty ones
pub(crate) fn cut_at(text: &str, offsets: &[usize]) -> Vec<String> {
    let mut lines = Vec::with_capacity(offsets.len() + 1);
    let mut prev = 0;
    for &off in offsets.iter().chain(std::iter::once(&text.len())) {
        if off <= prev {
            continue;
        }
        let line = text[prev..off].trim();
        if !line.is_empty() {
            lines.push(line.to_string());
        }
        prev = off;
    }
    if lines.is_empty() {
        lines.push(text.trim().to_string());
    }
    lines
}

/// Choose `lines - 1` boundaries whose cell positions are closest to an even split
fn balanced_boundaries(text: &str, boundaries: &[usize], lines: usize) -> Vec<usize> {
    let total = display_width(text) as f64;
    let mut chosen: Vec<usize> = Vec::with_capacity(lines.saturating_sub(1));

    for k in 1..lines {
        let ideal = total * k as f64 / lines as f64;
        let prev = chosen.last().copied().unwrap_or(0);
        let best = boundaries
            .iter()
            .copied()
            .filter(|&b| b > prev)
            .min_by(|&a, &b| {
                let da = (display_width(&text[..a]) as f64 - ideal).abs();
                let db = (display_width(&text[..b]) as f64 - ideal).abs();
                da.total_cmp(&db).then(a.cmp(&b))
            });
        match best {
            Some(b) => chosen.push(b),
            None => break,
        }
    }
    chosen
}

/// Token boundaries produced by the segmenter, if it returned a usable segmentation
fn segmenter_boundaries(text: &str, segmenter: &dyn ThaiSegmenter) -> Option<Vec<usize>> {
    let tokens = segmenter.segment(text)?;
    if tokens.concat() != text {
        warn!(
            "Thai segmenter '{}' returned tokens that do not reproduce the input, using heuristics",
            segmenter.name()
        );
        return None;
    }

    let mut offset = 0;
    let mut boundaries = Vec::with_capacity(tokens.len());
    for token in &tokens {
        offset += token.len();
        if is_cell_boundary(text, offset) {
            boundaries.push(offset);
        }
    }
    Some(boundaries)
}

/// Move a chunk boundary out of any particle it bisects, by at most `nudge` cells
fn nudge_out_of_particles(text: &str, offset: usize, spans: &[(usize, usize)], nudge: usize) -> usize {
    let Some(&(start, end)) = spans.iter().find(|&&(s, e)| s < offset && offset < e) else {
        return offset;
    };

    let here = display_width(&text[..offset]);
    let back = here - display_width(&text[..start]);
    let forward = display_width(&text[..end]) - here;

    let mut options = Vec::new();
    if back <= nudge && is_cell_boundary(text, start) {
        options.push((back, start));
    }
    if forward <= nudge && is_cell_boundary(text, end) {
        options.push((forward, end));
    }
    options.sort();
    options.first().map(|&(_, off)| off).unwrap_or(offset)
}

/// Fixed cell-count chunking, nudged away from particles
pub(crate) fn chunk_boundaries(text: &str, lines: usize, config: &ShapingConfig) -> Vec<usize> {
    let starts = cell_starts(text);
    let cells = starts.len() - 1;
    if cells < 2 || lines < 2 {
        return Vec::new();
    }
    let lines = lines.min(cells);
    let spans = particle_spans(text, config);

    let mut offsets = Vec::with_capacity(lines - 1);
    for k in 1..lines {
        // remainder goes to the earlier lines
        let cell = k * (cells / lines) + k.min(cells % lines);
        let raw = starts[cell];
        let nudged = nudge_out_of_particles(text, raw, &spans, config.particle_nudge);
        let prev = offsets.last().copied().unwrap_or(0);
        let pick = if nudged > prev && is_cell_boundary(text, nudged) { nudged } else { raw };
        if pick > prev && is_cell_boundary(text, pick) {
            offsets.push(pick);
        }
    }
    offsets
}

/// Split Thai text into `lines` lines
pub(crate) fn split_thai(
    text: &str,
    lines: usize,
    config: &ShapingConfig,
    segmenter: &dyn ThaiSegmenter,
) -> Vec<String> {
    if lines < 2 {
        return vec![text.trim().to_string()];
    }

    if let Some(boundaries) = segmenter_boundaries(text, segmenter) {
        if boundaries.len() >= lines - 1 {
            debug!("Thai text split on {} segmenter boundaries", boundaries.len());
            return cut_at(text, &balanced_boundaries(text, &boundaries, lines));
        }
    }

    let candidates = heuristic_candidates(text, config);
    if candidates.len() >= lines - 1 {
        let count = candidates.len();
        let picked: Vec<usize> = (1..lines).map(|k| candidates[k * count / lines]).collect();
        debug!("Thai text split on {} of {} heuristic candidates", picked.len(), count);
        return cut_at(text, &picked);
    }

    debug!("Thai text split by cell chunking into {} lines", lines);
    cut_at(text, &chunk_boundaries(text, lines, config))
}

/// Break Thai text into wrapping units (segmenter tokens or heuristic pieces)
///
/// Each unit carries whether it was preceded by whitespace in the source.
pub(crate) fn wrap_units(text: &str, config: &ShapingConfig, segmenter: &dyn ThaiSegmenter) -> Vec<(String, bool)> {
    let mut units = Vec::new();
    for (i, piece) in text.split_whitespace().enumerate() {
        let boundaries = segmenter_boundaries(piece, segmenter)
            .unwrap_or_else(|| heuristic_candidates(piece, config));
        for (j, part) in cut_at(piece, &boundaries).into_iter().enumerate() {
            units.push((part, i > 0 && j == 0));
        }
    }
    units
}

/// Split a unit wider than `max_cells` into chunks of at most `max_cells` cells
pub(crate) fn chunk_unit(unit: &str, max_cells: usize) -> Vec<String> {
    let starts = cell_starts(unit);
    let cells = starts.len() - 1;
    if cells <= max_cells || max_cells == 0 {
        return vec![unit.to_string()];
    }
    let offsets: Vec<usize> = (1..cells.div_ceil(max_cells)).map(|k| starts[k * max_cells]).collect();
    cut_at(unit, &offsets)
}
