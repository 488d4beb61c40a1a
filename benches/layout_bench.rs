/*!
 * Benchmarks for caption layout.
 *
 * Measures performance of:
 * - Latin and Thai line shaping
 * - Script alignment against transcript segments
 * - Cue composition into ASS tracks and drawtext filters
 */

use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use capforge::CancellationToken;
use capforge::alignment::ScriptAligner;
use capforge::app_config::{ComposerConfig, OutputMode, ShapingConfig};
use capforge::composer::{ComposeOptions, SubtitleComposer, VideoGeometry};
use capforge::style::base_style;
use capforge::subtitle_processor::{Cue, TranscriptSegment};
use capforge::text_shaper::{DictionarySegmenter, TextShaper};

const LATIN_SENTENCE: &str = "today we are going to cook a very simple green curry at home";
const THAI_SENTENCE: &str = "วันนี้เราจะทำแกงเขียวหวานไก่แบบง่ายๆที่บ้าน";

fn thai_shaper() -> TextShaper {
    let words = ["วันนี้", "เรา", "จะ", "ทำ", "แกง", "เขียวหวาน", "ไก่", "แบบ", "ง่ายๆ", "ที่", "บ้าน"];
    TextShaper::new(ShapingConfig::default(), Arc::new(DictionarySegmenter::new(words)))
}

/// Generate transcript segments and the matching script
fn generate_transcript(count: usize) -> (Vec<TranscriptSegment>, String) {
    let segments: Vec<TranscriptSegment> = (0..count)
        .map(|i| {
            let start = i as f64 * 2.5;
            TranscriptSegment::new(start, start + 2.0, format!("line {} {}", i, LATIN_SENTENCE))
        })
        .collect();
    let script = segments
        .iter()
        .map(|s| format!("{}.", s.text))
        .collect::<Vec<_>>()
        .join("\n");
    (segments, script)
}

fn generate_cues(count: usize) -> Vec<Cue> {
    (0..count)
        .map(|i| {
            let start = i as f64 * 3.0;
            Cue::raw(start, start + 2.5, format!("{} {}", i, LATIN_SENTENCE))
        })
        .collect()
}

fn bench_shaping(c: &mut Criterion) {
    let mut group = c.benchmark_group("shaping");
    let latin = TextShaper::default();
    let thai = thai_shaper();

    group.bench_function("latin", |b| {
        b.iter(|| latin.shape(black_box(LATIN_SENTENCE), 1080.0, 400.0, 48.0, "en"))
    });
    group.bench_function("thai", |b| {
        b.iter(|| thai.shape(black_box(THAI_SENTENCE), 1080.0, 400.0, 48.0, "th"))
    });
    group.finish();
}

fn bench_alignment(c: &mut Criterion) {
    let mut group = c.benchmark_group("alignment");
    let aligner = ScriptAligner::default();

    for count in [10, 50, 200] {
        let (segments, script) = generate_transcript(count);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _| {
            b.iter(|| aligner.align(black_box(&segments), black_box(&script), 0.0))
        });
    }
    group.finish();
}

fn bench_composition(c: &mut Criterion) {
    let mut group = c.benchmark_group("composition");
    let composer = SubtitleComposer::new(TextShaper::default(), ComposerConfig::default());
    let style = base_style();
    let geometry = VideoGeometry::unpadded(1080, 1920);
    let token = CancellationToken::new();
    let cues = generate_cues(100);

    for mode in [OutputMode::Track, OutputMode::BurnIn] {
        let options = ComposeOptions {
            mode,
            ..Default::default()
        };
        group.bench_function(format!("{:?}", mode), |b| {
            b.iter(|| composer.compose(black_box(&cues), &style, &geometry, &options, &token))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_shaping, bench_alignment, bench_composition);
criterion_main!(benches);
