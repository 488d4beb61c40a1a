/*!
 * Tests for text shaping through the public API
 */

use std::sync::Arc;

use capforge::app_config::ShapingConfig;
use capforge::language_utils::{display_width, is_thai_combining};
use capforge::text_shaper::{DictionarySegmenter, TextShaper, WrapLimits};

fn dictionary_shaper() -> TextShaper {
    let segmenter = DictionarySegmenter::new(["สวัสดี", "ครับ", "วันนี้", "เรา", "จะ", "ทำ", "แกง", "เขียวหวาน"]);
    TextShaper::new(ShapingConfig::default(), Arc::new(segmenter))
}

#[test]
fn test_shape_thaiWithDictionary_shouldBreakOnWordBoundaries() {
    let shaper = dictionary_shaper();
    let text = "สวัสดีครับวันนี้เราจะทำแกงเขียวหวาน";
    let shaped = shaper.shape(text, 1080.0, 300.0, 60.0, "th");

    assert!(shaped.thai);
    assert!(shaped.lines.len() >= 2);
    assert_eq!(shaped.lines.concat(), text);
    let words = ["สวัสดี", "ครับ", "วันนี้", "เรา", "จะ", "ทำ", "แกง", "เขียวหวาน"];
    for line in &shaped.lines {
        assert!(words.iter().any(|w| line.starts_with(w)), "line {:?} starts mid-word", line);
    }
}

#[test]
fn test_shape_thai_shouldNeverStartLineWithCombiningMark() {
    let shaper = TextShaper::default();
    let text = "ที่นี่มีน้ำใจและรอยยิ้มให้ทุกคนที่มาเยี่ยมเยือนเสมอ";
    for width in [300.0, 600.0, 1080.0] {
        let lines = shaper.shape_lines(text, width, 400.0, 40.0, "th");
        assert_eq!(lines.concat(), text);
        for line in &lines {
            let first = line.chars().next().unwrap();
            assert!(!is_thai_combining(first), "line {:?} starts with a mark", line);
        }
    }
}

#[test]
fn test_segmenterName_reportsImplementation() {
    assert_eq!(TextShaper::default().segmenter_name(), "none");
    assert_ne!(dictionary_shaper().segmenter_name(), "none");
}

#[test]
fn test_fromConfig_withDictionaryFile_shouldLoadIt() {
    let dir = tempfile::TempDir::new().unwrap();
    let words = dir.path().join("words.txt");
    std::fs::write(&words, "สวัสดี\nครับ\n").unwrap();

    let config = ShapingConfig {
        thai_dictionary: Some(words),
        ..ShapingConfig::default()
    };
    let shaper = TextShaper::from_config(config).unwrap();
    assert_ne!(shaper.segmenter_name(), "none");

    let missing = ShapingConfig {
        thai_dictionary: Some(dir.path().join("absent.txt")),
        ..ShapingConfig::default()
    };
    assert!(TextShaper::from_config(missing).is_err());
}

#[test]
fn test_metrics_useConfiguredFactors() {
    let shaper = TextShaper::default();
    assert!((shaper.block_height_px(3, 50.0) - 180.0).abs() < 1e-9);
    assert!((shaper.estimate_width_px("abcd", 10.0, false) - 22.0).abs() < 1e-9);
    // combining marks take no cell
    assert_eq!(display_width("ที่"), 1);
    assert_eq!(shaper.max_lines(10.0, 50.0), 2);
    assert_eq!(shaper.max_lines(600.0, 50.0), 10);
}

#[test]
fn test_wrapLines_blankText_shouldBeEmpty() {
    let shaper = TextShaper::default();
    let limits = WrapLimits {
        max_chars: 20,
        max_words: 0,
        max_width_px: 1000.0,
        font_size: 40.0,
    };
    assert!(shaper.wrap_lines("   \n  ", &limits, "en").is_empty());
}

#[test]
fn test_wrapLines_narrowWidth_shouldRespectPixelBudget() {
    let shaper = TextShaper::default();
    let limits = WrapLimits {
        max_chars: 0,
        max_words: 0,
        max_width_px: 400.0,
        font_size: 40.0,
    };
    let lines = shaper.wrap_lines("a caption that is clearly too wide for a narrow frame", &limits, "en");
    let cap = shaper.chars_per_line(400.0, 40.0, false);
    assert!(lines.len() > 1);
    assert!(lines.iter().all(|l| display_width(l) <= cap));
}
