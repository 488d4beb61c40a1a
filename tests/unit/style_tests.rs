/*!
 * Tests for style presets and overrides
 */

use capforge::errors::ConfigError;
use capforge::style::{AssColor, DEFAULT_PRESET, HorizontalAlign, Position, StyleOverrides, StyleResolver, THAI_FONT};

#[test]
fn test_resolve_emptyPreset_shouldUseDefault() {
    let resolver = StyleResolver::default();
    let style = resolver.resolve("", &StyleOverrides::default()).unwrap();
    let default = resolver.resolve(DEFAULT_PRESET, &StyleOverrides::default()).unwrap();
    assert_eq!(style, default);
    assert_eq!(style.language, "auto");
}

#[test]
fn test_resolve_builtinPresets_shouldAllExist() {
    let resolver = StyleResolver::default();
    for name in ["classic", "modern", "premium", "minimal", "MODERN"] {
        assert!(resolver.resolve(name, &StyleOverrides::default()).is_ok(), "preset {}", name);
    }
    assert_eq!(
        resolver.resolve("neon", &StyleOverrides::default()),
        Err(ConfigError::UnknownPreset("neon".to_string()))
    );
}

#[test]
fn test_resolve_thaiLanguage_shouldSwitchFontAndLimits() {
    let resolver = StyleResolver::default();
    let overrides = StyleOverrides {
        language: Some("th".to_string()),
        font_size: None,
        ..Default::default()
    };
    let style = resolver.resolve("classic", &overrides).unwrap();
    assert_eq!(style.font_name, THAI_FONT);
    assert!(style.is_thai());
    assert!(style.max_words_per_line <= 4);
}

#[test]
fn test_resolve_explicitOverridesBeatLanguageDefaults() {
    let resolver = StyleResolver::default();
    let overrides = StyleOverrides {
        language: Some("th".to_string()),
        font_name: Some("Noto Sans Thai".to_string()),
        font_size: Some(64),
        line_color: Some("#ff0000".to_string()),
        ..Default::default()
    };
    let style = resolver.resolve("modern", &overrides).unwrap();
    assert_eq!(style.font_name, "Noto Sans Thai");
    assert_eq!(style.font_size, 64);
    assert_eq!(style.line_color, AssColor::rgb(0xFF, 0, 0));
}

#[test]
fn test_resolve_invalidColor_shouldFail() {
    let resolver = StyleResolver::default();
    let overrides = StyleOverrides {
        outline_color: Some("not-a-colour".to_string()),
        ..Default::default()
    };
    assert!(matches!(
        resolver.resolve("classic", &overrides),
        Err(ConfigError::InvalidColor { .. })
    ));
}

#[test]
fn test_anCode_followsPositionAndAlignment() {
    let resolver = StyleResolver::default();
    let mut style = resolver.resolve("classic", &StyleOverrides::default()).unwrap();
    assert_eq!((style.position, style.alignment), (Position::Bottom, HorizontalAlign::Center));
    assert_eq!(style.an_code(), 2);

    style.position = Position::Top;
    style.alignment = HorizontalAlign::Left;
    assert_eq!(style.an_code(), 7);
}

#[test]
fn test_overrides_deserializeFromJson() {
    let overrides: StyleOverrides =
        serde_json::from_str(r#"{"font_size": 40, "position": "top", "all_caps": true}"#).unwrap();
    assert_eq!(overrides.font_size, Some(40));
    assert_eq!(overrides.position.as_deref(), Some("top"));
    assert_eq!(overrides.all_caps, Some(true));
    assert!(overrides.font_name.is_none());
}
