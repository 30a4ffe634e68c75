use text_overlay_rust::layout::wrap_words;
use text_overlay_rust::preset::detect_preset;
use text_overlay_rust::translit::transliterate;

#[test]
fn estimated_wrap_snapshot() {
    let lines = wrap_words(
        "The quick brown fox jumps over the lazy dog",
        125.0,
        20.0,
        None,
    );
    insta::assert_debug_snapshot!(lines, @r###"
    [
        "The quick",
        "brown fox",
        "jumps over",
        "the lazy dog",
    ]
    "###);
}

#[test]
fn preset_table_snapshot() {
    let presets = vec![
        detect_preset(600, 600),
        detect_preset(1080, 1350),
        detect_preset(1920, 1080),
    ];
    insta::assert_json_snapshot!(presets, @r###"
    [
      {
        "name": "square_small",
        "default_font_size": 28,
        "max_text_width": 540,
        "default_position": {
          "x": 50.0,
          "y": 85.0
        },
        "padding": 20
      },
      {
        "name": "instagram_portrait",
        "default_font_size": 48,
        "max_text_width": 972,
        "default_position": {
          "x": 50.0,
          "y": 88.0
        },
        "padding": 35
      },
      {
        "name": "custom_1920x1080",
        "default_font_size": 57,
        "max_text_width": 1728,
        "default_position": {
          "x": 50.0,
          "y": 80.0
        },
        "padding": 32
      }
    ]
    "###);
}

#[test]
fn transliteration_snapshot() {
    insta::assert_snapshot!(
        transliterate("Привет, мир! Щука и Юля"),
        @"Privet, mir! Shchuka i Yulya"
    );
}
