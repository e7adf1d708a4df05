use ginger::{Config, Environment};
use serde_json::json;

fn render_with(config: Config, source: &str) -> String {
    let env = Environment::new(config);
    env.from_string(source)
        .expect("template should parse")
        .render(&json!(null))
        .expect("template should render")
}

fn config(trim_blocks: bool, lstrip_blocks: bool, keep_trailing_newline: bool) -> Config {
    Config {
        trim_blocks,
        lstrip_blocks,
        keep_trailing_newline,
        ..Config::default()
    }
}

#[test]
#[ntest::timeout(1000)]
fn test_defaults_keep_whitespace() {
    let source = "  {% if true %}\n  yes\n  {% endif %}\n";
    assert_eq!(
        render_with(config(false, false, false), source),
        "  \n  yes\n  "
    );
}

#[test]
#[ntest::timeout(1000)]
fn test_trim_and_lstrip_blocks() {
    let source = "  {% if true %}\n  yes\n  {% endif %}\n";
    assert_eq!(render_with(config(true, true, false), source), "  yes\n");
}

#[test]
#[ntest::timeout(1000)]
fn test_trim_blocks_only() {
    let source = "{% if true %}\nx\n{% endif %}\n";
    assert_eq!(render_with(config(true, false, false), source), "x\n");
}

#[test]
#[ntest::timeout(1000)]
fn test_lstrip_blocks_only() {
    let source = "  {% if true %}\nx\n  {% endif %}";
    assert_eq!(render_with(config(false, true, false), source), "\nx\n");
}

#[test]
#[ntest::timeout(1000)]
fn test_lstrip_ignores_inline_tags() {
    // The tag is not alone on its line, so its indentation stays.
    let source = "v:  {% if true %}x{% endif %}";
    assert_eq!(render_with(config(false, true, false), source), "v:  x");
}

#[test]
#[ntest::timeout(1000)]
fn test_lstrip_plus_marker_disables_stripping() {
    let source = "  {%+ if true %}x{% endif %}";
    assert_eq!(render_with(config(false, true, false), source), "  x");
}

#[test]
#[ntest::timeout(1000)]
fn test_keep_trailing_newline() {
    assert_eq!(render_with(config(false, false, false), "a\n"), "a");
    assert_eq!(render_with(config(false, false, true), "a\n"), "a\n");
    // Only a single trailing newline is stripped.
    assert_eq!(render_with(config(false, false, false), "a\n\n"), "a\n");
}

#[test]
#[ntest::timeout(1000)]
fn test_explicit_minus_markers() {
    assert_eq!(
        render_with(config(false, false, false), "a {{- 'x' -}} b"),
        "axb"
    );
    assert_eq!(
        render_with(
            config(false, false, false),
            "a  {%- if true %} x {%- endif %}  b"
        ),
        "a x  b"
    );
}

#[test]
#[ntest::timeout(1000)]
fn test_minus_marker_on_comment() {
    assert_eq!(
        render_with(config(false, false, false), "a {#- note -#} b"),
        "ab"
    );
}

#[test]
#[ntest::timeout(1000)]
fn test_trim_blocks_after_comment() {
    let source = "{# note #}\nx";
    assert_eq!(render_with(config(true, false, false), source), "x");
    assert_eq!(render_with(config(false, false, false), source), "\nx");
}

#[test]
#[ntest::timeout(1000)]
fn test_trim_blocks_does_not_touch_variable_tags() {
    let source = "{{ 'a' }}\nx";
    assert_eq!(render_with(config(true, false, false), source), "a\nx");
}

#[test]
#[ntest::timeout(1000)]
fn test_loop_with_whitespace_control() {
    let source = "{% for i in range(3) -%}\n  {{ i }}\n{%- endfor %}";
    assert_eq!(render_with(config(false, false, false), source), "012");
}

#[test]
#[ntest::timeout(1000)]
fn test_newline_sequence() {
    let mut cfg = config(false, false, true);
    cfg.newline_sequence = "\r\n".to_string();
    assert_eq!(render_with(cfg, "a\nb\n"), "a\r\nb\r\n");
}
