use std::sync::Arc;

use ginger::{Config, Environment, MemoryLoader};
use serde_json::json;

fn env_with(templates: &[(&str, &str)]) -> Environment {
    let mut loader = MemoryLoader::new();
    for (name, source) in templates {
        loader.add_template(*name, *source);
    }
    Environment::with_loader(Config::default(), Arc::new(loader))
}

fn render_named(env: &Environment, name: &str, data: serde_json::Value) -> String {
    env.from_file(name)
        .expect("template should parse")
        .render(&data)
        .expect("template should render")
}

#[test]
#[ntest::timeout(1000)]
fn test_extends_with_super() {
    let env = env_with(&[
        ("base.tpl", "<{% block body %}base{% endblock %}>"),
        (
            "child.tpl",
            "{% extends \"base.tpl\" %}{% block body %}child-{{ super() }}{% endblock %}",
        ),
    ]);
    assert_eq!(render_named(&env, "child.tpl", json!(null)), "<child-base>");
}

#[test]
#[ntest::timeout(1000)]
fn test_override_without_super() {
    let env = env_with(&[
        ("base.tpl", "[{% block a %}A{% endblock %}|{% block b %}B{% endblock %}]"),
        (
            "child.tpl",
            "{% extends \"base.tpl\" %}{% block b %}beta{% endblock %}",
        ),
    ]);
    assert_eq!(render_named(&env, "child.tpl", json!(null)), "[A|beta]");
}

#[test]
#[ntest::timeout(1000)]
fn test_three_level_super_chain() {
    let env = env_with(&[
        ("a.tpl", "{% block b %}A{% endblock %}"),
        (
            "mid.tpl",
            "{% extends \"a.tpl\" %}{% block b %}M({{ super() }}){% endblock %}",
        ),
        (
            "leaf.tpl",
            "{% extends \"mid.tpl\" %}{% block b %}L({{ super() }}){% endblock %}",
        ),
    ]);
    // Each super() call descends exactly one level.
    assert_eq!(render_named(&env, "leaf.tpl", json!(null)), "L(M(A))");
}

#[test]
#[ntest::timeout(1000)]
fn test_parent_structure_drives_rendering() {
    let env = env_with(&[
        ("base.tpl", "head|{% block main %}default{% endblock %}|tail"),
        (
            "child.tpl",
            "ignored {% extends \"base.tpl\" %}{% block main %}mine{% endblock %} ignored",
        ),
    ]);
    // Content outside blocks in the child is dropped; the ancestor
    // provides the structure.
    assert_eq!(render_named(&env, "child.tpl", json!(null)), "head|mine|tail");
}

#[test]
#[ntest::timeout(1000)]
fn test_self_renders_blocks() {
    let env = env_with(&[(
        "page.tpl",
        "{% block title %}T{% endblock %}:{{ self.title() }}",
    )]);
    assert_eq!(render_named(&env, "page.tpl", json!(null)), "T:T");
}

#[test]
#[ntest::timeout(1000)]
fn test_extends_must_be_at_root() {
    let env = env_with(&[
        ("base.tpl", "x"),
        (
            "bad.tpl",
            "{% if true %}{% extends \"base.tpl\" %}{% endif %}",
        ),
    ]);
    let err = env.from_file("bad.tpl").unwrap_err().to_string();
    assert!(err.contains("root level"), "{}", err);
}

#[test]
#[ntest::timeout(1000)]
fn test_double_extends_rejected() {
    let env = env_with(&[
        ("base.tpl", "x"),
        (
            "bad.tpl",
            "{% extends \"base.tpl\" %}{% extends \"base.tpl\" %}",
        ),
    ]);
    let err = env.from_file("bad.tpl").unwrap_err().to_string();
    assert!(err.contains("already one parent"), "{}", err);
}

#[test]
#[ntest::timeout(1000)]
fn test_include_shares_context() {
    let env = env_with(&[
        ("inc.tpl", "[{{ n }}]"),
        ("main.tpl", "a{% include \"inc.tpl\" %}b"),
    ]);
    assert_eq!(render_named(&env, "main.tpl", json!({"n": 5})), "a[5]b");
}

#[test]
#[ntest::timeout(1000)]
fn test_include_dynamic_path() {
    let env = env_with(&[
        ("inc.tpl", "dyn"),
        ("main.tpl", "{% include which %}"),
    ]);
    assert_eq!(
        render_named(&env, "main.tpl", json!({"which": "inc.tpl"})),
        "dyn"
    );
}

#[test]
#[ntest::timeout(1000)]
fn test_include_ignore_missing() {
    let env = env_with(&[("main.tpl", "a{% include \"nope.tpl\" ignore missing %}b")]);
    assert_eq!(render_named(&env, "main.tpl", json!(null)), "ab");
}

#[test]
#[ntest::timeout(1000)]
fn test_include_missing_without_flag_fails() {
    let env = env_with(&[("main.tpl", "{% include \"nope.tpl\" %}")]);
    let err = env.from_file("main.tpl").unwrap_err().to_string();
    assert!(err.contains("nope.tpl"), "{}", err);
}

#[test]
#[ntest::timeout(1000)]
fn test_macro_with_defaults_and_kwargs() {
    let env = env_with(&[(
        "main.tpl",
        "{% macro greet(n, g=\"Hello\") %}{{ g }}, {{ n }}!{% endmacro %}{{ greet(\"X\") }} {{ greet(\"Y\", g=\"Hi\") }}",
    )]);
    assert_eq!(
        render_named(&env, "main.tpl", json!(null)),
        "Hello, X! Hi, Y!"
    );
}

#[test]
#[ntest::timeout(1000)]
fn test_macro_output_is_safe() {
    let mut config = Config::default();
    config.autoescape = true;
    let mut loader = MemoryLoader::new();
    loader.add_template(
        "main.tpl",
        "{% macro tag(t) %}<{{ t }}>{% endmacro %}{{ tag('b&w') }}",
    );
    let env = Environment::with_loader(config, Arc::new(loader));
    // The macro body escapes its interpolations; the assembled result is
    // marked safe and passes through untouched.
    assert_eq!(
        render_named(&env, "main.tpl", json!(null)),
        "<b&amp;w>"
    );
}

#[test]
#[ntest::timeout(1000)]
fn test_import_exposes_macro_table() {
    let env = env_with(&[
        (
            "macros.tpl",
            "{% macro greet(n) %}hey {{ n }}{% endmacro %}{% macro bye(n) %}bye {{ n }}{% endmacro %}",
        ),
        (
            "main.tpl",
            "{% import \"macros.tpl\" as helpers %}{{ helpers.greet('X') }}/{{ helpers.bye('Y') }}",
        ),
    ]);
    assert_eq!(
        render_named(&env, "main.tpl", json!(null)),
        "hey X/bye Y"
    );
}

#[test]
#[ntest::timeout(1000)]
fn test_from_import_with_alias() {
    let env = env_with(&[
        ("macros.tpl", "{% macro greet(n) %}hey {{ n }}{% endmacro %}"),
        (
            "main.tpl",
            "{% from \"macros.tpl\" import greet as hello %}{{ hello('X') }}",
        ),
    ]);
    assert_eq!(render_named(&env, "main.tpl", json!(null)), "hey X");
}

#[test]
#[ntest::timeout(1000)]
fn test_from_import_missing_macro_fails_at_call() {
    let env = env_with(&[
        ("macros.tpl", "{% macro greet(n) %}hey{% endmacro %}"),
        (
            "main.tpl",
            "{% from \"macros.tpl\" import nope %}ok{{ nope() }}",
        ),
    ]);
    let tpl = env.from_file("main.tpl").unwrap();
    let err = tpl.render(&json!(null)).unwrap_err().to_string();
    assert!(err.contains("Macro 'nope' not found"), "{}", err);
}

#[test]
#[ntest::timeout(1000)]
fn test_blocks_render_standalone() {
    // A block in a template without extends renders its own body.
    let env = env_with(&[("solo.tpl", "-{% block b %}body{% endblock %}-")]);
    assert_eq!(render_named(&env, "solo.tpl", json!(null)), "-body-");
}

#[test]
#[ntest::timeout(1000)]
fn test_block_sees_loop_variables() {
    let env = env_with(&[(
        "solo.tpl",
        "{% for i in range(2) %}{% block cell %}({{ i }}){% endblock %}{% endfor %}",
    )]);
    assert_eq!(render_named(&env, "solo.tpl", json!(null)), "(0)(1)");
}
