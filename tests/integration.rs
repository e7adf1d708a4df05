use ginger::{Config, Environment};
use serde_json::json;

fn render(source: &str, data: serde_json::Value) -> String {
    let env = Environment::default();
    let tpl = env.from_string(source).expect("template should parse");
    tpl.render(&data).expect("template should render")
}

fn render_err(source: &str, data: serde_json::Value) -> String {
    let env = Environment::default();
    match env.from_string(source) {
        Ok(tpl) => tpl
            .render(&data)
            .expect_err("render should fail")
            .to_string(),
        Err(err) => err.to_string(),
    }
}

#[test]
#[ntest::timeout(1000)]
fn test_plain_text() {
    assert_eq!(render("hello world", json!(null)), "hello world");
    assert_eq!(render("", json!(null)), "");
}

#[test]
#[ntest::timeout(1000)]
fn test_variable_substitution() {
    assert_eq!(
        render("Hello, {{ name }}!", json!({"name": "World"})),
        "Hello, World!"
    );
}

#[test]
#[ntest::timeout(1000)]
fn test_missing_variable_renders_empty_by_default() {
    assert_eq!(render("[{{ nope }}]", json!(null)), "[]");
}

#[test]
#[ntest::timeout(1000)]
fn test_strict_undefined_errors() {
    let config = Config {
        strict_undefined: true,
        ..Config::default()
    };
    let env = Environment::new(config);
    let tpl = env.from_string("{{ nope }}").unwrap();
    let err = tpl.render(&json!(null)).unwrap_err().to_string();
    assert!(err.contains("Unable to evaluate name \"nope\""), "{}", err);
}

// --- Expressions and operators ---

#[test]
#[ntest::timeout(1000)]
fn test_arithmetic() {
    assert_eq!(render("{{ 1 + 2 * 3 }}", json!(null)), "7");
    assert_eq!(render("{{ 1/2 }}", json!(null)), "0.5");
    assert_eq!(render("{{ 1//2 }}", json!(null)), "0");
    assert_eq!(render("{{ 7 // 2 }}", json!(null)), "3");
    assert_eq!(render("{{ 5 % 3 }}", json!(null)), "2");
    assert_eq!(render("{{ 1.5 + 1 }}", json!(null)), "2.5");
}

#[test]
#[ntest::timeout(1000)]
fn test_unary_minus_binds_looser_than_power() {
    assert_eq!(render("{{ -2 ** 2 }}", json!(null)), "-4");
}

#[test]
#[ntest::timeout(1000)]
fn test_string_repeat_and_concat() {
    assert_eq!(render("{{ \"ab\" * 3 }}", json!(null)), "ababab");
    assert_eq!(render("{{ 'a' ~ 1 ~ 'b' }}", json!(null)), "a1b");
}

#[test]
#[ntest::timeout(1000)]
fn test_list_concatenation_preserves_order() {
    assert_eq!(
        render("{{ [1, 2] + [3] }}", json!(null)),
        "[1, 2, 3]"
    );
}

#[test]
#[ntest::timeout(1000)]
fn test_comparisons() {
    assert_eq!(render("{{ 1 == 1.0 }}", json!(null)), "True");
    assert_eq!(render("{{ 1 != 2 }}", json!(null)), "True");
    assert_eq!(render("{{ 2 > 1 and 1 <= 1 }}", json!(null)), "True");
    assert_eq!(render("{{ 'a' == 'a' }}", json!(null)), "True");
}

#[test]
#[ntest::timeout(1000)]
fn test_logic_short_circuits() {
    // The truthiness of the last evaluated side is the result.
    assert_eq!(render("{{ false and missing.x }}", json!(null)), "False");
    assert_eq!(render("{{ true or missing.x }}", json!(null)), "True");
    assert_eq!(render("{{ not '' }}", json!(null)), "True");
}

#[test]
#[ntest::timeout(1000)]
fn test_in_operator() {
    assert_eq!(render("{{ 2 in [1, 2] }}", json!(null)), "True");
    assert_eq!(render("{{ 'x' not in 'abc' }}", json!(null)), "True");
    assert_eq!(
        render("{{ 'k' in d }}", json!({"d": {"k": 1}})),
        "True"
    );
}

#[test]
#[ntest::timeout(1000)]
fn test_attribute_and_item_access_fall_back() {
    let data = json!({"user": {"name": "ada"}, "items": ["x", "y"]});
    assert_eq!(render("{{ user.name }}", data.clone()), "ada");
    assert_eq!(render("{{ user['name'] }}", data.clone()), "ada");
    assert_eq!(render("{{ items[1] }}", data.clone()), "y");
    assert_eq!(render("{{ items.0 }}", data), "x");
}

#[test]
#[ntest::timeout(1000)]
fn test_dict_literal_preserves_order() {
    assert_eq!(
        render("{{ {'b': 1, 'a': 2} }}", json!(null)),
        "{'b': 1, 'a': 2}"
    );
}

#[test]
#[ntest::timeout(1000)]
fn test_truthiness_matches_python() {
    assert_eq!(render("{{ 0 or 'x' }}", json!(null)), "True");
    assert_eq!(render("{{ [] and 1 }}", json!(null)), "False");
    assert_eq!(render("{{ {} and 1 }}", json!(null)), "False");
    assert_eq!(render("{{ none or false }}", json!(null)), "False");
}

// --- Filters ---

#[test]
#[ntest::timeout(1000)]
fn test_filter_chain_with_args() {
    assert_eq!(
        render(
            "{{ name | upper | replace(\"O\",\"0\") }}",
            json!({"name": "hello"})
        ),
        "HELL0"
    );
}

#[test]
#[ntest::timeout(1000)]
fn test_filters_bind_below_operators() {
    assert_eq!(render("{{ 'a' ~ 'b' | upper }}", json!(null)), "AB");
}

#[test]
#[ntest::timeout(1000)]
fn test_error_passthrough_and_default() {
    // Any filter after the failure sees the error and forwards it...
    let err = render_err("{{ 1 | unknownfilter | upper }}", json!(null));
    assert!(err.contains("unknownfilter"), "{}", err);
    // ...until default absorbs it.
    assert_eq!(
        render("{{ 1 | unknownfilter | default(2) }}", json!(null)),
        "2"
    );
    assert_eq!(render("{{ 1 | unknownfilter | try }}", json!(null)), "");
}

#[test]
#[ntest::timeout(1000)]
fn test_safe_escape_idempotence() {
    let data = json!({"x": "<a>"});
    assert_eq!(
        render("{{ x | safe | escape }}", data.clone()),
        render("{{ x | safe }}", data)
    );
}

#[test]
#[ntest::timeout(1000)]
fn test_tojson_fromjson_round_trip() {
    assert_eq!(
        render("{{ (x | tojson | fromjson) == x }}", json!({"x": [1, 2, 3]})),
        "True"
    );
    assert_eq!(
        render("{{ x | tojson }}", json!({"x": {"a": 1}})),
        "{\"a\":1}"
    );
}

// --- Tests (`is`) ---

#[test]
#[ntest::timeout(1000)]
fn test_is_tests() {
    assert_eq!(render("{{ 4 is even }}", json!(null)), "True");
    assert_eq!(render("{{ 4 is odd }}", json!(null)), "False");
    assert_eq!(render("{{ 9 is divisibleby 3 }}", json!(null)), "True");
    assert_eq!(render("{{ 9 is divisibleby(3) }}", json!(null)), "True");
    assert_eq!(render("{{ x is defined }}", json!({"x": 1})), "True");
    assert_eq!(render("{{ y is not defined }}", json!({"x": 1})), "True");
    assert_eq!(render("{{ 3 is == 3 }}", json!(null)), "True");
}

#[test]
#[ntest::timeout(1000)]
fn test_is_test_in_condition() {
    assert_eq!(
        render(
            "{% if user is mapping %}map{% else %}other{% endif %}",
            json!({"user": {"a": 1}})
        ),
        "map"
    );
}

// --- Statements ---

#[test]
#[ntest::timeout(1000)]
fn test_if_elif_else() {
    let tpl = "{% if n > 10 %}big{% elif n > 5 %}medium{% else %}small{% endif %}";
    assert_eq!(render(tpl, json!({"n": 20})), "big");
    assert_eq!(render(tpl, json!({"n": 7})), "medium");
    assert_eq!(render(tpl, json!({"n": 1})), "small");
}

#[test]
#[ntest::timeout(1000)]
fn test_for_with_loop_vars() {
    assert_eq!(
        render(
            "{% for x in xs %}{{ loop.index }}:{{ x }}{% if not loop.last %},{% endif %}{% endfor %}",
            json!({"xs": ["a", "b", "c"]})
        ),
        "1:a,2:b,3:c"
    );
}

#[test]
#[ntest::timeout(1000)]
fn test_for_loop_metadata() {
    assert_eq!(
        render(
            "{% for x in xs %}{{ loop.revindex }}{{ loop.first }}{{ loop.last }};{% endfor %}",
            json!({"xs": [10, 20]})
        ),
        "2TrueFalse;1FalseTrue;"
    );
    assert_eq!(
        render(
            "{% for x in xs %}{{ loop.previtem }}<{{ x }}>{{ loop.nextitem }} {% endfor %}",
            json!({"xs": [1, 2, 3]})
        ),
        "<1>2 1<2>3 2<3> "
    );
}

#[test]
#[ntest::timeout(1000)]
fn test_for_cycle_and_changed() {
    assert_eq!(
        render(
            "{% for x in xs %}{{ loop.cycle('odd', 'even') }} {% endfor %}",
            json!({"xs": [1, 2, 3]})
        ),
        "odd even odd "
    );
    assert_eq!(
        render(
            "{% for x in xs %}{{ loop.changed(x) }} {% endfor %}",
            json!({"xs": [1, 1, 2]})
        ),
        "True False True "
    );
}

#[test]
#[ntest::timeout(1000)]
fn test_for_if_filters_before_loop_metadata() {
    assert_eq!(
        render(
            "{% for x in xs if x > 1 %}{{ loop.length }}:{{ x }} {% endfor %}",
            json!({"xs": [1, 2, 3]})
        ),
        "2:2 2:3 "
    );
}

#[test]
#[ntest::timeout(1000)]
fn test_for_else_on_empty() {
    let tpl = "{% for x in xs %}{{ x }}{% else %}none{% endfor %}";
    assert_eq!(render(tpl, json!({"xs": []})), "none");
    assert_eq!(render(tpl, json!({"xs": [1]})), "1");
    // Filtered-to-empty also runs the else wrapper.
    assert_eq!(
        render(
            "{% for x in xs if x > 9 %}{{ x }}{% else %}none{% endfor %}",
            json!({"xs": [1, 2]})
        ),
        "none"
    );
    assert_eq!(
        render("{% for x in xs %}{{ x }}{% endfor %}", json!({"xs": []})),
        ""
    );
}

#[test]
#[ntest::timeout(1000)]
fn test_for_two_names_over_mapping() {
    assert_eq!(
        render(
            "{% for k, v in d %}{{ k }}={{ v }};{% endfor %}",
            json!({"d": {"b": 1, "a": 2}})
        ),
        "a=2;b=1;"
    );
}

#[test]
#[ntest::timeout(1000)]
fn test_for_two_names_unpacks_pairs() {
    assert_eq!(
        render(
            "{% for k, v in pairs %}{{ k }}>{{ v }};{% endfor %}",
            json!({"pairs": [["a", 1], ["b", 2]]})
        ),
        "a>1;b>2;"
    );
}

#[test]
#[ntest::timeout(1000)]
fn test_set_statement() {
    assert_eq!(render("{% set x = 1 + 2 %}{{ x }}", json!(null)), "3");
}

#[test]
#[ntest::timeout(1000)]
fn test_set_block_form_captures_output() {
    assert_eq!(
        render(
            "{% set greeting %}Hi {{ name }}{% endset %}{{ greeting }}!",
            json!({"name": "Ana"})
        ),
        "Hi Ana!"
    );
}

#[test]
#[ntest::timeout(1000)]
fn test_set_through_namespace() {
    assert_eq!(
        render(
            "{% set ns = namespace(x=1) %}{% set ns.y = 2 %}{{ ns.x }}{{ ns.y }}",
            json!(null)
        ),
        "12"
    );
}

#[test]
#[ntest::timeout(1000)]
fn test_with_scopes_bindings() {
    assert_eq!(
        render("{% with a=1, b=2 %}{{ a }}{{ b }}{% endwith %}[{{ a }}]", json!(null)),
        "12[]"
    );
}

#[test]
#[ntest::timeout(1000)]
fn test_filter_statement() {
    assert_eq!(
        render("{% filter upper %}abc {{ name }}{% endfilter %}", json!({"name": "x"})),
        "ABC X"
    );
    assert_eq!(
        render(
            "{% filter replace('a', 'b') | upper %}aaa{% endfilter %}",
            json!(null)
        ),
        "BBB"
    );
}

#[test]
#[ntest::timeout(1000)]
fn test_raw_statement() {
    assert_eq!(
        render("{% raw %}{{ not_a_var }} {% fake %}{% endraw %}", json!(null)),
        "{{ not_a_var }} {% fake %}"
    );
}

#[test]
#[ntest::timeout(1000)]
fn test_comment_statement_discards_body() {
    assert_eq!(
        render("a{% comment %}junk {{ ignored }}{% endcomment %}b", json!(null)),
        "ab"
    );
}

#[test]
#[ntest::timeout(1000)]
fn test_comment_tag() {
    assert_eq!(render("a{# hidden #}b", json!(null)), "ab");
}

#[test]
#[ntest::timeout(1000)]
fn test_autoescape_toggle() {
    assert_eq!(
        render(
            "{% autoescape true %}{{ x }}{% endautoescape %}|{% autoescape false %}{{ x }}{% endautoescape %}",
            json!({"x": "<b>"})
        ),
        "&lt;b&gt;|<b>"
    );
}

#[test]
#[ntest::timeout(1000)]
fn test_autoescape_respects_safe_flag() {
    assert_eq!(
        render(
            "{% autoescape true %}{{ x | safe }}{% endautoescape %}",
            json!({"x": "<a>"})
        ),
        "<a>"
    );
}

#[test]
#[ntest::timeout(1000)]
fn test_autoescape_environment_default() {
    let config = Config {
        autoescape: true,
        ..Config::default()
    };
    let env = Environment::new(config);
    let tpl = env.from_string("{{ x }}").unwrap();
    assert_eq!(tpl.render(&json!({"x": "a&b"})).unwrap(), "a&amp;b");
}

// --- Globals ---

#[test]
#[ntest::timeout(1000)]
fn test_range_global() {
    assert_eq!(render("{{ range(3) }}", json!(null)), "[0, 1, 2]");
    assert_eq!(render("{{ range(1, 4) }}", json!(null)), "[1, 2, 3]");
    assert_eq!(
        render("{% for i in range(3) %}{{ i }}{% endfor %}", json!(null)),
        "012"
    );
}

#[test]
#[ntest::timeout(1000)]
fn test_dict_global_is_ordered() {
    assert_eq!(
        render("{{ dict(b=1, a=2) }}", json!(null)),
        "{'b': 1, 'a': 2}"
    );
}

#[test]
#[ntest::timeout(1000)]
fn test_cycler_global() {
    assert_eq!(
        render(
            "{% set c = cycler('a', 'b') %}{{ c.next() }}{{ c.next() }}{{ c.next() }}",
            json!(null)
        ),
        "aba"
    );
}

#[test]
#[ntest::timeout(1000)]
fn test_joiner_global() {
    assert_eq!(
        render(
            "{% set j = joiner(sep='|') %}{% for x in xs %}{{ j() }}{{ x }}{% endfor %}",
            json!({"xs": [1, 2, 3]})
        ),
        "1|2|3"
    );
}

#[test]
#[ntest::timeout(1000)]
fn test_mapping_methods() {
    let data = json!({"d": {"b": 1, "a": 2}});
    assert_eq!(render("{{ d.keys() }}", data.clone()), "['a', 'b']");
    assert_eq!(render("{{ d.values() }}", data.clone()), "[2, 1]");
    assert_eq!(render("{{ d.get('b') }}", data.clone()), "1");
    assert_eq!(render("{{ d.get('z', default=9) }}", data), "9");
}

// --- Determinism ---

#[test]
#[ntest::timeout(1000)]
fn test_render_is_deterministic() {
    let source = "{% for k, v in d %}{{ k }}{{ v }}{% endfor %}{{ d }}";
    let data = json!({"d": {"x": 1, "Y": 2, "z": 3}});
    assert_eq!(render(source, data.clone()), render(source, data));
}

#[test]
#[ntest::timeout(1000)]
fn test_concurrent_renders_share_template() {
    let env = Environment::default();
    let tpl = std::sync::Arc::new(
        env.from_string("{% for i in range(50) %}{{ i }},{% endfor %}")
            .unwrap(),
    );
    let expected = tpl.render(&json!(null)).unwrap();
    let mut handles = Vec::new();
    for _ in 0..4 {
        let tpl = std::sync::Arc::clone(&tpl);
        let expected = expected.clone();
        handles.push(std::thread::spawn(move || {
            for _ in 0..20 {
                assert_eq!(tpl.render(&json!(null)).unwrap(), expected);
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }
}

// --- Error reporting ---

#[test]
#[ntest::timeout(1000)]
fn test_parse_error_carries_position() {
    let env = Environment::default();
    let err = env.from_string("line one\n{{ bad ! }}").unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("Line: 2"), "{}", msg);
}

#[test]
#[ntest::timeout(1000)]
fn test_unknown_statement_reports_name() {
    let err = render_err("{% frobnicate %}", json!(null));
    assert!(err.contains("Statement 'frobnicate' not found"), "{}", err);
}

#[test]
#[ntest::timeout(1000)]
fn test_calling_non_callable_fails() {
    let err = render_err("{{ x() }}", json!({"x": 1}));
    assert!(err.contains("not callable"), "{}", err);
}

#[test]
#[ntest::timeout(1000)]
fn test_macro_arity_error() {
    let err = render_err(
        "{% macro m(a, b) %}{{ a }}{{ b }}{% endmacro %}{{ m(1) }}",
        json!(null),
    );
    assert!(err.contains("Expected 2 arguments, got 1"), "{}", err);
}
