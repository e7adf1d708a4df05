//! The built-in filter set.
//!
//! Every filter starts by passing error inputs through untouched; only
//! `default` and `try` absorb them. Signature validation goes through
//! [`VarArgs::expect`], so arity mistakes surface as error values with the
//! filter's name attached.

use std::sync::OnceLock;

use rand::Rng;
use regex::Regex;

use crate::eval::{Evaluator, FilterSet};
use crate::value::{compare_values, Dict, Value};
use crate::varargs::{kwarg, KwArg, VarArgs};

macro_rules! pass_errors {
    ($in:ident) => {
        if $in.is_error() {
            return $in.clone();
        }
    };
}

/// Wraps a signature validation failure with the filter name.
fn signature_error(name: &str, err: String) -> Value {
    Value::error(format!("Wrong signature for '{}': {}", name, err))
}

/// The full built-in filter set.
pub fn default_filters() -> FilterSet {
    let mut set = FilterSet::new();
    let entries: &[(&str, crate::eval::FilterFunction)] = &[
        ("abs", filter_abs),
        ("attr", filter_attr),
        ("batch", filter_batch),
        ("bool", filter_bool),
        ("capitalize", filter_capitalize),
        ("center", filter_center),
        ("concat", filter_concat),
        ("d", filter_default),
        ("default", filter_default),
        ("dictsort", filter_dictsort),
        ("e", filter_escape),
        ("escape", filter_escape),
        ("first", filter_first),
        ("float", filter_float),
        ("forceescape", filter_forceescape),
        ("fromjson", filter_fromjson),
        ("groupby", filter_groupby),
        ("ifelse", filter_ifelse),
        ("indent", filter_indent),
        ("int", filter_int),
        ("join", filter_join),
        ("keys", filter_keys),
        ("last", filter_last),
        ("length", filter_length),
        ("list", filter_list),
        ("lower", filter_lower),
        ("map", filter_map),
        ("max", filter_max),
        ("min", filter_min),
        ("random", filter_random),
        ("reject", filter_reject),
        ("rejectattr", filter_rejectattr),
        ("replace", filter_replace),
        ("reverse", filter_reverse),
        ("round", filter_round),
        ("safe", filter_safe),
        ("select", filter_select),
        ("selectattr", filter_selectattr),
        ("slice", filter_slice),
        ("sort", filter_sort),
        ("split", filter_split),
        ("string", filter_string),
        ("striptags", filter_striptags),
        ("sum", filter_sum),
        ("title", filter_title),
        ("tojson", filter_tojson),
        ("trim", filter_trim),
        ("truncate", filter_truncate),
        ("try", filter_try),
        ("unique", filter_unique),
        ("upper", filter_upper),
        ("urlencode", filter_urlencode),
        ("values", filter_values),
        ("wordcount", filter_wordcount),
        ("wordwrap", filter_wordwrap),
    ];
    for (name, f) in entries {
        // The set starts empty, so registration cannot collide.
        let _ = set.register(name, *f);
    }
    set
}

fn filter_abs(_e: &Evaluator<'_>, input: &Value, params: &VarArgs) -> Value {
    pass_errors!(input);
    if let Err(err) = params.expect_nothing() {
        return signature_error("abs", err);
    }
    if input.is_integer() {
        Value::from(input.as_integer().abs())
    } else {
        Value::from(input.as_float().abs())
    }
}

fn filter_attr(_e: &Evaluator<'_>, input: &Value, params: &VarArgs) -> Value {
    pass_errors!(input);
    let p = match params.expect_args(1) {
        Ok(p) => p,
        Err(err) => return signature_error("attr", err),
    };
    let (value, _) = input.get(&p.first().to_string());
    value
}

fn filter_batch(_e: &Evaluator<'_>, input: &Value, params: &VarArgs) -> Value {
    pass_errors!(input);
    let p = match params.expect(1, &[KwArg::new("fill_with", Value::none())]) {
        Ok(p) => p,
        Err(err) => return signature_error("batch", err),
    };
    let size = p.first().as_integer().max(1) as usize;
    let mut out: Vec<Value> = Vec::new();
    let mut row: Vec<Value> = Vec::new();
    input.iterate(
        |_, _, item, _| {
            if row.len() == size {
                out.push(Value::from_list(std::mem::take(&mut row)));
            }
            row.push(item.clone());
            true
        },
        || {},
    );
    if !row.is_empty() {
        let fill_with = p.get_kwarg("fill_with", Value::none());
        if !fill_with.is_nil() {
            while row.len() < size {
                row.push(fill_with.clone());
            }
        }
        out.push(Value::from_list(row));
    }
    Value::from_list(out)
}

fn filter_bool(_e: &Evaluator<'_>, input: &Value, params: &VarArgs) -> Value {
    pass_errors!(input);
    if let Err(err) = params.expect_nothing() {
        return signature_error("bool", err);
    }
    if input.is_bool() {
        return Value::from(input.as_bool());
    }
    if input.is_string() {
        let lowered = input.to_string().to_lowercase();
        return match lowered.as_str() {
            "true" | "yes" | "on" | "1" => Value::from(true),
            "false" | "no" | "off" | "0" | "" => Value::from(false),
            _ => Value::error(format!(
                "\"{}\" can not be cast to boolean",
                input
            )),
        };
    }
    if input.is_integer() {
        return match input.as_integer() {
            1 => Value::from(true),
            0 => Value::from(false),
            other => Value::error(format!("{} can not be cast to boolean as it's not in [0,1]", other)),
        };
    }
    if input.is_float() {
        let f = input.as_float();
        if f == 1.0 {
            return Value::from(true);
        }
        if f == 0.0 {
            return Value::from(false);
        }
        return Value::error(format!(
            "{} can not be cast to boolean as it's not in [0.0,1.0]",
            f
        ));
    }
    if input.is_nil() {
        return Value::from(false);
    }
    Value::error(format!("filter 'bool' failed to cast: {}", input))
}

fn filter_capitalize(_e: &Evaluator<'_>, input: &Value, params: &VarArgs) -> Value {
    pass_errors!(input);
    if let Err(err) = params.expect_nothing() {
        return signature_error("capitalize", err);
    }
    let text = input.to_string();
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => Value::from(
            first.to_uppercase().collect::<String>() + chars.as_str().to_lowercase().as_str(),
        ),
        None => Value::from(""),
    }
}

fn filter_center(_e: &Evaluator<'_>, input: &Value, params: &VarArgs) -> Value {
    pass_errors!(input);
    let p = match params.expect_args(1) {
        Ok(p) => p,
        Err(err) => return signature_error("center", err),
    };
    let width = p.first().as_integer().max(0) as usize;
    let len = input.len();
    if width <= len {
        return input.clone();
    }
    let spaces = width - len;
    let left = spaces / 2 + spaces % 2;
    let right = spaces / 2;
    Value::from(format!(
        "{}{}{}",
        " ".repeat(left),
        input,
        " ".repeat(right)
    ))
}

fn filter_concat(_e: &Evaluator<'_>, input: &Value, params: &VarArgs) -> Value {
    pass_errors!(input);
    if !input.is_list() {
        return Value::error("Filter 'concat' was passed a non-list type");
    }
    let mut out = Vec::new();
    input.iterate(
        |_, _, item, _| {
            out.push(item.clone());
            true
        },
        || {},
    );
    for (idx, argument) in params.args.iter().enumerate() {
        if !argument.is_list() {
            return Value::error(format!(
                "argument {} passed to filter 'concat' is not a list: {}",
                idx + 1,
                argument
            ));
        }
        argument.iterate(
            |_, _, item, _| {
                out.push(item.clone());
                true
            },
            || {},
        );
    }
    Value::from_list(out)
}

fn filter_default(_e: &Evaluator<'_>, input: &Value, params: &VarArgs) -> Value {
    let p = match params.expect_args(1) {
        Ok(p) => p,
        Err(err) => return signature_error("default", err),
    };
    if input.is_error() || input.is_nil() || (input.is_bool() && !input.is_true()) {
        return p.first();
    }
    input.clone()
}

fn filter_dictsort(_e: &Evaluator<'_>, input: &Value, params: &VarArgs) -> Value {
    pass_errors!(input);
    let p = match params.expect(
        0,
        &[
            kwarg("case_sensitive", false),
            kwarg("by", "key"),
            kwarg("reverse", false),
        ],
    ) {
        Ok(p) => p,
        Err(err) => return signature_error("dictsort", err),
    };
    let case_sensitive = p.kwargs["case_sensitive"].is_true();
    let by = p.kwargs["by"].to_string();
    let reverse = p.kwargs["reverse"].is_true();

    let mut pairs = input.items();
    match by.as_str() {
        "key" => pairs.sort_by(|a, b| compare_values(&a.key, &b.key, case_sensitive)),
        "value" => pairs.sort_by(|a, b| compare_values(&a.value, &b.value, case_sensitive)),
        _ => return Value::error("by should be either 'key' or 'value'"),
    }
    if reverse {
        pairs.reverse();
    }
    Value::from_dict(Dict { pairs })
}

fn filter_escape(_e: &Evaluator<'_>, input: &Value, params: &VarArgs) -> Value {
    pass_errors!(input);
    if let Err(err) = params.expect_nothing() {
        return signature_error("escape", err);
    }
    if input.safe {
        return input.clone();
    }
    Value::safe(Value::from(input.escaped()))
}

fn filter_first(_e: &Evaluator<'_>, input: &Value, params: &VarArgs) -> Value {
    pass_errors!(input);
    if let Err(err) = params.expect_nothing() {
        return signature_error("first", err);
    }
    if input.can_slice() && input.len() > 0 {
        return input.index(0);
    }
    Value::from("")
}

fn filter_float(_e: &Evaluator<'_>, input: &Value, params: &VarArgs) -> Value {
    pass_errors!(input);
    if let Err(err) = params.expect_nothing() {
        return signature_error("float", err);
    }
    Value::from(input.as_float())
}

fn filter_forceescape(_e: &Evaluator<'_>, input: &Value, params: &VarArgs) -> Value {
    pass_errors!(input);
    if let Err(err) = params.expect_nothing() {
        return signature_error("forceescape", err);
    }
    Value::safe(Value::from(input.escaped()))
}

fn filter_fromjson(_e: &Evaluator<'_>, input: &Value, params: &VarArgs) -> Value {
    pass_errors!(input);
    if let Err(err) = params.expect_nothing() {
        return signature_error("fromjson", err);
    }
    if !input.is_string() || input.is_empty() {
        return Value::error("Filter 'fromjson' was passed an empty or non-string type");
    }
    match serde_json::from_str::<serde_json::Value>(&input.to_string()) {
        Ok(parsed) => Value::from(parsed),
        Err(err) => Value::error(format!("failed to unmarshal {}: {}", input, err)),
    }
}

fn filter_groupby(_e: &Evaluator<'_>, input: &Value, params: &VarArgs) -> Value {
    pass_errors!(input);
    let p = match params.expect_args(1) {
        Ok(p) => p,
        Err(err) => return signature_error("groupby", err),
    };
    let field = p.first().to_string();
    let mut groups: Vec<(Value, Vec<Value>)> = Vec::new();
    input.iterate(
        |_, _, item, _| {
            let (attr, found) = item.get(&field);
            if !found {
                return true;
            }
            match groups.iter_mut().find(|(g, _)| g.equal_value_to(&attr)) {
                Some((_, members)) => members.push(item.clone()),
                None => groups.push((attr, vec![item.clone()])),
            }
            true
        },
        || {},
    );
    let out = groups
        .into_iter()
        .map(|(grouper, list)| {
            let mut entry = indexmap::IndexMap::new();
            entry.insert("grouper".to_string(), grouper);
            entry.insert("list".to_string(), Value::from_list(list));
            Value::from_map(entry)
        })
        .collect();
    Value::from_list(out)
}

fn filter_ifelse(_e: &Evaluator<'_>, input: &Value, params: &VarArgs) -> Value {
    pass_errors!(input);
    let p = match params.expect_args(2) {
        Ok(p) => p,
        Err(err) => return signature_error("ifelse", err),
    };
    if input.is_true() {
        p.args[0].clone()
    } else {
        p.args[1].clone()
    }
}

fn filter_indent(_e: &Evaluator<'_>, input: &Value, params: &VarArgs) -> Value {
    pass_errors!(input);
    let p = match params.expect(
        0,
        &[
            kwarg("width", 4i64),
            kwarg("first", false),
            kwarg("blank", false),
        ],
    ) {
        Ok(p) => p,
        Err(err) => return signature_error("indent", err),
    };
    let width = p.kwargs["width"].as_integer().max(0) as usize;
    let first = p.kwargs["first"].is_true();
    let blank = p.kwargs["blank"].is_true();
    let indent = " ".repeat(width);
    let text = input.to_string();
    let mut out = Vec::new();
    for (idx, line) in text.split('\n').enumerate() {
        if line.is_empty() && !blank {
            out.push(String::new());
            continue;
        }
        if idx > 0 || first {
            out.push(format!("{}{}", indent, line));
        } else {
            out.push(line.to_string());
        }
    }
    Value::from(out.join("\n"))
}

fn filter_int(_e: &Evaluator<'_>, input: &Value, params: &VarArgs) -> Value {
    pass_errors!(input);
    if let Err(err) = params.expect_nothing() {
        return signature_error("int", err);
    }
    Value::from(input.as_integer())
}

fn filter_join(_e: &Evaluator<'_>, input: &Value, params: &VarArgs) -> Value {
    pass_errors!(input);
    let p = match params.expect(0, &[kwarg("d", ""), KwArg::new("attribute", Value::none())]) {
        Ok(p) => p,
        Err(err) => return signature_error("join", err),
    };
    if !input.can_slice() {
        return input.clone();
    }
    let sep = p.kwargs["d"].to_string();
    let mut parts = Vec::with_capacity(input.len());
    for i in 0..input.len() {
        parts.push(input.index(i).to_string());
    }
    Value::from(parts.join(&sep))
}

fn filter_keys(_e: &Evaluator<'_>, input: &Value, params: &VarArgs) -> Value {
    pass_errors!(input);
    if let Err(err) = params.expect_nothing() {
        return signature_error("keys", err);
    }
    if !input.is_dict() {
        return Value::error("Filter 'keys' was passed a non-dict type");
    }
    Value::from_list(input.keys())
}

fn filter_last(_e: &Evaluator<'_>, input: &Value, params: &VarArgs) -> Value {
    pass_errors!(input);
    if let Err(err) = params.expect_nothing() {
        return signature_error("last", err);
    }
    if input.can_slice() && input.len() > 0 {
        return input.index(input.len() - 1);
    }
    Value::from("")
}

fn filter_length(_e: &Evaluator<'_>, input: &Value, params: &VarArgs) -> Value {
    pass_errors!(input);
    if let Err(err) = params.expect_nothing() {
        return signature_error("length", err);
    }
    Value::from(input.len())
}

fn filter_list(_e: &Evaluator<'_>, input: &Value, params: &VarArgs) -> Value {
    pass_errors!(input);
    if let Err(err) = params.expect_nothing() {
        return signature_error("list", err);
    }
    let mut out = Vec::new();
    input.iterate(
        |_, _, item, _| {
            out.push(item.clone());
            true
        },
        || {},
    );
    Value::from_list(out)
}

fn filter_lower(_e: &Evaluator<'_>, input: &Value, params: &VarArgs) -> Value {
    pass_errors!(input);
    if let Err(err) = params.expect_nothing() {
        return signature_error("lower", err);
    }
    Value::from(input.to_string().to_lowercase())
}

fn filter_map(e: &Evaluator<'_>, input: &Value, params: &VarArgs) -> Value {
    pass_errors!(input);
    let p = match params.expect(
        0,
        &[
            kwarg("filter", ""),
            KwArg::new("attribute", Value::none()),
            KwArg::new("default", Value::none()),
        ],
    ) {
        Ok(p) => p,
        Err(err) => return signature_error("map", err),
    };
    let filter = p.kwargs["filter"].to_string();
    let attribute = p.kwargs["attribute"].clone();
    let default = p.kwargs["default"].clone();
    let mut out = Vec::new();
    input.iterate(
        |_, _, item, _| {
            let mut value = item.clone();
            if attribute.is_string() {
                let (attr, found) = value.get(&attribute.to_string());
                if found {
                    value = attr;
                } else if !default.is_nil() {
                    value = default.clone();
                } else {
                    return true;
                }
            }
            if !filter.is_empty() {
                value = e.execute_filter_by_name(&filter, &value, &VarArgs::new());
            }
            out.push(value);
            true
        },
        || {},
    );
    Value::from_list(out)
}

fn extreme(
    input: &Value,
    params: &VarArgs,
    name: &str,
    want_greater: bool,
) -> Value {
    let p = match params.expect(
        0,
        &[
            kwarg("case_sensitive", false),
            KwArg::new("attribute", Value::none()),
        ],
    ) {
        Ok(p) => p,
        Err(err) => return signature_error(name, err),
    };
    let case_sensitive = p.kwargs["case_sensitive"].is_true();
    let attribute = p.kwargs["attribute"].clone();

    let mut best: Option<Value> = None;
    let mut failure: Option<Value> = None;
    input.iterate(
        |_, _, item, _| {
            let value = if attribute.is_string() {
                let (attr, found) = item.get(&attribute.to_string());
                if !found {
                    return true;
                }
                attr
            } else {
                item.clone()
            };
            match &best {
                None => best = Some(value),
                Some(current) => {
                    let comparable = (current.is_number() && value.is_number())
                        || (current.is_string() && value.is_string());
                    if !comparable {
                        failure = Some(Value::error(format!(
                            "{} and {} are not comparable",
                            current.type_name(),
                            value.type_name()
                        )));
                        return false;
                    }
                    let ordering = compare_values(current, &value, case_sensitive);
                    let replace = if want_greater {
                        ordering == std::cmp::Ordering::Less
                    } else {
                        ordering == std::cmp::Ordering::Greater
                    };
                    if replace {
                        best = Some(value);
                    }
                }
            }
            true
        },
        || {},
    );
    if let Some(failure) = failure {
        return failure;
    }
    best.unwrap_or_else(|| Value::from(""))
}

fn filter_max(_e: &Evaluator<'_>, input: &Value, params: &VarArgs) -> Value {
    pass_errors!(input);
    extreme(input, params, "max", true)
}

fn filter_min(_e: &Evaluator<'_>, input: &Value, params: &VarArgs) -> Value {
    pass_errors!(input);
    extreme(input, params, "min", false)
}

fn filter_random(_e: &Evaluator<'_>, input: &Value, params: &VarArgs) -> Value {
    pass_errors!(input);
    if let Err(err) = params.expect_nothing() {
        return signature_error("random", err);
    }
    if !input.can_slice() || input.len() == 0 {
        return input.clone();
    }
    let i = rand::thread_rng().gen_range(0..input.len());
    input.index(i)
}

/// Shared select/reject driver: keeps items whose test result matches
/// `keep`.
fn select_reject(e: &Evaluator<'_>, input: &Value, params: &VarArgs, keep: bool) -> Value {
    let mut out = Vec::new();
    input.iterate(
        |_, _, item, _| {
            let passed = if params.args.is_empty() {
                item.is_true()
            } else {
                let name = params.first().to_string();
                let test_params = VarArgs {
                    args: params.args[1..].to_vec(),
                    kwargs: params.kwargs.clone(),
                };
                e.execute_test_by_name(&name, item, &test_params).is_true()
            };
            if passed == keep {
                out.push(item.clone());
            }
            true
        },
        || {},
    );
    Value::from_list(out)
}

fn filter_select(e: &Evaluator<'_>, input: &Value, params: &VarArgs) -> Value {
    pass_errors!(input);
    select_reject(e, input, params, true)
}

fn filter_reject(e: &Evaluator<'_>, input: &Value, params: &VarArgs) -> Value {
    pass_errors!(input);
    select_reject(e, input, params, false)
}

/// Shared selectattr/rejectattr driver.
fn select_reject_attr(
    e: &Evaluator<'_>,
    input: &Value,
    params: &VarArgs,
    name: &str,
    keep: bool,
) -> Value {
    if params.args.is_empty() {
        return Value::error(format!(
            "Wrong signature for '{}', expect at least an attribute name as argument",
            name
        ));
    }
    let attribute = params.first().to_string();
    let mut out = Vec::new();
    let mut failure: Option<Value> = None;
    input.iterate(
        |_, _, item, _| {
            let (attr, found) = item.get(&attribute);
            if !found {
                failure = Some(Value::error(format!(
                    "{} has no attribute '{}'",
                    item, attribute
                )));
                return false;
            }
            let passed = if params.args.len() == 1 {
                attr.is_true()
            } else {
                let test_name = params.args[1].to_string();
                let test_params = VarArgs {
                    args: params.args[2..].to_vec(),
                    kwargs: params.kwargs.clone(),
                };
                let result = e.execute_test_by_name(&test_name, &attr, &test_params);
                if result.is_error() {
                    failure = Some(result);
                    return false;
                }
                result.is_true()
            };
            if passed == keep {
                out.push(item.clone());
            }
            true
        },
        || {},
    );
    if let Some(failure) = failure {
        return failure;
    }
    Value::from_list(out)
}

fn filter_selectattr(e: &Evaluator<'_>, input: &Value, params: &VarArgs) -> Value {
    pass_errors!(input);
    select_reject_attr(e, input, params, "selectattr", true)
}

fn filter_rejectattr(e: &Evaluator<'_>, input: &Value, params: &VarArgs) -> Value {
    pass_errors!(input);
    select_reject_attr(e, input, params, "rejectattr", false)
}

fn filter_replace(_e: &Evaluator<'_>, input: &Value, params: &VarArgs) -> Value {
    pass_errors!(input);
    let p = match params.expect(2, &[KwArg::new("count", Value::none())]) {
        Ok(p) => p,
        Err(err) => return signature_error("replace", err),
    };
    let old = p.args[0].to_string();
    let new = p.args[1].to_string();
    let count = p.kwargs["count"].clone();
    let text = input.to_string();
    if count.is_nil() {
        Value::from(text.replace(&old, &new))
    } else {
        Value::from(text.replacen(&old, &new, count.as_integer().max(0) as usize))
    }
}

fn filter_reverse(_e: &Evaluator<'_>, input: &Value, params: &VarArgs) -> Value {
    pass_errors!(input);
    if let Err(err) = params.expect_nothing() {
        return signature_error("reverse", err);
    }
    if input.is_string() {
        return Value::from(input.to_string().chars().rev().collect::<String>());
    }
    let mut out = Vec::new();
    input.iterate_order(
        |_, _, item, _| {
            out.push(item.clone());
            true
        },
        || {},
        true,
        false,
        false,
    );
    Value::from_list(out)
}

fn filter_round(_e: &Evaluator<'_>, input: &Value, params: &VarArgs) -> Value {
    pass_errors!(input);
    let p = match params.expect(0, &[kwarg("precision", 0i64), kwarg("method", "common")]) {
        Ok(p) => p,
        Err(err) => return signature_error("round", err),
    };
    let method = p.kwargs["method"].to_string();
    let op: fn(f64) -> f64 = match method.as_str() {
        "common" => f64::round,
        "floor" => f64::floor,
        "ceil" => f64::ceil,
        _ => {
            return Value::error(format!(
                "Unknown method '{}', must be one of 'common', 'floor', 'ceil'",
                method
            ))
        }
    };
    let precision = p.kwargs["precision"].as_integer();
    let factor = 10f64.powi(precision as i32);
    let mut value = input.as_float();
    if factor > 0.0 {
        value *= factor;
    }
    value = op(value);
    if factor > 0.0 {
        value /= factor;
    }
    Value::from(value)
}

fn filter_safe(_e: &Evaluator<'_>, input: &Value, params: &VarArgs) -> Value {
    pass_errors!(input);
    if let Err(err) = params.expect_nothing() {
        return signature_error("safe", err);
    }
    Value::safe(input.clone())
}

fn filter_slice(_e: &Evaluator<'_>, input: &Value, params: &VarArgs) -> Value {
    pass_errors!(input);
    let p = match params.expect_args(1) {
        Ok(p) => p,
        Err(err) => return signature_error("slice", err),
    };
    let bounds = p.first().to_string();
    let parts: Vec<&str> = bounds.split(':').collect();
    if parts.len() != 2 {
        return Value::error(
            "Slice string must have the format 'from:to' [from/to can be omitted, but the ':' is required]",
        );
    }
    if !input.can_slice() {
        return input.clone();
    }
    let len = input.len();
    let mut from = parts[0].trim().parse::<usize>().unwrap_or(0);
    let to = match parts[1].trim().parse::<usize>() {
        Ok(v) if v >= from && v <= len => v,
        _ => len,
    };
    if from > to {
        from = to;
    }
    input.slice(from, to)
}

fn filter_sort(_e: &Evaluator<'_>, input: &Value, params: &VarArgs) -> Value {
    pass_errors!(input);
    let p = match params.expect(0, &[kwarg("reverse", false), kwarg("case_sensitive", false)]) {
        Ok(p) => p,
        Err(err) => return signature_error("sort", err),
    };
    let reverse = p.kwargs["reverse"].is_true();
    let case_sensitive = p.kwargs["case_sensitive"].is_true();
    let mut out = Vec::new();
    input.iterate_order(
        |_, _, item, _| {
            out.push(item.clone());
            true
        },
        || {},
        reverse,
        true,
        case_sensitive,
    );
    Value::from_list(out)
}

fn filter_split(_e: &Evaluator<'_>, input: &Value, params: &VarArgs) -> Value {
    pass_errors!(input);
    if !input.is_string() {
        return Value::error("Filter 'split' was passed a non-string type");
    }
    let p = match params.expect_args(1) {
        Ok(p) => p,
        Err(err) => return signature_error("split", err),
    };
    if !p.first().is_string() {
        return signature_error("split", "delimiter must be a string".to_string());
    }
    let delimiter = p.first().to_string();
    let out = input
        .to_string()
        .split(&delimiter)
        .map(Value::from)
        .collect();
    Value::from_list(out)
}

fn filter_string(_e: &Evaluator<'_>, input: &Value, params: &VarArgs) -> Value {
    pass_errors!(input);
    if let Err(err) = params.expect_nothing() {
        return signature_error("string", err);
    }
    Value::from(input.to_string())
}

fn filter_striptags(_e: &Evaluator<'_>, input: &Value, params: &VarArgs) -> Value {
    pass_errors!(input);
    if let Err(err) = params.expect_nothing() {
        return signature_error("striptags", err);
    }
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new("<[^>]*?>").expect("static pattern"));
    let input_str = input.to_string();
    let stripped = re.replace_all(&input_str, "");
    Value::from(stripped.trim().to_string())
}

fn filter_sum(_e: &Evaluator<'_>, input: &Value, params: &VarArgs) -> Value {
    pass_errors!(input);
    let p = match params.expect(
        0,
        &[KwArg::new("attribute", Value::none()), kwarg("start", 0i64)],
    ) {
        Ok(p) => p,
        Err(err) => return signature_error("sum", err),
    };
    let attribute = p.kwargs["attribute"].clone();
    let mut sum = p.kwargs["start"].as_float();
    let mut failure: Option<String> = None;

    input.iterate(
        |_, _, item, _| {
            if attribute.is_string() {
                let mut value = item.clone();
                for attr in attribute.to_string().split('.') {
                    let (next, found) = value.get(attr);
                    if !found {
                        failure = Some(format!(
                            "'{}' has no attribute '{}'",
                            item, attribute
                        ));
                        return false;
                    }
                    value = next;
                }
                if value.is_number() {
                    sum += value.as_float();
                }
            } else if attribute.is_integer() {
                let (value, found) = item.getitem_index(attribute.as_integer());
                if found {
                    sum += value.as_float();
                }
            } else {
                sum += item.as_float();
            }
            true
        },
        || {},
    );

    if let Some(failure) = failure {
        return Value::error(failure);
    }
    if sum == sum.trunc() {
        Value::from(sum as i64)
    } else {
        Value::from(sum)
    }
}

fn filter_title(_e: &Evaluator<'_>, input: &Value, params: &VarArgs) -> Value {
    pass_errors!(input);
    if let Err(err) = params.expect_nothing() {
        return signature_error("title", err);
    }
    if !input.is_string() {
        return Value::from("");
    }
    let lowered = input.to_string().to_lowercase();
    let mut out = String::with_capacity(lowered.len());
    let mut at_word_start = true;
    for c in lowered.chars() {
        if at_word_start && c.is_alphabetic() {
            out.extend(c.to_uppercase());
            at_word_start = false;
        } else {
            out.push(c);
            if !c.is_alphanumeric() {
                at_word_start = true;
            }
        }
    }
    Value::from(out)
}

fn filter_tojson(_e: &Evaluator<'_>, input: &Value, params: &VarArgs) -> Value {
    pass_errors!(input);
    let p = match params.expect(0, &[KwArg::new("indent", Value::none())]) {
        Ok(p) => p,
        Err(err) => return signature_error("tojson", err),
    };
    let json = match input.to_json() {
        Ok(json) => json,
        Err(err) => return Value::error(format!("Unable to marshal to json: {}", err)),
    };
    let indent = p.kwargs["indent"].clone();
    let out = if indent.is_nil() {
        serde_json::to_string(&json)
    } else if indent.is_integer() {
        let indent_bytes = " ".repeat(indent.as_integer().max(0) as usize);
        let formatter =
            serde_json::ser::PrettyFormatter::with_indent(indent_bytes.as_bytes());
        let mut buf = Vec::new();
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        match serde::Serialize::serialize(&json, &mut serializer) {
            Ok(()) => Ok(String::from_utf8_lossy(&buf).into_owned()),
            Err(err) => Err(err),
        }
    } else {
        return Value::error(format!("Expected an integer for 'indent', got {}", indent));
    };
    match out {
        Ok(out) => Value::safe(Value::from(out)),
        Err(err) => Value::error(format!("Unable to marshal to json: {}", err)),
    }
}

fn filter_trim(_e: &Evaluator<'_>, input: &Value, params: &VarArgs) -> Value {
    pass_errors!(input);
    if let Err(err) = params.expect_nothing() {
        return signature_error("trim", err);
    }
    Value::from(input.to_string().trim().to_string())
}

fn filter_truncate(_e: &Evaluator<'_>, input: &Value, params: &VarArgs) -> Value {
    pass_errors!(input);
    let p = match params.expect(
        0,
        &[
            kwarg("length", 255i64),
            kwarg("killwords", false),
            kwarg("end", "..."),
            kwarg("leeway", 0i64),
        ],
    ) {
        Ok(p) => p,
        Err(err) => return signature_error("truncate", err),
    };
    let source = input.to_string();
    let length = p.kwargs["length"].as_integer().max(0) as usize;
    let leeway = p.kwargs["leeway"].as_integer().max(0) as usize;
    let killwords = p.kwargs["killwords"].is_true();
    let end = p.kwargs["end"].to_string();
    let end_len = end.chars().count();

    if length < end_len {
        return Value::error(format!("expected length >= {}, got {}", end_len, length));
    }
    let runes: Vec<char> = source.chars().collect();
    if runes.len() <= length + leeway {
        return Value::from(source);
    }
    let mut at_length: String = runes[..length - end_len].iter().collect();
    if !killwords {
        // Cut back to the last word boundary.
        at_length = at_length
            .trim_end_matches(|c: char| !c.is_whitespace())
            .trim_end()
            .to_string();
    }
    Value::from(format!("{}{}", at_length, end))
}

fn filter_try(_e: &Evaluator<'_>, input: &Value, params: &VarArgs) -> Value {
    if let Err(err) = params.expect_nothing() {
        return signature_error("try", err);
    }
    if input.is_error() || !input.is_true() {
        return Value::none();
    }
    input.clone()
}

fn filter_unique(_e: &Evaluator<'_>, input: &Value, params: &VarArgs) -> Value {
    pass_errors!(input);
    let p = match params.expect(
        0,
        &[
            kwarg("case_sensitive", false),
            KwArg::new("attribute", Value::none()),
        ],
    ) {
        Ok(p) => p,
        Err(err) => return signature_error("unique", err),
    };
    let case_sensitive = p.kwargs["case_sensitive"].is_true();
    let attribute = p.kwargs["attribute"].clone();

    let mut out: Vec<Value> = Vec::new();
    let mut seen: Vec<Value> = Vec::new();
    let mut failure: Option<String> = None;
    input.iterate(
        |_, _, item, _| {
            let mut tracked = if attribute.is_string() {
                let (nested, found) = item.get(&attribute.to_string());
                if !found {
                    failure = Some(format!(
                        "{} has no attribute {}",
                        item, attribute
                    ));
                    return false;
                }
                nested
            } else {
                item.clone()
            };
            if !case_sensitive && tracked.is_string() {
                tracked = Value::from(tracked.to_string().to_lowercase());
            }
            if !seen.iter().any(|s| s.equal_value_to(&tracked)) {
                seen.push(tracked);
                out.push(item.clone());
            }
            true
        },
        || {},
    );
    if let Some(failure) = failure {
        return Value::error(failure);
    }
    Value::from_list(out)
}

fn filter_upper(_e: &Evaluator<'_>, input: &Value, params: &VarArgs) -> Value {
    pass_errors!(input);
    if let Err(err) = params.expect_nothing() {
        return signature_error("upper", err);
    }
    Value::from(input.to_string().to_uppercase())
}

fn filter_urlencode(_e: &Evaluator<'_>, input: &Value, params: &VarArgs) -> Value {
    pass_errors!(input);
    if let Err(err) = params.expect_nothing() {
        return signature_error("urlencode", err);
    }
    let mut out = String::new();
    for byte in input.to_string().bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            b' ' => out.push('+'),
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    Value::from(out)
}

fn filter_values(_e: &Evaluator<'_>, input: &Value, params: &VarArgs) -> Value {
    pass_errors!(input);
    if let Err(err) = params.expect_nothing() {
        return signature_error("values", err);
    }
    if !input.is_dict() {
        return Value::error("Filter 'values' was passed a non-dict type");
    }
    Value::from_list(input.items().into_iter().map(|p| p.value).collect())
}

fn filter_wordcount(_e: &Evaluator<'_>, input: &Value, params: &VarArgs) -> Value {
    pass_errors!(input);
    if let Err(err) = params.expect_nothing() {
        return signature_error("wordcount", err);
    }
    Value::from(input.to_string().split_whitespace().count())
}

fn filter_wordwrap(_e: &Evaluator<'_>, input: &Value, params: &VarArgs) -> Value {
    pass_errors!(input);
    let p = match params.expect(0, &[kwarg("width", 79i64), kwarg("break_long_words", true)]) {
        Ok(p) => p,
        Err(err) => return signature_error("wordwrap", err),
    };
    let width = p.kwargs["width"].as_integer().max(1) as usize;
    let break_long_words = p.kwargs["break_long_words"].is_true();
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();
    for word in input.to_string().split_whitespace() {
        let word_len = word.chars().count();
        if break_long_words && word_len > width {
            // Chop the oversized word: the first piece fills whatever room
            // the current line still has, the rest take full lines.
            let mut chars = word.chars().peekable();
            while chars.peek().is_some() {
                let room = if current.is_empty() {
                    width
                } else {
                    width.saturating_sub(current.chars().count() + 1)
                };
                if room == 0 {
                    lines.push(std::mem::take(&mut current));
                    continue;
                }
                let piece: String = chars.by_ref().take(room).collect();
                if !current.is_empty() {
                    current.push(' ');
                }
                current.push_str(&piece);
                if chars.peek().is_some() {
                    lines.push(std::mem::take(&mut current));
                }
            }
            continue;
        }
        if current.is_empty() {
            current.push_str(word);
        } else if current.chars().count() + 1 + word_len <= width {
            current.push(' ');
            current.push_str(word);
        } else {
            lines.push(std::mem::take(&mut current));
            current.push_str(word);
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    Value::from(lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::context::Context;
    use crate::eval::EvalConfig;
    use serde_json::json;

    fn apply(name: &str, input: Value, params: VarArgs) -> Value {
        let mut config = EvalConfig::new(Config::default());
        config.filters = std::sync::Arc::new(default_filters());
        config.tests = std::sync::Arc::new(crate::testers::default_tests());
        let ctx = Context::new();
        let evaluator = Evaluator::new(&config, &ctx);
        evaluator.execute_filter_by_name(name, &input, &params)
    }

    fn no_args() -> VarArgs {
        VarArgs::new()
    }

    fn with_args(args: Vec<Value>) -> VarArgs {
        VarArgs {
            args,
            kwargs: indexmap::IndexMap::new(),
        }
    }

    #[test]
    fn test_upper_lower() {
        assert_eq!(apply("upper", Value::from("abc"), no_args()).to_string(), "ABC");
        assert_eq!(apply("lower", Value::from("AbC"), no_args()).to_string(), "abc");
    }

    #[test]
    fn test_default_absorbs_errors_and_nil() {
        let fallback = with_args(vec![Value::from("fallback")]);
        assert_eq!(
            apply("default", Value::error("boom"), fallback.clone()).to_string(),
            "fallback"
        );
        assert_eq!(
            apply("default", Value::none(), fallback.clone()).to_string(),
            "fallback"
        );
        assert_eq!(
            apply("default", Value::from("kept"), fallback).to_string(),
            "kept"
        );
    }

    #[test]
    fn test_error_passthrough() {
        let err = Value::error("original");
        let out = apply("upper", err, no_args());
        assert!(out.is_error());
        assert_eq!(out.error_message(), "original");
    }

    #[test]
    fn test_round_uses_power_of_ten() {
        let mut params = VarArgs::new();
        params.kwargs.insert("precision".to_string(), Value::from(2i64));
        let out = apply("round", Value::from(3.14159), params);
        assert_eq!(out.to_string(), "3.14");
        let mut params = VarArgs::new();
        params.kwargs.insert("method".to_string(), Value::from("ceil"));
        assert_eq!(apply("round", Value::from(2.1), params).to_string(), "3.0");
    }

    #[test]
    fn test_batch_with_fill() {
        let mut params = with_args(vec![Value::from(3i64)]);
        params.kwargs.insert("fill_with".to_string(), Value::from(0i64));
        let input = Value::from(json!([1, 2, 3, 4, 5]));
        let out = apply("batch", input, params);
        assert_eq!(out.to_string(), "[[1, 2, 3], [4, 5, 0]]");
    }

    #[test]
    fn test_sort_and_unique() {
        let input = Value::from(json!(["b", "A", "b", "c"]));
        let sorted = apply("sort", input.clone(), no_args());
        assert_eq!(sorted.to_string(), "['A', 'b', 'b', 'c']");
        let unique = apply("unique", input, no_args());
        assert_eq!(unique.to_string(), "['b', 'A', 'c']");
    }

    #[test]
    fn test_groupby() {
        let input = Value::from(json!([
            {"city": "NY", "name": "a"},
            {"city": "SF", "name": "b"},
            {"city": "NY", "name": "c"},
        ]));
        let out = apply("groupby", input, with_args(vec![Value::from("city")]));
        let (first, _) = out.index(0).getitem_str("grouper");
        assert_eq!(first.to_string(), "NY");
        let (list, _) = out.index(0).getitem_str("list");
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_map_with_attribute() {
        let input = Value::from(json!([{"n": 1}, {"n": 2}]));
        let mut params = VarArgs::new();
        params.kwargs.insert("attribute".to_string(), Value::from("n"));
        let out = apply("map", input, params);
        assert_eq!(out.to_string(), "[1, 2]");
    }

    #[test]
    fn test_join() {
        let mut params = VarArgs::new();
        params.kwargs.insert("d".to_string(), Value::from(", "));
        let input = Value::from(json!([1, 2, 3]));
        assert_eq!(apply("join", input, params).to_string(), "1, 2, 3");
    }

    #[test]
    fn test_dictsort_returns_ordered_pairs() {
        let input = Value::from(json!({"b": 2, "a": 1, "C": 3}));
        let out = apply("dictsort", input, no_args());
        assert_eq!(out.to_string(), "{'a': 1, 'b': 2, 'C': 3}");
    }

    #[test]
    fn test_escape_and_safe() {
        let out = apply("escape", Value::from("<b>"), no_args());
        assert_eq!(out.to_string(), "&lt;b&gt;");
        assert!(out.safe);
        // escape is a no-op on safe values
        let safe = Value::safe(Value::from("<b>"));
        assert_eq!(apply("escape", safe, no_args()).to_string(), "<b>");
    }

    #[test]
    fn test_tojson_fromjson_round_trip() {
        let input = Value::from(json!({"a": [1, 2]}));
        let encoded = apply("tojson", input.clone(), no_args());
        assert!(encoded.safe);
        let decoded = apply("fromjson", encoded, no_args());
        assert!(decoded.equal_value_to(&input));
    }

    #[test]
    fn test_truncate() {
        let mut params = VarArgs::new();
        params.kwargs.insert("length".to_string(), Value::from(11i64));
        let out = apply("truncate", Value::from("hello big world"), params);
        assert_eq!(out.to_string(), "hello...");
    }

    #[test]
    fn test_select_with_test() {
        let input = Value::from(json!([1, 2, 3, 4]));
        let out = apply("select", input, with_args(vec![Value::from("even")]));
        assert_eq!(out.to_string(), "[2, 4]");
    }

    #[test]
    fn test_slice_filter() {
        let input = Value::from(json!([1, 2, 3, 4, 5]));
        let out = apply("slice", input, with_args(vec![Value::from("1:3")]));
        assert_eq!(out.to_string(), "[2, 3]");
    }

    #[test]
    fn test_sum_with_attribute() {
        let input = Value::from(json!([{"v": 1}, {"v": 2.5}]));
        let mut params = VarArgs::new();
        params.kwargs.insert("attribute".to_string(), Value::from("v"));
        assert_eq!(apply("sum", input, params).to_string(), "3.5");
    }

    #[test]
    fn test_wordcount_and_wordwrap() {
        assert_eq!(
            apply("wordcount", Value::from("a b  c"), no_args()).as_integer(),
            3
        );
        let mut params = VarArgs::new();
        params.kwargs.insert("width".to_string(), Value::from(5i64));
        assert_eq!(
            apply("wordwrap", Value::from("aa bb cc"), params).to_string(),
            "aa bb\ncc"
        );
    }

    #[test]
    fn test_wordwrap_break_long_words() {
        let mut params = VarArgs::new();
        params.kwargs.insert("width".to_string(), Value::from(5i64));
        // Long words split by default...
        assert_eq!(
            apply("wordwrap", Value::from("abcdefghij"), params.clone()).to_string(),
            "abcde\nfghij"
        );
        assert_eq!(
            apply("wordwrap", Value::from("aa bcdefghi"), params.clone()).to_string(),
            "aa bc\ndefgh\ni"
        );
        // ...and stay whole when the flag is off.
        params
            .kwargs
            .insert("break_long_words".to_string(), Value::from(false));
        assert_eq!(
            apply("wordwrap", Value::from("aa abcdefghij bb"), params).to_string(),
            "aa\nabcdefghij\nbb"
        );
    }

    #[test]
    fn test_urlencode() {
        assert_eq!(
            apply("urlencode", Value::from("a b&c"), no_args()).to_string(),
            "a+b%26c"
        );
    }

    #[test]
    fn test_unknown_kwarg_rejected() {
        let mut params = VarArgs::new();
        params.kwargs.insert("bogus".to_string(), Value::from(1i64));
        let out = apply("upper", Value::from("x"), params);
        assert!(out.is_error());
        assert!(out.error_message().contains("Unexpected keyword argument"));
    }
}
