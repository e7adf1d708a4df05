//! The built-in test set, applied with `is`.
//!
//! Comparison tests are also registered under their symbolic aliases
//! (`==`, `!=`, `<`, …) so `x is == 3` parses and runs.

use crate::context::Context;
use crate::eval::{TestFunction, TestSet};
use crate::value::Value;
use crate::varargs::VarArgs;

/// The full built-in test set.
pub fn default_tests() -> TestSet {
    let mut set = TestSet::new();
    let entries: &[(&str, TestFunction)] = &[
        ("callable", test_callable),
        ("defined", test_defined),
        ("divisibleby", test_divisibleby),
        ("eq", test_equal),
        ("equalto", test_equal),
        ("==", test_equal),
        ("even", test_even),
        ("ge", test_greater_equal),
        (">=", test_greater_equal),
        ("gt", test_greater_than),
        ("greaterthan", test_greater_than),
        (">", test_greater_than),
        ("in", test_in),
        ("iterable", test_iterable),
        ("le", test_less_equal),
        ("<=", test_less_equal),
        ("lower", test_lower),
        ("lt", test_less_than),
        ("lessthan", test_less_than),
        ("<", test_less_than),
        ("mapping", test_mapping),
        ("ne", test_not_equal),
        ("!=", test_not_equal),
        ("none", test_none),
        ("number", test_number),
        ("odd", test_odd),
        ("sequence", test_sequence),
        ("string", test_string),
        ("undefined", test_undefined),
        ("upper", test_upper),
        ("empty", test_empty),
    ];
    for (name, f) in entries {
        // The set starts empty, so registration cannot collide.
        let _ = set.register(name, *f);
    }
    set
}

fn test_callable(_ctx: &Context, input: &Value, _params: &VarArgs) -> Result<bool, String> {
    Ok(input.is_callable())
}

fn test_defined(_ctx: &Context, input: &Value, _params: &VarArgs) -> Result<bool, String> {
    Ok(!(input.is_error() || input.is_nil()))
}

fn test_undefined(ctx: &Context, input: &Value, params: &VarArgs) -> Result<bool, String> {
    test_defined(ctx, input, params).map(|defined| !defined)
}

fn test_divisibleby(_ctx: &Context, input: &Value, params: &VarArgs) -> Result<bool, String> {
    let divisor = params.first().as_integer();
    if divisor == 0 {
        return Ok(false);
    }
    Ok(input.as_integer() % divisor == 0)
}

fn test_equal(_ctx: &Context, input: &Value, params: &VarArgs) -> Result<bool, String> {
    Ok(input.equal_value_to(&params.first()))
}

fn test_not_equal(_ctx: &Context, input: &Value, params: &VarArgs) -> Result<bool, String> {
    Ok(!input.equal_value_to(&params.first()))
}

fn test_even(_ctx: &Context, input: &Value, _params: &VarArgs) -> Result<bool, String> {
    if !input.is_integer() {
        return Ok(false);
    }
    Ok(input.as_integer() % 2 == 0)
}

fn test_odd(_ctx: &Context, input: &Value, _params: &VarArgs) -> Result<bool, String> {
    if !input.is_integer() {
        return Ok(false);
    }
    Ok(input.as_integer() % 2 != 0)
}

fn numeric_pair(input: &Value, params: &VarArgs) -> Option<(f64, f64)> {
    let other = params.first();
    if !input.is_number() || !other.is_number() {
        return None;
    }
    Some((input.as_float(), other.as_float()))
}

fn test_greater_equal(_ctx: &Context, input: &Value, params: &VarArgs) -> Result<bool, String> {
    Ok(numeric_pair(input, params).map_or(false, |(a, b)| a >= b))
}

fn test_greater_than(_ctx: &Context, input: &Value, params: &VarArgs) -> Result<bool, String> {
    Ok(numeric_pair(input, params).map_or(false, |(a, b)| a > b))
}

fn test_less_equal(_ctx: &Context, input: &Value, params: &VarArgs) -> Result<bool, String> {
    Ok(numeric_pair(input, params).map_or(false, |(a, b)| a <= b))
}

fn test_less_than(_ctx: &Context, input: &Value, params: &VarArgs) -> Result<bool, String> {
    Ok(numeric_pair(input, params).map_or(false, |(a, b)| a < b))
}

fn test_in(_ctx: &Context, input: &Value, params: &VarArgs) -> Result<bool, String> {
    Ok(params.first().contains(input))
}

fn test_iterable(_ctx: &Context, input: &Value, _params: &VarArgs) -> Result<bool, String> {
    Ok(input.is_iterable())
}

fn test_sequence(_ctx: &Context, input: &Value, _params: &VarArgs) -> Result<bool, String> {
    Ok(input.is_list())
}

fn test_mapping(_ctx: &Context, input: &Value, _params: &VarArgs) -> Result<bool, String> {
    Ok(input.is_dict())
}

fn test_lower(_ctx: &Context, input: &Value, _params: &VarArgs) -> Result<bool, String> {
    if !input.is_string() {
        return Ok(false);
    }
    let text = input.to_string();
    Ok(text.to_lowercase() == text)
}

fn test_upper(_ctx: &Context, input: &Value, _params: &VarArgs) -> Result<bool, String> {
    if !input.is_string() {
        return Ok(false);
    }
    let text = input.to_string();
    Ok(text.to_uppercase() == text)
}

fn test_none(_ctx: &Context, input: &Value, _params: &VarArgs) -> Result<bool, String> {
    Ok(input.is_nil())
}

fn test_number(_ctx: &Context, input: &Value, _params: &VarArgs) -> Result<bool, String> {
    Ok(input.is_number())
}

fn test_string(_ctx: &Context, input: &Value, _params: &VarArgs) -> Result<bool, String> {
    Ok(input.is_string())
}

fn test_empty(_ctx: &Context, input: &Value, _params: &VarArgs) -> Result<bool, String> {
    if !input.is_list() && !input.is_dict() && !input.is_string() {
        return Err("test 'empty' can only be called for list, map or string".to_string());
    }
    Ok(input.len() == 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn run(name: &str, input: Value, args: Vec<Value>) -> Result<bool, String> {
        let set = default_tests();
        let ctx = Context::new();
        let params = VarArgs {
            args,
            kwargs: indexmap::IndexMap::new(),
        };
        set.get(name).expect("registered test")(&ctx, &input, &params)
    }

    #[test]
    fn test_defined_undefined() {
        assert!(run("defined", Value::from(0i64), vec![]).unwrap());
        assert!(!run("defined", Value::none(), vec![]).unwrap());
        assert!(!run("defined", Value::error("x"), vec![]).unwrap());
        assert!(run("undefined", Value::none(), vec![]).unwrap());
    }

    #[test]
    fn test_even_odd() {
        assert!(run("even", Value::from(4i64), vec![]).unwrap());
        assert!(run("odd", Value::from(3i64), vec![]).unwrap());
        assert!(!run("even", Value::from("4"), vec![]).unwrap());
    }

    #[test]
    fn test_divisibleby() {
        assert!(run("divisibleby", Value::from(9i64), vec![Value::from(3i64)]).unwrap());
        assert!(!run("divisibleby", Value::from(9i64), vec![Value::from(0i64)]).unwrap());
    }

    #[test]
    fn test_symbolic_aliases() {
        assert!(run("==", Value::from(1i64), vec![Value::from(1.0)]).unwrap());
        assert!(run(">=", Value::from(2i64), vec![Value::from(2i64)]).unwrap());
        assert!(run("<", Value::from(1i64), vec![Value::from(2i64)]).unwrap());
    }

    #[test]
    fn test_in_and_empty() {
        let list = Value::from(json!([1, 2, 3]));
        assert!(run("in", Value::from(2i64), vec![list]).unwrap());
        assert!(run("empty", Value::from(""), vec![]).unwrap());
        assert!(run("empty", Value::from(1i64), vec![]).is_err());
    }

    #[test]
    fn test_type_predicates() {
        assert!(run("string", Value::from("x"), vec![]).unwrap());
        assert!(run("number", Value::from(1.5), vec![]).unwrap());
        assert!(run("mapping", Value::from(json!({})), vec![]).unwrap());
        assert!(run("sequence", Value::from(json!([])), vec![]).unwrap());
        assert!(run("none", Value::none(), vec![]).unwrap());
        assert!(run("lower", Value::from("abc"), vec![]).unwrap());
        assert!(run("upper", Value::from("ABC"), vec![]).unwrap());
    }
}
