//! The built-in globals, bound into the root context of every render.
//!
//! `cycler` and `joiner` return objects with per-instance mutable state;
//! that state lives behind reference-counted cells confined to the render
//! that created them.

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::eval::{Evaluator, Global, GlobalsSet};
use crate::utils;
use crate::value::{Dict, Pair, Value};
use crate::varargs::{kwarg, VarArgs};

/// The full built-in globals set.
pub fn default_globals() -> GlobalsSet {
    let mut set = GlobalsSet::new();
    set.set("range", Global::Function(global_range));
    set.set("dict", Global::Function(global_dict));
    set.set("cycler", Global::Function(global_cycler));
    set.set("joiner", Global::Function(global_joiner));
    set.set("namespace", Global::Function(global_namespace));
    set.set("lipsum", Global::Function(global_lipsum));
    set
}

/// `range(stop)`, `range(start, stop)` or `range(start, stop, step)`,
/// materialised as a list.
fn global_range(_e: &Evaluator<'_>, va: &VarArgs) -> Value {
    let (mut start, stop, step) = match va.args.len() {
        1 => (0, va.args[0].as_integer(), 1),
        2 => (va.args[0].as_integer(), va.args[1].as_integer(), 1),
        3 => (
            va.args[0].as_integer(),
            va.args[1].as_integer(),
            va.args[2].as_integer(),
        ),
        _ => return Value::error("range expects signature range([start, ]stop[, step])"),
    };
    if step == 0 {
        return Value::error("range step must not be zero");
    }
    let mut out = Vec::new();
    if step > 0 {
        while start < stop {
            out.push(Value::from(start));
            start += step;
        }
    } else {
        while start > stop {
            out.push(Value::from(start));
            start += step;
        }
    }
    Value::from_list(out)
}

/// `dict(**kwargs)`: an ordered mapping in argument order.
fn global_dict(_e: &Evaluator<'_>, va: &VarArgs) -> Value {
    let mut dict = Dict::new();
    for (key, value) in &va.kwargs {
        dict.pairs.push(Pair {
            key: Value::from(key.as_str()),
            value: value.clone(),
        });
    }
    Value::from_dict(dict)
}

/// `cycler(*values)`: an object with `next()`, `reset()` and `current`.
fn global_cycler(_e: &Evaluator<'_>, va: &VarArgs) -> Value {
    let values: Vec<String> = va.args.iter().map(|v| v.to_string()).collect();
    if values.is_empty() {
        return Value::error("cycler requires at least one argument");
    }
    let state = Value::from_map(IndexMap::new());
    state
        .set("current", Value::from(values[0].as_str()))
        .ok();
    let idx = Rc::new(RefCell::new(0usize));

    {
        let values = values.clone();
        let state = state.clone();
        let idx = Rc::clone(&idx);
        state
            .clone()
            .set(
                "next",
                Value::from_function(move |_, _| {
                    let mut i = idx.borrow_mut();
                    let (current, _) = state.getitem_str("current");
                    *i += 1;
                    if *i >= values.len() {
                        *i = 0;
                    }
                    state
                        .set("current", Value::from(values[*i].as_str()))
                        .ok();
                    current
                }),
            )
            .ok();
    }
    {
        let values = values.clone();
        let state = state.clone();
        let idx = Rc::clone(&idx);
        state
            .clone()
            .set(
                "reset",
                Value::from_function(move |_, _| {
                    *idx.borrow_mut() = 0;
                    state
                        .set("current", Value::from(values[0].as_str()))
                        .ok();
                    Value::none()
                }),
            )
            .ok();
    }
    state
}

/// `joiner(sep=",")`: returns an empty string on first call, the
/// separator afterwards.
fn global_joiner(_e: &Evaluator<'_>, va: &VarArgs) -> Value {
    let p = match va.expect_kwargs(&[kwarg("sep", ",")]) {
        Ok(p) => p,
        Err(err) => return Value::error(format!("wrong signature for 'joiner': {}", err)),
    };
    let sep = p.kwargs["sep"].to_string();
    let first = Rc::new(RefCell::new(true));
    Value::from_function(move |_, _| {
        let mut first = first.borrow_mut();
        if *first {
            *first = false;
            Value::from("")
        } else {
            Value::from(sep.as_str())
        }
    })
}

/// `namespace(**kwargs)`: a writable attribute bag for `{% set ns.x %}`.
fn global_namespace(_e: &Evaluator<'_>, va: &VarArgs) -> Value {
    let mut map = IndexMap::new();
    for (key, value) in &va.kwargs {
        map.insert(key.clone(), value.clone());
    }
    Value::from_map(map)
}

fn global_lipsum(_e: &Evaluator<'_>, va: &VarArgs) -> Value {
    let p = match va.expect_kwargs(&[
        kwarg("n", 5i64),
        kwarg("html", true),
        kwarg("min", 20i64),
        kwarg("max", 100i64),
    ]) {
        Ok(p) => p,
        Err(err) => return Value::error(format!("wrong signature for 'lipsum': {}", err)),
    };
    let n = p.kwargs["n"].as_integer().max(0) as usize;
    let html = p.kwargs["html"].is_true();
    let min = p.kwargs["min"].as_integer().max(1) as usize;
    let max = p.kwargs["max"].as_integer().max(1) as usize;
    Value::safe(Value::from(utils::lipsum(n, html, min, max)))
}
