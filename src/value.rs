//! The uniform value protocol used throughout evaluation.
//!
//! A [`Value`] wraps one of a closed set of runtime representations plus a
//! `safe` flag controlling autoescape. Containers use shared interior
//! mutability so that writes through `set` (e.g. `{% set ns.attr = … %}`)
//! are visible everywhere the container is referenced, matching the
//! reference semantics templates expect from host objects.
//!
//! Errors travel as values: a failing filter or operator produces an error
//! value which later filters pass through untouched until it reaches an
//! output node and aborts the render.

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::eval::Evaluator;
use crate::utils::escape;
use crate::varargs::VarArgs;

/// Callable stored inside a [`Value`].
pub type Function = Rc<dyn Fn(&Evaluator, &VarArgs) -> Value>;

#[derive(Clone)]
pub(crate) enum Repr {
    None,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Str(String),
    List(Rc<RefCell<Vec<Value>>>),
    /// Host mapping with string keys. Treated as unordered: iteration sorts
    /// keys case-insensitively unless asked otherwise.
    Map(Rc<RefCell<IndexMap<String, Value>>>),
    /// Ordered mapping with arbitrary keys, used for dict literals,
    /// `dict()` and `dictsort` output.
    Dict(Rc<RefCell<Dict>>),
    Callable(Function),
    Error(String),
}

/// A key/value pair of an ordered [`Dict`].
#[derive(Clone, Debug)]
pub struct Pair {
    pub key: Value,
    pub value: Value,
}

/// An ordered mapping: a sequence of pairs whose order is the source order.
#[derive(Clone, Debug, Default)]
pub struct Dict {
    pub pairs: Vec<Pair>,
}

impl Dict {
    pub fn new() -> Self {
        Dict { pairs: Vec::new() }
    }

    pub fn get(&self, key: &Value) -> Option<Value> {
        self.pairs
            .iter()
            .find(|p| p.key.equal_value_to(key))
            .map(|p| p.value.clone())
    }

    pub fn set(&mut self, key: Value, value: Value) {
        for pair in self.pairs.iter_mut() {
            if pair.key.equal_value_to(&key) {
                pair.value = value;
                return;
            }
        }
        self.pairs.push(Pair { key, value });
    }

    pub fn keys(&self) -> Vec<Value> {
        self.pairs.iter().map(|p| p.key.clone()).collect()
    }
}

/// A runtime value plus its autoescape-exemption flag.
#[derive(Clone)]
pub struct Value {
    pub(crate) repr: Repr,
    pub safe: bool,
}

impl Value {
    pub fn none() -> Self {
        Value {
            repr: Repr::None,
            safe: false,
        }
    }

    /// Wraps a value and marks it safe, skipping autoescape on output.
    pub fn safe(mut value: Value) -> Self {
        value.safe = true;
        value
    }

    pub fn error(message: impl Into<String>) -> Self {
        Value {
            repr: Repr::Error(message.into()),
            safe: false,
        }
    }

    pub fn from_list(items: Vec<Value>) -> Self {
        Value {
            repr: Repr::List(Rc::new(RefCell::new(items))),
            safe: false,
        }
    }

    pub fn from_map(map: IndexMap<String, Value>) -> Self {
        Value {
            repr: Repr::Map(Rc::new(RefCell::new(map))),
            safe: false,
        }
    }

    pub fn from_dict(dict: Dict) -> Self {
        Value {
            repr: Repr::Dict(Rc::new(RefCell::new(dict))),
            safe: false,
        }
    }

    pub fn from_function<F>(f: F) -> Self
    where
        F: Fn(&Evaluator, &VarArgs) -> Value + 'static,
    {
        Value {
            repr: Repr::Callable(Rc::new(f)),
            safe: false,
        }
    }

    // --- Type predicates ---

    pub fn is_string(&self) -> bool {
        matches!(self.repr, Repr::Str(_))
    }

    pub fn is_bool(&self) -> bool {
        matches!(self.repr, Repr::Bool(_))
    }

    pub fn is_integer(&self) -> bool {
        matches!(self.repr, Repr::Integer(_))
    }

    pub fn is_float(&self) -> bool {
        matches!(self.repr, Repr::Float(_))
    }

    pub fn is_number(&self) -> bool {
        self.is_integer() || self.is_float()
    }

    pub fn is_nil(&self) -> bool {
        matches!(self.repr, Repr::None)
    }

    pub fn is_list(&self) -> bool {
        matches!(self.repr, Repr::List(_))
    }

    pub fn is_dict(&self) -> bool {
        matches!(self.repr, Repr::Map(_) | Repr::Dict(_))
    }

    pub fn is_callable(&self) -> bool {
        matches!(self.repr, Repr::Callable(_))
    }

    pub fn is_iterable(&self) -> bool {
        self.is_string() || self.is_list() || self.is_dict()
    }

    pub fn is_error(&self) -> bool {
        matches!(self.repr, Repr::Error(_))
    }

    /// The error message carried by an error value, or an empty string.
    pub fn error_message(&self) -> String {
        match &self.repr {
            Repr::Error(msg) => msg.clone(),
            _ => String::new(),
        }
    }

    pub(crate) fn callable(&self) -> Option<Function> {
        match &self.repr {
            Repr::Callable(f) => Some(f.clone()),
            _ => None,
        }
    }

    // --- Coercions ---

    /// The underlying value as an integer, converting if necessary.
    /// Unconvertible values yield 0.
    pub fn as_integer(&self) -> i64 {
        match &self.repr {
            Repr::Integer(i) => *i,
            Repr::Float(f) => *f as i64,
            Repr::Bool(b) => *b as i64,
            Repr::Str(s) => s.trim().parse::<f64>().map(|f| f as i64).unwrap_or(0),
            _ => 0,
        }
    }

    /// The underlying value as a float, converting if necessary.
    /// Unconvertible values yield 0.0.
    pub fn as_float(&self) -> f64 {
        match &self.repr {
            Repr::Integer(i) => *i as f64,
            Repr::Float(f) => *f,
            Repr::Bool(b) => *b as i64 as f64,
            Repr::Str(s) => s.trim().parse::<f64>().unwrap_or(0.0),
            _ => 0.0,
        }
    }

    /// The underlying bool, or `false` for any other type. For Python-style
    /// truthiness use [`Value::is_true`].
    pub fn as_bool(&self) -> bool {
        match &self.repr {
            Repr::Bool(b) => *b,
            _ => false,
        }
    }

    /// Python-style truthiness: zero numbers, empty strings/lists/dicts,
    /// `false`, nil and errors are falsy; everything else is truthy.
    pub fn is_true(&self) -> bool {
        match &self.repr {
            Repr::None | Repr::Error(_) => false,
            Repr::Bool(b) => *b,
            Repr::Integer(i) => *i != 0,
            Repr::Float(f) => *f != 0.0,
            Repr::Str(s) => !s.is_empty(),
            Repr::List(items) => !items.borrow().is_empty(),
            Repr::Map(map) => !map.borrow().is_empty(),
            Repr::Dict(dict) => !dict.borrow().pairs.is_empty(),
            Repr::Callable(_) => true,
        }
    }

    /// Logical negation of [`Value::is_true`].
    pub fn negate(&self) -> Value {
        Value::from(!self.is_true())
    }

    /// The escaped form of the string rendering.
    pub fn escaped(&self) -> String {
        escape(&self.to_string())
    }

    // --- Length, indexing, slicing ---

    pub fn len(&self) -> usize {
        match &self.repr {
            Repr::Str(s) => s.chars().count(),
            Repr::List(items) => items.borrow().len(),
            Repr::Map(map) => map.borrow().len(),
            Repr::Dict(dict) => dict.borrow().pairs.len(),
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn can_slice(&self) -> bool {
        matches!(self.repr, Repr::Str(_) | Repr::List(_))
    }

    /// The i-th item of a list or string; nil when out of range.
    pub fn index(&self, i: usize) -> Value {
        match &self.repr {
            Repr::List(items) => items.borrow().get(i).cloned().unwrap_or_else(Value::none),
            Repr::Str(s) => s
                .chars()
                .nth(i)
                .map(|c| Value::from(c.to_string()))
                .unwrap_or_else(|| Value::from("")),
            _ => Value::none(),
        }
    }

    /// Slices a list or string by character positions. Bounds are clamped.
    pub fn slice(&self, from: usize, to: usize) -> Value {
        match &self.repr {
            Repr::List(items) => {
                let items = items.borrow();
                let to = to.min(items.len());
                let from = from.min(to);
                Value::from_list(items[from..to].to_vec())
            }
            Repr::Str(s) => {
                let chars: Vec<char> = s.chars().collect();
                let to = to.min(chars.len());
                let from = from.min(to);
                Value::from(chars[from..to].iter().collect::<String>())
            }
            _ => Value::from_list(vec![]),
        }
    }

    /// Membership: substring for strings, key for mappings, element
    /// equality for lists.
    pub fn contains(&self, other: &Value) -> bool {
        match &self.repr {
            Repr::Str(s) => s.contains(&other.to_string()),
            Repr::Map(map) => map.borrow().contains_key(&other.to_string()),
            Repr::Dict(dict) => dict.borrow().get(other).is_some(),
            Repr::List(items) => items.borrow().iter().any(|v| v.equal_value_to(other)),
            _ => false,
        }
    }

    // --- Attribute and item access ---

    /// Attribute access (`a.b`). Returns the value and whether it was found.
    /// On nil the value is an error.
    ///
    /// Methods take precedence over mapping keys: `d.keys` is the method
    /// even when the mapping holds a `"keys"` entry (use `d["keys"]` for
    /// the data). Plain keys are resolved by the evaluator's getitem
    /// fallback.
    pub fn getattr(&self, name: &str) -> (Value, bool) {
        if self.is_nil() {
            return (Value::error("Can't use getattr on None"), false);
        }
        if self.is_dict() {
            let this = self.clone();
            match name {
                "keys" => {
                    return (
                        Value::from_function(move |_, _| Value::from_list(this.keys())),
                        true,
                    )
                }
                "values" => {
                    return (
                        Value::from_function(move |_, _| {
                            Value::from_list(
                                this.items().into_iter().map(|p| p.value).collect(),
                            )
                        }),
                        true,
                    )
                }
                "items" => {
                    return (
                        Value::from_function(move |_, _| {
                            Value::from_list(
                                this.items()
                                    .into_iter()
                                    .map(|p| Value::from_list(vec![p.key, p.value]))
                                    .collect(),
                            )
                        }),
                        true,
                    )
                }
                "get" => {
                    return (
                        Value::from_function(move |_, params: &VarArgs| {
                            let key = params.first();
                            let (value, found) = this.getitem(&key);
                            if found {
                                value
                            } else {
                                params.get_kwarg("default", Value::none())
                            }
                        }),
                        true,
                    )
                }
                _ => {}
            }
        }
        (Value::none(), false)
    }

    /// Item access by string key.
    pub fn getitem_str(&self, key: &str) -> (Value, bool) {
        match &self.repr {
            Repr::None => (Value::error("Can't use getitem on None"), false),
            Repr::Map(map) => match map.borrow().get(key) {
                Some(v) => (v.clone(), true),
                None => (Value::none(), false),
            },
            Repr::Dict(dict) => {
                let key = Value::from(key);
                match dict.borrow().get(&key) {
                    Some(v) => (v, true),
                    None => (Value::none(), false),
                }
            }
            _ => (Value::none(), false),
        }
    }

    /// Item access by integer index (lists, strings, integer dict keys).
    pub fn getitem_index(&self, index: i64) -> (Value, bool) {
        match &self.repr {
            Repr::None => (Value::error("Can't use getitem on None"), false),
            Repr::List(items) => {
                let items = items.borrow();
                if index >= 0 && (index as usize) < items.len() {
                    (items[index as usize].clone(), true)
                } else {
                    (Value::none(), false)
                }
            }
            Repr::Str(s) => {
                if index >= 0 {
                    match s.chars().nth(index as usize) {
                        Some(c) => (Value::from(c.to_string()), true),
                        None => (Value::none(), false),
                    }
                } else {
                    (Value::none(), false)
                }
            }
            Repr::Dict(dict) => {
                let key = Value::from(index);
                match dict.borrow().get(&key) {
                    Some(v) => (v, true),
                    None => (Value::none(), false),
                }
            }
            _ => (
                Value::error(format!(
                    "Can't access an index on type {} (variable {})",
                    self.type_name(),
                    self
                )),
                false,
            ),
        }
    }

    /// Item access with a value key, dispatching on the key type.
    pub fn getitem(&self, key: &Value) -> (Value, bool) {
        match &key.repr {
            Repr::Integer(i) => self.getitem_index(*i),
            _ => self.getitem_str(&key.to_string()),
        }
    }

    /// Tries attribute access, then item access.
    pub fn get(&self, name: &str) -> (Value, bool) {
        let (value, found) = self.getattr(name);
        if found {
            (value, found)
        } else {
            self.getitem_str(name)
        }
    }

    /// Writes through to the underlying container.
    pub fn set(&self, key: &str, value: Value) -> Result<(), String> {
        match &self.repr {
            Repr::None => Err("Can't set attribute or item on None".to_string()),
            Repr::Map(map) => {
                map.borrow_mut().insert(key.to_string(), value);
                Ok(())
            }
            Repr::Dict(dict) => {
                dict.borrow_mut().set(Value::from(key), value);
                Ok(())
            }
            _ => Err(format!(
                "Unknown type \"{}\", can't set value on \"{}\"",
                self.type_name(),
                key
            )),
        }
    }

    // --- Iteration ---

    /// Iterates over lists, mappings and strings in natural order. For
    /// mappings the callback receives key and value; for sequences the
    /// element and `None`. The callback returns `false` to stop early;
    /// `empty` runs when there is nothing to iterate.
    pub fn iterate<F, E>(&self, f: F, empty: E)
    where
        F: FnMut(usize, usize, &Value, Option<&Value>) -> bool,
        E: FnOnce(),
    {
        self.iterate_order(f, empty, false, false, false)
    }

    /// Like [`Value::iterate`] with ordering control. `sorted` forces a
    /// sort (case-insensitive unless `case_sensitive`); `reverse` walks
    /// backwards. Host mappings sort case-insensitively even unsorted.
    pub fn iterate_order<F, E>(
        &self,
        mut f: F,
        empty: E,
        reverse: bool,
        sorted: bool,
        case_sensitive: bool,
    ) where
        F: FnMut(usize, usize, &Value, Option<&Value>) -> bool,
        E: FnOnce(),
    {
        match &self.repr {
            Repr::Map(map) => {
                let map = map.borrow();
                let mut keys: Vec<String> = map.keys().cloned().collect();
                if sorted && case_sensitive {
                    keys.sort();
                } else {
                    keys.sort_by_key(|k| k.to_lowercase());
                }
                if reverse {
                    keys.reverse();
                }
                if keys.is_empty() {
                    empty();
                    return;
                }
                let count = keys.len();
                for (idx, key) in keys.iter().enumerate() {
                    let value = map.get(key).cloned().unwrap_or_else(Value::none);
                    if !f(idx, count, &Value::from(key.as_str()), Some(&value)) {
                        return;
                    }
                }
            }
            Repr::Dict(dict) => {
                let dict = dict.borrow();
                let mut pairs: Vec<Pair> = dict.pairs.clone();
                if sorted {
                    sort_values_by(&mut pairs, case_sensitive, |p| p.key.clone());
                }
                if reverse {
                    pairs.reverse();
                }
                if pairs.is_empty() {
                    empty();
                    return;
                }
                let count = pairs.len();
                for (idx, pair) in pairs.iter().enumerate() {
                    if !f(idx, count, &pair.key, Some(&pair.value)) {
                        return;
                    }
                }
            }
            Repr::List(items) => {
                let mut items: Vec<Value> = items.borrow().clone();
                if sorted {
                    sort_values_by(&mut items, case_sensitive, |v| v.clone());
                }
                if reverse {
                    items.reverse();
                }
                if items.is_empty() {
                    empty();
                    return;
                }
                let count = items.len();
                for (idx, item) in items.iter().enumerate() {
                    if !f(idx, count, item, None) {
                        return;
                    }
                }
            }
            Repr::Str(s) => {
                let mut chars: Vec<char> = s.chars().collect();
                if sorted {
                    if case_sensitive {
                        chars.sort();
                    } else {
                        chars.sort_by_key(|c| c.to_lowercase().to_string());
                    }
                }
                if reverse {
                    chars.reverse();
                }
                if chars.is_empty() {
                    empty();
                    return;
                }
                let count = chars.len();
                for (idx, c) in chars.iter().enumerate() {
                    if !f(idx, count, &Value::from(c.to_string()), None) {
                        return;
                    }
                }
            }
            _ => empty(),
        }
    }

    // --- Structural ---

    /// Value equality with integer/float cross-comparison.
    pub fn equal_value_to(&self, other: &Value) -> bool {
        match (&self.repr, &other.repr) {
            (Repr::Integer(a), Repr::Integer(b)) => a == b,
            (Repr::Integer(a), Repr::Float(b)) => (*a as f64) == *b,
            (Repr::Float(a), Repr::Integer(b)) => *a == (*b as f64),
            (Repr::Float(a), Repr::Float(b)) => a == b,
            (Repr::Str(a), Repr::Str(b)) => a == b,
            (Repr::Bool(a), Repr::Bool(b)) => a == b,
            (Repr::None, Repr::None) => true,
            (Repr::List(a), Repr::List(b)) => {
                let a = a.borrow();
                let b = b.borrow();
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.equal_value_to(y))
            }
            (Repr::Map(a), Repr::Map(b)) => {
                let a = a.borrow();
                let b = b.borrow();
                a.len() == b.len()
                    && a.iter().all(|(k, v)| {
                        b.get(k).map(|other| v.equal_value_to(other)).unwrap_or(false)
                    })
            }
            (Repr::Dict(a), Repr::Dict(b)) => {
                let a = a.borrow();
                let b = b.borrow();
                a.pairs.len() == b.pairs.len()
                    && a.pairs.iter().all(|p| {
                        b.get(&p.key)
                            .map(|other| p.value.equal_value_to(&other))
                            .unwrap_or(false)
                    })
            }
            _ => false,
        }
    }

    /// Mapping keys. Host mapping keys come back sorted case-insensitively;
    /// ordered dict keys keep their pair order.
    pub fn keys(&self) -> Vec<Value> {
        match &self.repr {
            Repr::Map(map) => {
                let map = map.borrow();
                let mut keys: Vec<String> = map.keys().cloned().collect();
                keys.sort_by_key(|k| k.to_lowercase());
                keys.into_iter().map(Value::from).collect()
            }
            Repr::Dict(dict) => dict.borrow().keys(),
            _ => Vec::new(),
        }
    }

    /// Mapping entries as pairs, in natural iteration order.
    pub fn items(&self) -> Vec<Pair> {
        match &self.repr {
            Repr::Map(map) => {
                let map = map.borrow();
                let mut keys: Vec<String> = map.keys().cloned().collect();
                keys.sort_by_key(|k| k.to_lowercase());
                keys.into_iter()
                    .map(|k| {
                        let value = map.get(&k).cloned().unwrap_or_else(Value::none);
                        Pair {
                            key: Value::from(k),
                            value,
                        }
                    })
                    .collect()
            }
            Repr::Dict(dict) => dict.borrow().pairs.clone(),
            _ => Vec::new(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match &self.repr {
            Repr::None => "none",
            Repr::Bool(_) => "bool",
            Repr::Integer(_) => "integer",
            Repr::Float(_) => "float",
            Repr::Str(_) => "string",
            Repr::List(_) => "list",
            Repr::Map(_) | Repr::Dict(_) => "dict",
            Repr::Callable(_) => "callable",
            Repr::Error(_) => "error",
        }
    }

    // --- Serde bridge ---

    /// Converts to a `serde_json::Value`; callables and error values are
    /// rejected.
    pub fn to_json(&self) -> Result<serde_json::Value, String> {
        match &self.repr {
            Repr::None => Ok(serde_json::Value::Null),
            Repr::Bool(b) => Ok(serde_json::Value::Bool(*b)),
            Repr::Integer(i) => Ok(serde_json::Value::from(*i)),
            Repr::Float(f) => Ok(serde_json::Value::from(*f)),
            Repr::Str(s) => Ok(serde_json::Value::from(s.as_str())),
            Repr::List(items) => {
                let mut out = Vec::new();
                for item in items.borrow().iter() {
                    out.push(item.to_json()?);
                }
                Ok(serde_json::Value::Array(out))
            }
            Repr::Map(map) => {
                let mut out = serde_json::Map::new();
                for (k, v) in map.borrow().iter() {
                    out.insert(k.clone(), v.to_json()?);
                }
                Ok(serde_json::Value::Object(out))
            }
            Repr::Dict(dict) => {
                let mut out = serde_json::Map::new();
                for pair in dict.borrow().pairs.iter() {
                    out.insert(pair.key.to_string(), pair.value.to_json()?);
                }
                Ok(serde_json::Value::Object(out))
            }
            Repr::Callable(_) => Err("a callable is not JSON serializable".to_string()),
            Repr::Error(msg) => Err(msg.clone()),
        }
    }
}

fn sort_values_by<T, F>(items: &mut [T], case_sensitive: bool, key: F)
where
    F: Fn(&T) -> Value,
{
    items.sort_by(|a, b| compare_values(&key(a), &key(b), case_sensitive));
}

/// Ordering used by `sort`, `dictsort` and sorted iteration: numbers by
/// value, everything else by string form.
pub(crate) fn compare_values(a: &Value, b: &Value, case_sensitive: bool) -> std::cmp::Ordering {
    use std::cmp::Ordering;
    if a.is_number() && b.is_number() {
        return a
            .as_float()
            .partial_cmp(&b.as_float())
            .unwrap_or(Ordering::Equal);
    }
    if case_sensitive {
        a.to_string().cmp(&b.to_string())
    } else {
        a.to_string().to_lowercase().cmp(&b.to_string().to_lowercase())
    }
}

/// Formats a float the way templates print them: a decimal point is always
/// present (`4.0`, `0.5`).
pub(crate) fn format_float(f: f64) -> String {
    if f.is_infinite() || f.is_nan() {
        return f.to_string();
    }
    let mut out = format!("{:.11}", f);
    if out.contains('.') {
        out = out.trim_end_matches('0').to_string();
        if out.ends_with('.') {
            out.push('0');
        }
    }
    out
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.repr {
            Repr::None => Ok(()),
            Repr::Bool(b) => write!(f, "{}", if *b { "True" } else { "False" }),
            Repr::Integer(i) => write!(f, "{}", i),
            Repr::Float(x) => write!(f, "{}", format_float(*x)),
            Repr::Str(s) => write!(f, "{}", s),
            Repr::List(items) => {
                write!(f, "[")?;
                for (idx, item) in items.borrow().iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    if item.is_string() {
                        write!(f, "'{}'", item)?;
                    } else {
                        write!(f, "{}", item)?;
                    }
                }
                write!(f, "]")
            }
            Repr::Map(_) => {
                let mut pairs: Vec<String> = self
                    .items()
                    .iter()
                    .map(|p| format_pair(&p.key, &p.value))
                    .collect();
                pairs.sort();
                write!(f, "{{{}}}", pairs.join(", "))
            }
            Repr::Dict(dict) => {
                let pairs: Vec<String> = dict
                    .borrow()
                    .pairs
                    .iter()
                    .map(|p| format_pair(&p.key, &p.value))
                    .collect();
                write!(f, "{{{}}}", pairs.join(", "))
            }
            Repr::Callable(_) => write!(f, "<callable>"),
            Repr::Error(msg) => write!(f, "{}", msg),
        }
    }
}

fn format_pair(key: &Value, value: &Value) -> String {
    let key = if key.is_string() {
        format!("'{}'", key)
    } else {
        key.to_string()
    };
    let value = if value.is_string() {
        format!("'{}'", value)
    } else {
        value.to_string()
    };
    format!("{}: {}", key, value)
}

impl std::fmt::Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.repr {
            Repr::Callable(_) => write!(f, "Value(<callable>)"),
            Repr::Error(msg) => write!(f, "Value(<error: {}>)", msg),
            _ => write!(f, "Value({})", self),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.equal_value_to(other)
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::none()
    }
}

// --- Conversions from host types ---

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value {
            repr: Repr::Bool(v),
            safe: false,
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value {
            repr: Repr::Integer(v),
            safe: false,
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::from(v as i64)
    }
}

impl From<usize> for Value {
    fn from(v: usize) -> Self {
        Value::from(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value {
            repr: Repr::Float(v),
            safe: false,
        }
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value {
            repr: Repr::Str(v.to_string()),
            safe: false,
        }
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value {
            repr: Repr::Str(v),
            safe: false,
        }
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::from_list(v)
    }
}

impl From<Dict> for Value {
    fn from(v: Dict) -> Self {
        Value::from_dict(v)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::none(),
            serde_json::Value::Bool(b) => Value::from(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::from(i)
                } else {
                    Value::from(n.as_f64().unwrap_or(0.0))
                }
            }
            serde_json::Value::String(s) => Value::from(s),
            serde_json::Value::Array(items) => {
                Value::from_list(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                let mut out = IndexMap::new();
                for (k, v) in map {
                    out.insert(k, Value::from(v));
                }
                Value::from_map(out)
            }
        }
    }
}

/// Converts any serializable host value into a [`Value`].
pub fn to_value<T: serde::Serialize>(value: &T) -> Result<Value, String> {
    serde_json::to_value(value)
        .map(Value::from)
        .map_err(|e| e.to_string())
}
