//! Expression evaluation.
//!
//! The [`Evaluator`] walks expression nodes against a [`Context`] and the
//! shared [`EvalConfig`] (registries, loader, configuration). Failures are
//! carried as error values, not `Err`s: filters see them and pass them
//! through, and they only abort the render once they reach an output node
//! or statement.

use std::sync::Arc;

use indexmap::IndexMap;
use log::trace;

use crate::config::Config;
use crate::context::Context;
use crate::error::{GingerError, LoaderError};
use crate::loader::Loader;
use crate::nodes::{Expression, FilterCall, Subscript, TemplateNode, TestCall};
use crate::parser;
use crate::statements::StatementSet;
use crate::value::{Dict, Pair, Value};
use crate::varargs::VarArgs;

/// The type filter functions must fulfil.
pub type FilterFunction = fn(&Evaluator<'_>, &Value, &VarArgs) -> Value;

/// The type test functions must fulfil.
pub type TestFunction = fn(&Context, &Value, &VarArgs) -> Result<bool, String>;

/// A global exposed to every render.
#[derive(Debug, Clone)]
pub enum Global {
    Data(serde_json::Value),
    Function(fn(&Evaluator<'_>, &VarArgs) -> Value),
}

impl Global {
    pub fn to_value(&self) -> Value {
        match self {
            Global::Data(data) => Value::from(data.clone()),
            Global::Function(f) => {
                let f = *f;
                Value::from_function(move |e, va| f(e, va))
            }
        }
    }
}

macro_rules! registry {
    ($name:ident, $func:ty, $label:literal) => {
        #[derive(Debug, Clone, Default)]
        pub struct $name {
            entries: IndexMap<String, $func>,
        }

        impl $name {
            pub fn new() -> Self {
                Self::default()
            }

            pub fn exists(&self, name: &str) -> bool {
                self.entries.contains_key(name)
            }

            pub fn get(&self, name: &str) -> Option<&$func> {
                self.entries.get(name)
            }

            /// Registers a new entry. Fails if the name is taken.
            pub fn register(&mut self, name: &str, f: $func) -> Result<(), String> {
                if self.exists(name) {
                    return Err(format!(
                        concat!($label, " with name '{}' is already registered"),
                        name
                    ));
                }
                self.entries.insert(name.to_string(), f);
                Ok(())
            }

            /// Replaces an existing entry. Fails if the name is unknown.
            pub fn replace(&mut self, name: &str, f: $func) -> Result<(), String> {
                if !self.exists(name) {
                    return Err(format!(
                        concat!(
                            $label,
                            " with name '{}' does not exist (therefore cannot be overridden)"
                        ),
                        name
                    ));
                }
                self.entries.insert(name.to_string(), f);
                Ok(())
            }

            /// Bulk merge, overwriting existing entries.
            pub fn update(&mut self, other: &$name) {
                for (name, f) in &other.entries {
                    self.entries.insert(name.clone(), *f);
                }
            }
        }
    };
}

registry!(FilterSet, FilterFunction, "filter");
registry!(TestSet, TestFunction, "test");

/// Globals registry: names bound into the root context of every render.
#[derive(Debug, Clone, Default)]
pub struct GlobalsSet {
    entries: IndexMap<String, Global>,
}

impl GlobalsSet {
    pub fn new() -> Self {
        GlobalsSet::default()
    }

    pub fn set(&mut self, name: impl Into<String>, global: Global) {
        self.entries.insert(name.into(), global);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Global)> {
        self.entries.iter()
    }
}

/// Evaluation configuration: behaviour flags plus the pluggable
/// registries, shared by every renderer and evaluator of a template.
#[derive(Clone)]
pub struct EvalConfig {
    pub config: Config,
    pub filters: Arc<FilterSet>,
    pub statements: Arc<StatementSet>,
    pub tests: Arc<TestSet>,
    pub globals: Arc<GlobalsSet>,
    pub loader: Option<Arc<dyn Loader>>,
}

impl EvalConfig {
    pub fn new(config: Config) -> Self {
        EvalConfig {
            config,
            filters: Arc::new(FilterSet::new()),
            statements: Arc::new(StatementSet::new()),
            tests: Arc::new(TestSet::new()),
            globals: Arc::new(GlobalsSet::new()),
            loader: None,
        }
    }

    /// Child copy for scoped overrides; registries stay shared.
    pub fn inherit(&self) -> EvalConfig {
        EvalConfig {
            config: self.config.inherit(),
            filters: Arc::clone(&self.filters),
            statements: Arc::clone(&self.statements),
            tests: Arc::clone(&self.tests),
            globals: Arc::clone(&self.globals),
            loader: self.loader.clone(),
        }
    }

    /// Loads and parses the template behind `name` through the loader.
    pub fn get_template(&self, name: &str) -> Result<Arc<TemplateNode>, GingerError> {
        let loader = self
            .loader
            .as_ref()
            .ok_or(GingerError::Loader(LoaderError::NoLoader))?;
        let path = loader.path(name)?;
        let source = loader.get(&path)?;
        let source = crate::template::prepare_source(source, &self.config);
        let root = parser::parse(
            name,
            &source,
            &self.config,
            &self.statements,
            Some(&|n: &str| self.get_template(n)),
        )?;
        Ok(Arc::new(root))
    }
}

pub struct Evaluator<'a> {
    pub config: &'a EvalConfig,
    pub ctx: &'a Context,
}

impl<'a> Evaluator<'a> {
    pub fn new(config: &'a EvalConfig, ctx: &'a Context) -> Self {
        Evaluator { config, ctx }
    }

    pub fn eval(&self, node: &Expression) -> Value {
        trace!("eval: {}", node);
        match node {
            Expression::None(_) => Value::none(),
            Expression::Bool(_, v) => Value::from(*v),
            Expression::Integer(_, v) => Value::from(*v),
            Expression::Float(_, v) => Value::from(*v),
            Expression::Str(_, v) => Value::from(v.as_str()),
            Expression::List { items, .. } | Expression::Tuple { items, .. } => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    let value = self.eval(item);
                    if value.is_error() {
                        return value;
                    }
                    values.push(value);
                }
                Value::from_list(values)
            }
            Expression::Dict { pairs, .. } => {
                let mut dict = Dict::new();
                for pair in pairs {
                    let key = self.eval(&pair.key);
                    if key.is_error() {
                        return key;
                    }
                    let value = self.eval(&pair.value);
                    if value.is_error() {
                        return value;
                    }
                    dict.pairs.push(Pair { key, value });
                }
                Value::from_dict(dict)
            }
            Expression::Name(tok) => self.eval_name(&tok.val),
            Expression::Getattr { node, attr, .. } => self.eval_getattr(node, attr),
            Expression::Getitem { node, key, .. } => self.eval_getitem(node, key),
            Expression::Call {
                func, args, kwargs, ..
            } => self.eval_call(func, args, kwargs),
            Expression::Negation { term, .. } => {
                let result = self.eval(term);
                if result.is_error() {
                    return result;
                }
                result.negate()
            }
            Expression::Unary {
                negative, term, ..
            } => self.eval_unary(*negative, term),
            Expression::Binary { op, left, right } => self.eval_binary(&op.val, left, right),
            Expression::Filtered {
                expression,
                filters,
            } => self.eval_filtered(expression, filters),
            Expression::Test { expression, test } => self.eval_test(expression, test),
        }
    }

    fn eval_name(&self, name: &str) -> Value {
        match self.ctx.get(name) {
            Some(value) => value,
            None if self.config.config.strict_undefined => {
                Value::error(format!("Unable to evaluate name \"{}\"", name))
            }
            None => Value::none(),
        }
    }

    /// `a.b`: attribute first, then item, per the access protocol.
    fn eval_getattr(&self, node: &Expression, attr: &Subscript) -> Value {
        let value = self.eval(node);
        if value.is_error() {
            return value;
        }
        let (result, found) = match attr {
            Subscript::Name(name) => {
                let (result, found) = value.getattr(name);
                if found {
                    (result, found)
                } else {
                    value.getitem_str(name)
                }
            }
            Subscript::Index(index) => value.getitem_index(*index),
        };
        if found {
            return result;
        }
        if result.is_error() {
            return result;
        }
        if self.config.config.strict_undefined {
            return Value::error(format!(
                "Unable to evaluate {}.{}: attribute not found",
                node, attr
            ));
        }
        Value::none()
    }

    /// `a[k]`: item first, then attribute.
    fn eval_getitem(&self, node: &Expression, key: &Subscript) -> Value {
        let value = self.eval(node);
        if value.is_error() {
            return value;
        }
        let (result, found) = match key {
            Subscript::Name(name) => {
                let (result, found) = value.getitem_str(name);
                if found {
                    (result, found)
                } else {
                    value.getattr(name)
                }
            }
            Subscript::Index(index) => value.getitem_index(*index),
        };
        if found {
            return result;
        }
        if result.is_error() {
            return result;
        }
        if self.config.config.strict_undefined {
            return Value::error(format!(
                "Unable to evaluate {}[{}]: item not found",
                node, key
            ));
        }
        Value::none()
    }

    fn eval_call(
        &self,
        func: &Expression,
        args: &[Expression],
        kwargs: &[(String, Expression)],
    ) -> Value {
        let callee = self.eval(func);
        if callee.is_error() {
            return Value::error(format!(
                "Unable to evaluate function \"{}\": {}",
                func,
                callee.error_message()
            ));
        }
        let f = match callee.callable() {
            Some(f) => f,
            None => return Value::error(format!("{} is not callable", func)),
        };
        let mut params = VarArgs::new();
        for arg in args {
            let value = self.eval(arg);
            if value.is_error() {
                return value;
            }
            params.args.push(value);
        }
        for (key, arg) in kwargs {
            let value = self.eval(arg);
            if value.is_error() {
                return value;
            }
            params.kwargs.insert(key.clone(), value);
        }
        f(self, &params)
    }

    fn eval_unary(&self, negative: bool, term: &Expression) -> Value {
        let result = self.eval(term);
        if result.is_error() {
            return result;
        }
        if !negative {
            return result;
        }
        if result.is_float() {
            Value::from(-result.as_float())
        } else if result.is_integer() {
            Value::from(-result.as_integer())
        } else {
            Value::error(format!(
                "Negative sign on a non-number expression {}",
                term
            ))
        }
    }

    fn eval_binary(&self, op: &str, left_node: &Expression, right_node: &Expression) -> Value {
        let left = self.eval(left_node);
        if left.is_error() {
            return Value::error(format!(
                "Unable to evaluate left parameter {}: {}",
                left_node,
                left.error_message()
            ));
        }

        // Short-circuit operators evaluate the right side lazily.
        match op {
            "and" => {
                if !left.is_true() {
                    return Value::from(false);
                }
                let right = self.eval(right_node);
                if right.is_error() {
                    return right;
                }
                return Value::from(right.is_true());
            }
            "or" => {
                if left.is_true() {
                    return Value::from(true);
                }
                let right = self.eval(right_node);
                if right.is_error() {
                    return right;
                }
                return Value::from(right.is_true());
            }
            _ => {}
        }

        let right = self.eval(right_node);
        if right.is_error() {
            return Value::error(format!(
                "Unable to evaluate right parameter {}: {}",
                right_node,
                right.error_message()
            ));
        }

        match op {
            "+" => {
                if left.is_list() {
                    if !right.is_list() {
                        return Value::error(format!(
                            "Unable to concatenate list to {}",
                            right_node
                        ));
                    }
                    let mut items = Vec::new();
                    left.iterate(
                        |_, _, v, _| {
                            items.push(v.clone());
                            true
                        },
                        || {},
                    );
                    right.iterate(
                        |_, _, v, _| {
                            items.push(v.clone());
                            true
                        },
                        || {},
                    );
                    return Value::from_list(items);
                }
                if left.is_float() || right.is_float() {
                    Value::from(left.as_float() + right.as_float())
                } else {
                    Value::from(left.as_integer() + right.as_integer())
                }
            }
            "-" => {
                if left.is_float() || right.is_float() {
                    Value::from(left.as_float() - right.as_float())
                } else {
                    Value::from(left.as_integer() - right.as_integer())
                }
            }
            "*" => {
                if left.is_float() || right.is_float() {
                    return Value::from(left.as_float() * right.as_float());
                }
                if left.is_string() {
                    let count = right.as_integer().max(0) as usize;
                    return Value::from(left.to_string().repeat(count));
                }
                Value::from(left.as_integer() * right.as_integer())
            }
            "/" => {
                if right.as_float() == 0.0 {
                    return Value::error("Division by zero");
                }
                Value::from(left.as_float() / right.as_float())
            }
            "//" => {
                if right.as_float() == 0.0 {
                    return Value::error("Division by zero");
                }
                Value::from((left.as_float() / right.as_float()).floor() as i64)
            }
            "%" => {
                if right.as_integer() == 0 {
                    return Value::error("Division by zero");
                }
                Value::from(left.as_integer() % right.as_integer())
            }
            "**" => {
                // Integral result for integer base and non-negative
                // integer exponent, so `-2 ** 2` renders as -4.
                if left.is_integer() && right.is_integer() && right.as_integer() >= 0 {
                    let exp = right.as_integer();
                    if exp <= u32::MAX as i64 {
                        return Value::from(left.as_integer().pow(exp as u32));
                    }
                }
                Value::from(left.as_float().powf(right.as_float()))
            }
            "~" => Value::from(format!("{}{}", left, right)),
            "==" => Value::from(left.equal_value_to(&right)),
            "!=" | "<>" => Value::from(!left.equal_value_to(&right)),
            "<=" => {
                if left.is_float() || right.is_float() {
                    Value::from(left.as_float() <= right.as_float())
                } else {
                    Value::from(left.as_integer() <= right.as_integer())
                }
            }
            ">=" => {
                if left.is_float() || right.is_float() {
                    Value::from(left.as_float() >= right.as_float())
                } else {
                    Value::from(left.as_integer() >= right.as_integer())
                }
            }
            "<" => {
                if left.is_float() || right.is_float() {
                    Value::from(left.as_float() < right.as_float())
                } else {
                    Value::from(left.as_integer() < right.as_integer())
                }
            }
            ">" => {
                if left.is_float() || right.is_float() {
                    Value::from(left.as_float() > right.as_float())
                } else {
                    Value::from(left.as_integer() > right.as_integer())
                }
            }
            "in" => Value::from(right.contains(&left)),
            "not in" => Value::from(!right.contains(&left)),
            _ => Value::error(format!("Unknown operator \"{}\"", op)),
        }
    }

    /// Runs a filter chain, piping each result into the next filter.
    fn eval_filtered(&self, expression: &Expression, filters: &[FilterCall]) -> Value {
        let mut value = self.eval(expression);
        for filter in filters {
            value = self.execute_filter(filter, &value);
        }
        value
    }

    /// Executes one filter call: argument expressions are evaluated in the
    /// enclosing context, then the registered function is applied.
    pub fn execute_filter(&self, fc: &FilterCall, value: &Value) -> Value {
        let mut params = VarArgs::new();
        for arg in &fc.args {
            let arg_value = self.eval(arg);
            if arg_value.is_error() {
                return arg_value;
            }
            params.args.push(arg_value);
        }
        for (key, arg) in &fc.kwargs {
            let arg_value = self.eval(arg);
            if arg_value.is_error() {
                return arg_value;
            }
            params.kwargs.insert(key.clone(), arg_value);
        }
        self.execute_filter_by_name(&fc.name, value, &params)
    }

    pub fn execute_filter_by_name(&self, name: &str, value: &Value, params: &VarArgs) -> Value {
        match self.config.filters.get(name) {
            Some(f) => f(self, value, params),
            None => Value::error(format!("Filter \"{}\" not found", name)),
        }
    }

    fn eval_test(&self, expression: &Expression, test: &TestCall) -> Value {
        let value = self.eval(expression);
        self.execute_test(test, &value)
    }

    pub fn execute_test(&self, tc: &TestCall, value: &Value) -> Value {
        let mut params = VarArgs::new();
        for arg in &tc.args {
            let arg_value = self.eval(arg);
            if arg_value.is_error() {
                return arg_value;
            }
            params.args.push(arg_value);
        }
        for (key, arg) in &tc.kwargs {
            let arg_value = self.eval(arg);
            if arg_value.is_error() {
                return arg_value;
            }
            params.kwargs.insert(key.clone(), arg_value);
        }
        self.execute_test_by_name(&tc.name, value, &params)
    }

    pub fn execute_test_by_name(&self, name: &str, value: &Value, params: &VarArgs) -> Value {
        match self.config.tests.get(name) {
            Some(test) => match test(self.ctx, value, params) {
                Ok(result) => Value::from(result),
                Err(err) => Value::error(format!("Unable to execute test {}: {}", name, err)),
            },
            None => Value::error(format!("Test \"{}\" not found", name)),
        }
    }
}
