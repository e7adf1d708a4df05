//! `if` and `for`.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::{GingerError, ParseErrorKind, RenderError};
use crate::eval::Evaluator;
use crate::nodes::{Expression, Wrapper};
use crate::parser::Parser;
use crate::renderer::Renderer;
use crate::statements::Statement;
use crate::tokens::{Token, TokenType};
use crate::value::Value;
use crate::varargs::VarArgs;

#[derive(Debug)]
pub struct IfStmt {
    location: Token,
    conditions: Vec<Expression>,
    wrappers: Vec<Arc<Wrapper>>,
}

impl std::fmt::Display for IfStmt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "IfStmt(Line={} Col={})",
            self.location.line, self.location.col
        )
    }
}

impl Statement for IfStmt {
    fn position(&self) -> &Token {
        &self.location
    }

    fn execute(&self, r: &mut Renderer<'_>) -> Result<(), RenderError> {
        for (i, condition) in self.conditions.iter().enumerate() {
            let result = r.eval(condition);
            if result.is_error() {
                return Err(RenderError::Eval {
                    message: result.error_message(),
                });
            }
            if result.is_true() {
                return r.execute_wrapper(&self.wrappers[i]);
            }
            // Last condition falsy: run the trailing else wrapper if any.
            if i + 1 == self.conditions.len() && self.wrappers.len() > i + 1 {
                return r.execute_wrapper(&self.wrappers[i + 1]);
            }
        }
        Ok(())
    }
}

pub fn parse_if(
    p: &mut Parser<'_>,
    args: &mut Parser<'_>,
) -> Result<Box<dyn Statement>, GingerError> {
    let location = args.current_token().clone();
    let mut conditions = vec![args.parse_expression()?];
    let mut wrappers = Vec::new();

    if !args.end() {
        return Err(args.error_here(ParseErrorKind::Message(
            "If-condition is malformed".to_string(),
        )));
    }

    loop {
        let (wrapper, mut tag_args) = p.wrap_until(&["elif", "else", "endif"])?;
        let end_tag = wrapper.end_tag.clone();
        wrappers.push(Arc::new(wrapper));

        if end_tag == "elif" {
            conditions.push(tag_args.parse_expression()?);
            if !tag_args.end() {
                return Err(tag_args.error_here(ParseErrorKind::Message(
                    "Elif-condition is malformed".to_string(),
                )));
            }
        } else if !tag_args.end() {
            return Err(tag_args.error_here(ParseErrorKind::Message(
                "Arguments not allowed here".to_string(),
            )));
        }

        if end_tag == "endif" {
            break;
        }
    }

    Ok(Box::new(IfStmt {
        location,
        conditions,
        wrappers,
    }))
}

#[derive(Debug)]
pub struct ForStmt {
    location: Token,
    key: String,
    /// Second loop name, for `for key, value in mapping`.
    value: Option<String>,
    object: Expression,
    condition: Option<Expression>,
    body: Arc<Wrapper>,
    empty: Option<Arc<Wrapper>>,
}

impl std::fmt::Display for ForStmt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ForStmt(Line={} Col={})",
            self.location.line, self.location.col
        )
    }
}

impl Statement for ForStmt {
    fn position(&self) -> &Token {
        &self.location
    }

    fn execute(&self, r: &mut Renderer<'_>) -> Result<(), RenderError> {
        let obj = r.eval(&self.object);
        if obj.is_error() {
            return Err(RenderError::Eval {
                message: obj.error_message(),
            });
        }

        // First pass: unpack names and filter through the `if` clause, so
        // that loop metadata reflects the filtered sequence. The condition
        // runs before `loop` exists and must not reference it.
        let mut items: Vec<(Value, Option<Value>)> = Vec::new();
        obj.iterate(
            |_, _, key, value| {
                let ctx = r.ctx.inherit();
                let item = if self.value.is_some() {
                    if let Some(value) = value {
                        (key.clone(), Some(value.clone()))
                    } else if !key.is_string() && key.len() == 2 {
                        (key.index(0), Some(key.index(1)))
                    } else {
                        (key.clone(), None)
                    }
                } else {
                    (key.clone(), value.cloned())
                };
                ctx.set(self.key.clone(), item.0.clone());
                if let (Some(name), Some(value)) = (&self.value, &item.1) {
                    ctx.set(name.clone(), value.clone());
                }
                if let Some(condition) = &self.condition {
                    if !Evaluator::new(&r.config, &ctx).eval(condition).is_true() {
                        return true;
                    }
                }
                items.push(item);
                true
            },
            || {},
        );

        if items.is_empty() {
            if let Some(empty) = &self.empty {
                return r.execute_wrapper(empty);
            }
            return Ok(());
        }

        // Second pass: render with the loop record bound.
        let length = items.len();
        let changed = Rc::new(RefCell::new(None));
        for idx in 0..length {
            let mut sub = r.inherit();
            let (key, value) = &items[idx];
            sub.ctx.set(self.key.clone(), key.clone());
            if let (Some(name), Some(value)) = (&self.value, value) {
                sub.ctx.set(name.clone(), value.clone());
            }
            sub.ctx
                .set("loop", loop_value(idx, length, &items, Rc::clone(&changed)));
            sub.execute_wrapper(&self.body)?;
        }
        Ok(())
    }
}

/// The record a loop item is paired with when unpacked into a single value
/// (map entries become `[key, value]`).
fn item_value(item: &(Value, Option<Value>)) -> Value {
    match &item.1 {
        Some(value) => Value::from_list(vec![item.0.clone(), value.clone()]),
        None => item.0.clone(),
    }
}

fn loop_value(
    idx: usize,
    length: usize,
    items: &[(Value, Option<Value>)],
    changed: Rc<RefCell<Option<Value>>>,
) -> Value {
    let mut map = IndexMap::new();
    map.insert("index".to_string(), Value::from(idx + 1));
    map.insert("index0".to_string(), Value::from(idx));
    map.insert("revindex".to_string(), Value::from(length - idx));
    map.insert("revindex0".to_string(), Value::from(length - idx - 1));
    map.insert("first".to_string(), Value::from(idx == 0));
    map.insert("last".to_string(), Value::from(idx + 1 == length));
    map.insert("length".to_string(), Value::from(length));

    let previtem = if idx == 0 {
        Value::none()
    } else {
        item_value(&items[idx - 1])
    };
    let nextitem = if idx + 1 == length {
        Value::none()
    } else {
        item_value(&items[idx + 1])
    };
    map.insert("previtem".to_string(), previtem.clone());
    map.insert("nextitem".to_string(), nextitem.clone());
    map.insert("PrevItem".to_string(), previtem);
    map.insert("NextItem".to_string(), nextitem);

    map.insert(
        "cycle".to_string(),
        Value::from_function(move |_, va: &VarArgs| {
            if va.args.is_empty() {
                return Value::error("loop.cycle requires at least one argument");
            }
            va.args[idx % va.args.len()].clone()
        }),
    );
    map.insert(
        "changed".to_string(),
        Value::from_function(move |_, va: &VarArgs| {
            let value = va.first();
            let mut last = changed.borrow_mut();
            let same = last
                .as_ref()
                .map(|l| value.equal_value_to(l))
                .unwrap_or(false);
            *last = Some(value);
            Value::from(!same)
        }),
    );

    Value::from_map(map)
}

pub fn parse_for(
    p: &mut Parser<'_>,
    args: &mut Parser<'_>,
) -> Result<Box<dyn Statement>, GingerError> {
    let location = args.current_token().clone();

    let key = match args.match_type(TokenType::Name) {
        Some(tok) => tok.val,
        None => {
            return Err(args.error_here(ParseErrorKind::Message(
                "Expected an key identifier as first argument for 'for'-tag".to_string(),
            )))
        }
    };

    let mut value = None;
    if args.match_type(TokenType::Comma).is_some() {
        match args.match_type(TokenType::Name) {
            Some(tok) => value = Some(tok.val),
            None => {
                return Err(args.error_here(ParseErrorKind::Message(
                    "Value name must be an identifier".to_string(),
                )))
            }
        }
    }

    if args.match_name(&["in"]).is_none() {
        return Err(args.error_here(ParseErrorKind::Message(
            "Expected keyword 'in'".to_string(),
        )));
    }

    let object = args.parse_expression()?;

    let mut condition = None;
    if args.match_name(&["if"]).is_some() {
        condition = Some(args.parse_expression()?);
    }

    if !args.end() {
        return Err(args.error_here(ParseErrorKind::Message(
            "Malformed for-loop args".to_string(),
        )));
    }

    let (body, endargs) = p.wrap_until(&["else", "endfor"])?;
    if !endargs.end() {
        return Err(endargs.error_here(ParseErrorKind::Message(
            "Arguments not allowed here".to_string(),
        )));
    }

    let mut empty = None;
    if body.end_tag == "else" {
        let (wrapper, endargs) = p.wrap_until(&["endfor"])?;
        if !endargs.end() {
            return Err(endargs.error_here(ParseErrorKind::Message(
                "Arguments not allowed here".to_string(),
            )));
        }
        empty = Some(Arc::new(wrapper));
    }

    Ok(Box::new(ForStmt {
        location,
        key,
        value,
        object,
        condition,
        body: Arc::new(body),
        empty,
    }))
}
