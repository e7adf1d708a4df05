//! `set` and `with`: context bindings.

use std::sync::Arc;

use crate::error::{GingerError, ParseErrorKind, RenderError};
use crate::nodes::{Expression, Subscript, Wrapper};
use crate::parser::Parser;
use crate::renderer::{Output, Renderer};
use crate::statements::Statement;
use crate::tokens::{Token, TokenType};
use crate::value::Value;

#[derive(Debug)]
pub struct SetStmt {
    location: Token,
    target: Expression,
    expression: Option<Expression>,
    /// The `{% set x %} … {% endset %}` block form captures rendered
    /// output instead of evaluating an expression.
    wrapper: Option<Arc<Wrapper>>,
}

impl std::fmt::Display for SetStmt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "SetStmt(Line={} Col={})",
            self.location.line, self.location.col
        )
    }
}

impl Statement for SetStmt {
    fn position(&self) -> &Token {
        &self.location
    }

    fn execute(&self, r: &mut Renderer<'_>) -> Result<(), RenderError> {
        let value = if let Some(expression) = &self.expression {
            let value = r.eval(expression);
            if value.is_error() {
                return Err(RenderError::Eval {
                    message: value.error_message(),
                });
            }
            value
        } else if let Some(wrapper) = &self.wrapper {
            let mut out = Output::new();
            {
                let mut sub = Renderer::new(
                    r.config.inherit(),
                    r.ctx.inherit(),
                    Arc::clone(&r.root),
                    &mut out,
                );
                sub.execute_wrapper(wrapper)?;
            }
            Value::from(out.into_string())
        } else {
            return Err(RenderError::Message(
                "no value is given in the set block".to_string(),
            ));
        };

        match &self.target {
            Expression::Name(tok) => {
                r.ctx.set(tok.val.clone(), value);
                Ok(())
            }
            Expression::Getattr { node, attr, .. } => {
                assign_through(r, node, attr, value)
            }
            Expression::Getitem { node, key, .. } => {
                assign_through(r, node, key, value)
            }
            other => Err(RenderError::Message(format!(
                "Illegal set target node {}",
                other
            ))),
        }
    }
}

fn assign_through(
    r: &Renderer<'_>,
    node: &Expression,
    part: &Subscript,
    value: Value,
) -> Result<(), RenderError> {
    let target = r.eval(node);
    if target.is_error() {
        return Err(RenderError::Eval {
            message: format!(
                "Unable to evaluate target {}: {}",
                node,
                target.error_message()
            ),
        });
    }
    let key = match part {
        Subscript::Name(name) => name.clone(),
        Subscript::Index(index) => index.to_string(),
    };
    target.set(&key, value).map_err(|err| RenderError::Message(format!(
        "Unable to set value on \"{}\": {}",
        key, err
    )))
}

pub fn parse_set(
    p: &mut Parser<'_>,
    args: &mut Parser<'_>,
) -> Result<Box<dyn Statement>, GingerError> {
    let location = p.current_token().clone();

    let target = args.parse_variable()?;
    match &target {
        Expression::Name(_) | Expression::Getattr { .. } | Expression::Getitem { .. } => {}
        other => {
            return Err(args.error_here(ParseErrorKind::Message(format!(
                "Unexpected set target {}",
                other
            ))))
        }
    }

    if args.match_type(TokenType::Assign).is_none() {
        let (wrapper, endargs) = p.wrap_until(&["endset"])?;
        if !endargs.end() {
            return Err(endargs.error_here(ParseErrorKind::Message(
                "Arguments not allowed here".to_string(),
            )));
        }
        return Ok(Box::new(SetStmt {
            location,
            target,
            expression: None,
            wrapper: Some(Arc::new(wrapper)),
        }));
    }

    let expression = args.parse_expression()?;
    if !args.end() {
        return Err(args.error_here(ParseErrorKind::Message(
            "Malformed 'set'-tag args".to_string(),
        )));
    }
    Ok(Box::new(SetStmt {
        location,
        target,
        expression: Some(expression),
        wrapper: None,
    }))
}

#[derive(Debug)]
pub struct WithStmt {
    location: Token,
    pairs: Vec<(String, Expression)>,
    wrapper: Arc<Wrapper>,
}

impl std::fmt::Display for WithStmt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "WithStmt(Line={} Col={})",
            self.location.line, self.location.col
        )
    }
}

impl Statement for WithStmt {
    fn position(&self) -> &Token {
        &self.location
    }

    fn execute(&self, r: &mut Renderer<'_>) -> Result<(), RenderError> {
        // Pairs evaluate in the enclosing scope, then bind in a child
        // frame that dies with the wrapper.
        let mut bindings = Vec::with_capacity(self.pairs.len());
        for (key, expression) in &self.pairs {
            let value = r.eval(expression);
            if value.is_error() {
                return Err(RenderError::Eval {
                    message: format!(
                        "unable to evaluate parameter {}: {}",
                        expression,
                        value.error_message()
                    ),
                });
            }
            bindings.push((key.clone(), value));
        }
        let mut sub = r.inherit();
        for (key, value) in bindings {
            sub.ctx.set(key, value);
        }
        sub.execute_wrapper(&self.wrapper)
    }
}

pub fn parse_with(
    p: &mut Parser<'_>,
    args: &mut Parser<'_>,
) -> Result<Box<dyn Statement>, GingerError> {
    let location = p.current_token().clone();

    let mut pairs = Vec::new();
    while !args.end() {
        let key = match args.match_type(TokenType::Name) {
            Some(tok) => tok.val,
            None => {
                return Err(args.error_here(ParseErrorKind::Expected {
                    description: "an identifier".to_string(),
                }))
            }
        };
        if args.match_type(TokenType::Assign).is_none() {
            return Err(args.error_here(ParseErrorKind::Expected {
                description: "'='".to_string(),
            }));
        }
        pairs.push((key, args.parse_expression()?));
        if args.match_type(TokenType::Comma).is_none() {
            break;
        }
    }
    if !args.end() {
        return Err(args.error_here(ParseErrorKind::Message(
            "Malformed 'with'-tag args".to_string(),
        )));
    }

    let (wrapper, endargs) = p.wrap_until(&["endwith"])?;
    if !endargs.end() {
        return Err(endargs.error_here(ParseErrorKind::Message(
            "Arguments not allowed here".to_string(),
        )));
    }

    Ok(Box::new(WithStmt {
        location,
        pairs,
        wrapper: Arc::new(wrapper),
    }))
}
