//! `macro`: named, parameterised template fragments.

use std::sync::Arc;

use crate::error::{GingerError, ParseErrorKind, RenderError};
use crate::nodes::MacroNode;
use crate::parser::Parser;
use crate::renderer::{macro_to_function, Renderer};
use crate::statements::Statement;
use crate::tokens::{Token, TokenType};

#[derive(Debug)]
pub struct MacroStmt {
    node: Arc<MacroNode>,
}

impl std::fmt::Display for MacroStmt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let t = self.node.position();
        write!(
            f,
            "MacroStmt(Macro={} Line={} Col={})",
            self.node, t.line, t.col
        )
    }
}

impl Statement for MacroStmt {
    fn position(&self) -> &Token {
        self.node.position()
    }

    fn execute(&self, r: &mut Renderer<'_>) -> Result<(), RenderError> {
        let f = macro_to_function(&self.node, &r.config, &r.ctx, &r.root).map_err(|err| {
            RenderError::Statement {
                name: "macro".to_string(),
                message: err,
            }
        })?;
        r.ctx.set(self.node.name.clone(), f);
        Ok(())
    }
}

pub fn parse_macro(
    p: &mut Parser<'_>,
    args: &mut Parser<'_>,
) -> Result<Box<dyn Statement>, GingerError> {
    let location = p.current_token().clone();

    let name = match args.match_type(TokenType::Name) {
        Some(tok) => tok.val,
        None => {
            return Err(args.error_here(ParseErrorKind::Message(
                "Macro-tag needs at least an identifier as name".to_string(),
            )))
        }
    };

    if args.match_type(TokenType::Lparen).is_none() {
        return Err(args.error_here(ParseErrorKind::Expected {
            description: "'('".to_string(),
        }));
    }

    let mut positional = Vec::new();
    let mut defaults = Vec::new();
    while args.match_type(TokenType::Rparen).is_none() {
        let arg_name = match args.match_type(TokenType::Name) {
            Some(tok) => tok.val,
            None => {
                return Err(args.error_here(ParseErrorKind::Expected {
                    description: "argument name as identifier".to_string(),
                }))
            }
        };
        if args.match_type(TokenType::Assign).is_some() {
            let default = args.parse_expression()?;
            defaults.push((arg_name, default));
        } else {
            positional.push(arg_name);
        }

        if args.match_type(TokenType::Rparen).is_some() {
            break;
        }
        if args.match_type(TokenType::Comma).is_none() {
            return Err(args.error_here(ParseErrorKind::Expected {
                description: "',' or ')'".to_string(),
            }));
        }
    }

    if !args.end() {
        return Err(args.error_here(ParseErrorKind::Message(
            "Malformed macro-tag".to_string(),
        )));
    }

    let (wrapper, endargs) = p.wrap_until(&["endmacro"])?;
    if !endargs.end() {
        return Err(endargs.error_here(ParseErrorKind::Message(
            "Arguments not allowed here".to_string(),
        )));
    }

    let node = Arc::new(MacroNode {
        location,
        name: name.clone(),
        args: positional,
        defaults,
        wrapper: Arc::new(wrapper),
    });
    p.macros.insert(name, Arc::clone(&node));

    Ok(Box::new(MacroStmt { node }))
}
