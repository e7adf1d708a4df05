//! `filter` and `autoescape` block statements.

use std::sync::Arc;

use crate::error::{GingerError, ParseErrorKind, RenderError};
use crate::nodes::{FilterCall, Wrapper};
use crate::parser::Parser;
use crate::renderer::{Output, Renderer};
use crate::statements::Statement;
use crate::tokens::{Token, TokenType};
use crate::value::Value;

#[derive(Debug)]
pub struct FilterStmt {
    location: Token,
    body: Arc<Wrapper>,
    chain: Vec<FilterCall>,
}

impl std::fmt::Display for FilterStmt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "FilterStmt(Line={} Col={})",
            self.location.line, self.location.col
        )
    }
}

impl Statement for FilterStmt {
    fn position(&self) -> &Token {
        &self.location
    }

    fn execute(&self, r: &mut Renderer<'_>) -> Result<(), RenderError> {
        // Render the body into a side buffer, then pipe it through the
        // filter chain.
        let mut out = Output::new();
        {
            let mut sub = Renderer::new(
                r.config.inherit(),
                r.ctx.inherit(),
                Arc::clone(&r.root),
                &mut out,
            );
            sub.execute_wrapper(&self.body)?;
        }
        let mut value = Value::from(out.into_string());

        let evaluator = r.evaluator();
        for call in &self.chain {
            value = evaluator.execute_filter(call, &value);
            if value.is_error() {
                return Err(RenderError::Eval {
                    message: format!(
                        "Unable to apply filter {} (Line: {} Col: {}): {}",
                        call.name,
                        call.token.line,
                        call.token.col,
                        value.error_message()
                    ),
                });
            }
        }

        r.out.write_str(&value.to_string());
        Ok(())
    }
}

pub fn parse_filter_stmt(
    p: &mut Parser<'_>,
    args: &mut Parser<'_>,
) -> Result<Box<dyn Statement>, GingerError> {
    let location = p.current_token().clone();

    let mut chain = Vec::new();
    loop {
        chain.push(args.parse_filter()?);
        if args.match_type(TokenType::Pipe).is_none() {
            break;
        }
    }
    if !args.end() {
        return Err(args.error_here(ParseErrorKind::Message(
            "Malformed filter-tag args".to_string(),
        )));
    }

    let (body, endargs) = p.wrap_until(&["endfilter"])?;
    if !endargs.end() {
        return Err(endargs.error_here(ParseErrorKind::Message(
            "Arguments not allowed here".to_string(),
        )));
    }

    Ok(Box::new(FilterStmt {
        location,
        body: Arc::new(body),
        chain,
    }))
}

#[derive(Debug)]
pub struct AutoescapeStmt {
    location: Token,
    wrapper: Arc<Wrapper>,
    autoescape: bool,
}

impl std::fmt::Display for AutoescapeStmt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "AutoescapeStmt(Line={} Col={})",
            self.location.line, self.location.col
        )
    }
}

impl Statement for AutoescapeStmt {
    fn position(&self) -> &Token {
        &self.location
    }

    fn execute(&self, r: &mut Renderer<'_>) -> Result<(), RenderError> {
        let mut sub = r.inherit();
        sub.config.config.autoescape = self.autoescape;
        sub.execute_wrapper(&self.wrapper)
    }
}

pub fn parse_autoescape(
    p: &mut Parser<'_>,
    args: &mut Parser<'_>,
) -> Result<Box<dyn Statement>, GingerError> {
    let location = p.current_token().clone();

    let mode = match args.match_type(TokenType::Name) {
        Some(tok) => tok,
        None => {
            return Err(args.error_here(ParseErrorKind::Message(
                "A mode is required for autoescape statement".to_string(),
            )))
        }
    };
    let autoescape = match mode.val.as_str() {
        "true" => true,
        "false" => false,
        _ => {
            return Err(args.error(
                ParseErrorKind::Message(
                    "Only 'true' or 'false' is valid as an autoescape statement".to_string(),
                ),
                &mode,
            ))
        }
    };
    if !args.end() {
        return Err(args.error_here(ParseErrorKind::Message(
            "Malformed autoescape statement args".to_string(),
        )));
    }

    let (wrapper, _) = p.wrap_until(&["endautoescape"])?;

    Ok(Box::new(AutoescapeStmt {
        location,
        wrapper: Arc::new(wrapper),
        autoescape,
    }))
}
