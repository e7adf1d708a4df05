//! `block` and `extends`: template inheritance.

use std::sync::Arc;

use crate::error::{GingerError, ParseErrorKind, RenderError};
use crate::parser::Parser;
use crate::renderer::{render_block_chain, Renderer};
use crate::statements::Statement;
use crate::tokens::{Token, TokenType};

#[derive(Debug)]
pub struct BlockStmt {
    location: Token,
    name: String,
}

impl std::fmt::Display for BlockStmt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "BlockStmt(Name={} Line={} Col={})",
            self.name, self.location.line, self.location.col
        )
    }
}

impl Statement for BlockStmt {
    fn position(&self) -> &Token {
        &self.location
    }

    fn execute(&self, r: &mut Renderer<'_>) -> Result<(), RenderError> {
        // The override chain is resolved against the most-derived template;
        // the head runs here with `super` bound to the rest of the chain.
        let chain = r.root.get_blocks(&self.name);
        if chain.is_empty() {
            return Err(RenderError::UnknownBlock {
                name: self.name.clone(),
            });
        }
        let rendered = render_block_chain(&r.config, &r.ctx, &r.root, &chain);
        if rendered.is_error() {
            return Err(RenderError::Eval {
                message: rendered.error_message(),
            });
        }
        r.out.write_str(&rendered.to_string());
        Ok(())
    }
}

pub fn parse_block(
    p: &mut Parser<'_>,
    args: &mut Parser<'_>,
) -> Result<Box<dyn Statement>, GingerError> {
    let location = p.current_token().clone();
    if args.end() {
        return Err(args.error_here(ParseErrorKind::Message(
            "Tag 'block' requires an identifier".to_string(),
        )));
    }
    let name = match args.match_type(TokenType::Name) {
        Some(tok) => tok,
        None => {
            return Err(args.error_here(ParseErrorKind::Message(
                "First argument for tag 'block' must be an identifier".to_string(),
            )))
        }
    };
    if !args.end() {
        return Err(args.error_here(ParseErrorKind::Message(
            "Tag 'block' takes exactly 1 argument (an identifier)".to_string(),
        )));
    }

    let (wrapper, mut endargs) = p.wrap_until(&["endblock"])?;
    if !endargs.end() {
        let end_name = endargs.match_type(TokenType::Name);
        match end_name {
            Some(end_name) if end_name.val != name.val => {
                return Err(endargs.error(
                    ParseErrorKind::Message(format!(
                        "Name for 'endblock' must equal to 'block'-tag's name ('{}' != '{}')",
                        name.val, end_name.val
                    )),
                    &end_name,
                ));
            }
            Some(_) if endargs.end() => {}
            _ => {
                return Err(endargs.error_here(ParseErrorKind::Message(
                    "Either no or only one argument (identifier) allowed for 'endblock'"
                        .to_string(),
                )));
            }
        }
    }

    if p.blocks.contains_key(&name.val) {
        return Err(p.error(
            ParseErrorKind::DuplicateBlock {
                name: name.val.clone(),
            },
            &name,
        ));
    }
    p.blocks.insert(name.val.clone(), Arc::new(wrapper));

    Ok(Box::new(BlockStmt {
        location,
        name: name.val,
    }))
}

#[derive(Debug)]
pub struct ExtendsStmt {
    location: Token,
    filename: String,
    #[allow(dead_code)]
    with_context: bool,
}

impl std::fmt::Display for ExtendsStmt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ExtendsStmt(Filename={} Line={} Col={})",
            self.filename, self.location.line, self.location.col
        )
    }
}

impl Statement for ExtendsStmt {
    fn position(&self) -> &Token {
        &self.location
    }

    fn execute(&self, _r: &mut Renderer<'_>) -> Result<(), RenderError> {
        // The parent was resolved at parse time; rendering starts at the
        // root ancestor, so there is nothing left to do here.
        Ok(())
    }
}

pub fn parse_extends(
    p: &mut Parser<'_>,
    args: &mut Parser<'_>,
) -> Result<Box<dyn Statement>, GingerError> {
    let location = p.current_token().clone();

    if p.level > 0 {
        return Err(args.error(ParseErrorKind::ExtendsNotAtRoot, &location));
    }
    if p.parent.is_some() {
        return Err(args.error_here(ParseErrorKind::Message(
            "This template has already one parent".to_string(),
        )));
    }

    let filename = match args.match_type(TokenType::String) {
        Some(tok) => tok.val,
        None => {
            return Err(args.error_here(ParseErrorKind::Message(
                "Tag 'extends' requires a template filename as string".to_string(),
            )))
        }
    };

    let template_parser = match p.template_parser {
        Some(tp) => tp,
        None => {
            return Err(args.error_here(ParseErrorKind::Message(
                "No template loader available to resolve 'extends'".to_string(),
            )))
        }
    };
    let parent = template_parser(&filename).map_err(|err| {
        args.error_here(ParseErrorKind::Message(format!(
            "Unable to parse parent template '{}': {}",
            filename, err
        )))
    })?;
    p.parent = Some(parent);

    let mut with_context = false;
    if let Some(tok) = args.match_name(&["with", "without"]) {
        if args.match_name(&["context"]).is_some() {
            with_context = tok.val == "with";
        } else {
            args.stream.backup();
        }
    }

    if !args.end() {
        return Err(args.error_here(ParseErrorKind::Message(
            "Tag 'extends' does only take 1 argument".to_string(),
        )));
    }

    Ok(Box::new(ExtendsStmt {
        location,
        filename,
        with_context,
    }))
}
