//! `raw` and `comment`: verbatim regions.
//!
//! The lexer already arms a scan for the matching end tag, so the body
//! arrives as a single data token no matter what delimiters it contains.

use crate::error::{GingerError, ParseErrorKind, RenderError};
use crate::nodes::{DataNode, Node};
use crate::parser::Parser;
use crate::renderer::Renderer;
use crate::statements::Statement;
use crate::tokens::Token;

#[derive(Debug)]
pub struct RawStmt {
    data: DataNode,
}

impl std::fmt::Display for RawStmt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let t = self.data.position();
        write!(f, "RawStmt(Line={} Col={})", t.line, t.col)
    }
}

impl Statement for RawStmt {
    fn position(&self) -> &Token {
        self.data.position()
    }

    fn execute(&self, r: &mut Renderer<'_>) -> Result<(), RenderError> {
        r.out.write_data(&self.data);
        Ok(())
    }
}

pub fn parse_raw(
    p: &mut Parser<'_>,
    args: &mut Parser<'_>,
) -> Result<Box<dyn Statement>, GingerError> {
    let (wrapper, _) = p.wrap_until(&["endraw"])?;

    let data = match wrapper.nodes.as_slice() {
        [Node::Data(data)] => data.clone(),
        _ => {
            return Err(p.error(
                ParseErrorKind::Message(
                    "raw statement can only contain a single data node".to_string(),
                ),
                &wrapper.location,
            ))
        }
    };

    if !args.end() {
        return Err(args.error_here(ParseErrorKind::Message(
            "raw statement doesn't accept parameters".to_string(),
        )));
    }

    Ok(Box::new(RawStmt { data }))
}

#[derive(Debug)]
pub struct CommentStmt {
    location: Token,
}

impl std::fmt::Display for CommentStmt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "CommentStmt(Line={} Col={})",
            self.location.line, self.location.col
        )
    }
}

impl Statement for CommentStmt {
    fn position(&self) -> &Token {
        &self.location
    }

    fn execute(&self, _r: &mut Renderer<'_>) -> Result<(), RenderError> {
        Ok(())
    }
}

pub fn parse_comment_stmt(
    p: &mut Parser<'_>,
    args: &mut Parser<'_>,
) -> Result<Box<dyn Statement>, GingerError> {
    let location = p.current_token().clone();
    let (_wrapper, _) = p.wrap_until(&["endcomment"])?;
    if !args.end() {
        return Err(args.error_here(ParseErrorKind::Message(
            "comment statement doesn't accept parameters".to_string(),
        )));
    }
    Ok(Box::new(CommentStmt { location }))
}
