//! The recursive-descent parser.
//!
//! Works on a [`Stream`] of significant tokens with two-token lookahead.
//! The document loop dispatches on the leading token; `{% … %}` blocks are
//! resolved through the statement registry, whose parsers receive both the
//! outer parser (for body wrapping via [`Parser::wrap_until`]) and an inner
//! parser positioned at the tag's arguments.

mod expression;
mod variable;

use std::collections::HashMap;
use std::sync::Arc;

use log::trace;

use crate::config::Config;
use crate::error::{GingerError, ParseError, ParseErrorKind};
use crate::lexer;
use crate::nodes::{
    CommentNode, DataNode, MacroNode, Node, OutputNode, StatementBlock, TemplateNode, Trim,
    Wrapper,
};
use crate::statements::StatementSet;
use crate::tokens::{Stream, Token, TokenType};

/// Callback used to load and parse a referenced template (`extends`,
/// `include`, `import`) at parse time.
pub type TemplateParserFn<'a> = dyn Fn(&str) -> Result<Arc<TemplateNode>, GingerError> + 'a;

pub struct Parser<'a> {
    pub name: String,
    pub stream: Stream,
    pub config: &'a Config,
    pub statements: &'a StatementSet,
    pub template_parser: Option<&'a TemplateParserFn<'a>>,
    /// Nesting depth of block-form statements; zero at template top level.
    pub level: usize,
    /// Block table of the template being built.
    pub blocks: HashMap<String, Arc<Wrapper>>,
    /// Macro table of the template being built.
    pub macros: HashMap<String, Arc<MacroNode>>,
    /// Parent template, set by an `extends` statement.
    pub parent: Option<Arc<TemplateNode>>,
    /// Closing token of the most recent tag, for whitespace-trim propagation.
    last_end_tag: Option<(TokenType, String)>,
}

/// Parses a standalone source string with the given statement registry.
pub fn parse<'a>(
    name: &str,
    source: &str,
    config: &'a Config,
    statements: &'a StatementSet,
    template_parser: Option<&'a TemplateParserFn<'a>>,
) -> Result<TemplateNode, GingerError> {
    let stream = Stream::new(lexer::lex(source, config));
    let mut parser = Parser::new(name, config, statements, stream);
    parser.template_parser = template_parser;
    parser.parse_template()
}

impl<'a> Parser<'a> {
    pub fn new(
        name: &str,
        config: &'a Config,
        statements: &'a StatementSet,
        stream: Stream,
    ) -> Self {
        Parser {
            name: name.to_string(),
            stream,
            config,
            statements,
            template_parser: None,
            level: 0,
            blocks: HashMap::new(),
            macros: HashMap::new(),
            parent: None,
            last_end_tag: None,
        }
    }

    /// Builds an inner parser over already-lexed argument tokens.
    fn args_parser(&self, name: &str, tokens: Vec<Token>) -> Parser<'a> {
        Parser {
            name: format!("{}:args", name),
            stream: Stream::new(tokens),
            config: self.config,
            statements: self.statements,
            template_parser: self.template_parser,
            level: 0,
            blocks: HashMap::new(),
            macros: HashMap::new(),
            parent: None,
            last_end_tag: None,
        }
    }

    /// Produces a positioned error from the given token.
    pub fn error(&self, kind: ParseErrorKind, token: &Token) -> GingerError {
        GingerError::Parse(ParseError {
            line: token.line,
            column: token.col,
            near: token.val.clone(),
            kind,
        })
    }

    pub fn error_here(&self, kind: ParseErrorKind) -> GingerError {
        // A terminal lexer error outranks whatever the parser expected.
        if self.stream.is_error() {
            return self.lexical_error();
        }
        self.error(kind, self.stream.current())
    }

    fn lexical_error(&self) -> GingerError {
        let token = self.stream.current();
        self.error(
            ParseErrorKind::Lexical {
                message: token.val.clone(),
            },
            token,
        )
    }

    // --- Token helpers ---

    /// Consumes one token.
    pub fn consume(&mut self) {
        self.stream.next_token();
    }

    /// Returns and consumes the current token.
    pub fn next(&mut self) -> Token {
        self.stream.next_token()
    }

    pub fn end(&self) -> bool {
        self.stream.end()
    }

    /// Consumes and returns the current token if it matches one of the
    /// given types.
    pub fn match_types(&mut self, types: &[TokenType]) -> Option<Token> {
        if types.contains(&self.stream.current().ty) {
            return Some(self.stream.next_token());
        }
        None
    }

    pub fn match_type(&mut self, ty: TokenType) -> Option<Token> {
        self.match_types(&[ty])
    }

    /// Consumes and returns the current token if it is a Name with one of
    /// the given values.
    pub fn match_name(&mut self, names: &[&str]) -> Option<Token> {
        if self.current_name(names).is_some() {
            return Some(self.stream.next_token());
        }
        None
    }

    /// The current token if it matches one of the given types, without
    /// consuming it.
    pub fn current(&self, types: &[TokenType]) -> Option<&Token> {
        let tok = self.stream.current();
        if types.contains(&tok.ty) {
            Some(tok)
        } else {
            None
        }
    }

    pub fn current_token(&self) -> &Token {
        self.stream.current()
    }

    /// The current token if it is a Name with one of the given values.
    pub fn current_name(&self, names: &[&str]) -> Option<&Token> {
        let tok = self.stream.current();
        if tok.ty == TokenType::Name && names.iter().any(|n| *n == tok.val) {
            Some(tok)
        } else {
            None
        }
    }

    pub fn peek(&self, types: &[TokenType]) -> Option<&Token> {
        let tok = self.stream.peek()?;
        if types.contains(&tok.ty) {
            Some(tok)
        } else {
            None
        }
    }

    // --- Document parsing ---

    pub fn parse_template(&mut self) -> Result<TemplateNode, GingerError> {
        let mut nodes = Vec::new();
        while !self.stream.end() {
            if let Some(node) = self.parse_doc_element()? {
                nodes.push(node);
            }
        }
        if self.stream.is_error() {
            return Err(self.lexical_error());
        }
        Ok(TemplateNode {
            name: self.name.clone(),
            nodes,
            blocks: std::mem::take(&mut self.blocks),
            macros: std::mem::take(&mut self.macros),
            parent: self.parent.take(),
        })
    }

    pub(crate) fn parse_doc_element(&mut self) -> Result<Option<Node>, GingerError> {
        let tok = self.stream.current().clone();
        trace!("parse_doc_element: {}", tok);
        match tok.ty {
            TokenType::Data => {
                let node = self.data_node(tok);
                self.consume();
                Ok(Some(Node::Data(node)))
            }
            TokenType::Eof => {
                self.consume();
                Ok(None)
            }
            TokenType::Error => Err(self.lexical_error()),
            TokenType::CommentBegin => Ok(Some(Node::Comment(self.parse_comment()?))),
            TokenType::VariableBegin => Ok(Some(Node::Output(self.parse_expression_node()?))),
            TokenType::BlockBegin => Ok(Some(Node::Statement(self.parse_statement_block()?))),
            _ => Err(self.error(
                ParseErrorKind::Message(
                    "Unexpected token (only HTML/tags/filters in templates allowed)".to_string(),
                ),
                &tok,
            )),
        }
    }

    /// Builds a data node, deriving trim flags from the adjacent tags.
    fn data_node(&self, token: Token) -> DataNode {
        let mut trim = Trim::default();
        let mut trim_newline = false;
        let mut lstrip = false;

        if let Some((ty, val)) = &self.last_end_tag {
            if val.starts_with('-') {
                trim.left = true;
            } else if self.config.trim_blocks
                && matches!(ty, TokenType::BlockEnd | TokenType::CommentEnd)
            {
                trim_newline = true;
            }
        }

        if let Some(next) = self.peek(&[
            TokenType::VariableBegin,
            TokenType::BlockBegin,
            TokenType::CommentBegin,
        ]) {
            if next.val.ends_with('-') {
                trim.right = true;
            } else if self.config.lstrip_blocks
                && matches!(next.ty, TokenType::BlockBegin | TokenType::CommentBegin)
                && !next.val.ends_with('+')
            {
                lstrip = true;
            }
        }

        DataNode {
            token,
            trim,
            lstrip,
            trim_newline,
        }
    }

    fn record_end_tag(&mut self, token: &Token) {
        self.last_end_tag = Some((token.ty, token.val.clone()));
    }

    pub(crate) fn parse_comment(&mut self) -> Result<CommentNode, GingerError> {
        let start = match self.match_type(TokenType::CommentBegin) {
            Some(tok) => tok,
            None => {
                return Err(self.error_here(ParseErrorKind::Expected {
                    description: format!("'{}'", self.config.comment_start_string),
                }))
            }
        };
        let text = self
            .match_type(TokenType::Data)
            .map(|t| t.val)
            .unwrap_or_default();
        let end = match self.match_type(TokenType::CommentEnd) {
            Some(tok) => tok,
            None => {
                return Err(self.error_here(ParseErrorKind::Expected {
                    description: format!("'{}'", self.config.comment_end_string),
                }))
            }
        };
        self.record_end_tag(&end);
        Ok(CommentNode { start, text, end })
    }

    /// Parses one `{{ … }}` output node.
    pub fn parse_expression_node(&mut self) -> Result<OutputNode, GingerError> {
        let start = match self.match_type(TokenType::VariableBegin) {
            Some(tok) => tok,
            None => {
                return Err(self.error_here(ParseErrorKind::Expected {
                    description: "'{{'".to_string(),
                }))
            }
        };
        let expression = self.parse_expression()?;
        let end = match self.match_type(TokenType::VariableEnd) {
            Some(tok) => tok,
            None => {
                return Err(self.error_here(ParseErrorKind::Expected {
                    description: "'}}'".to_string(),
                }))
            }
        };
        self.record_end_tag(&end);
        Ok(OutputNode {
            start,
            expression,
            end,
        })
    }

    /// Parses one `{% … %}` statement through the registry.
    pub fn parse_statement_block(&mut self) -> Result<StatementBlock, GingerError> {
        let begin = match self.match_type(TokenType::BlockBegin) {
            Some(tok) => tok,
            None => {
                return Err(self.error_here(ParseErrorKind::Expected {
                    description: format!("'{}'", self.config.block_start_string),
                }))
            }
        };
        let name = match self.match_type(TokenType::Name) {
            Some(tok) => tok,
            None => {
                return Err(self.error_here(ParseErrorKind::Message(
                    "Expected a statement name here".to_string(),
                )))
            }
        };
        let stmt_parser = match self.statements.get(&name.val) {
            Some(parser) => *parser,
            None => {
                return Err(self.error(
                    ParseErrorKind::UnknownStatement {
                        name: name.val.clone(),
                    },
                    &name,
                ))
            }
        };

        let mut args = Vec::new();
        while self.current(&[TokenType::BlockEnd]).is_none() && !self.stream.end() {
            args.push(self.next());
        }
        let end = match self.match_type(TokenType::BlockEnd) {
            Some(tok) => tok,
            None => {
                return Err(self.error_here(ParseErrorKind::Expected {
                    description: format!("end of block '{}'", self.config.block_end_string),
                }))
            }
        };
        self.record_end_tag(&end);

        let mut arg_parser = self.args_parser(&name.val, args);
        let stmt = stmt_parser(self, &mut arg_parser).map_err(|err| match err {
            GingerError::Parse(mut parse_err) => {
                parse_err.kind = ParseErrorKind::Message(format!(
                    "Unable to parse statement '{}': {}",
                    name.val, parse_err.kind
                ));
                GingerError::Parse(parse_err)
            }
            other => other,
        })?;

        Ok(StatementBlock {
            location: begin,
            name: name.val,
            stmt: Arc::from(stmt),
        })
    }

    /// Wraps all nodes until one of the given end tags is encountered.
    ///
    /// Returns the wrapper plus an inner parser positioned over the end
    /// tag's arguments; `wrapper.end_tag` names which tag closed the body.
    pub fn wrap_until(&mut self, names: &[&str]) -> Result<(Wrapper, Parser<'a>), GingerError> {
        let location = self.stream.current().clone();
        let mut nodes: Vec<Node> = Vec::new();
        self.level += 1;

        while !self.stream.end() {
            if self.match_type(TokenType::BlockBegin).is_some() {
                if let Some(end_tag) = self.match_name(names) {
                    let mut args = Vec::new();
                    while self.current(&[TokenType::BlockEnd]).is_none() && !self.stream.end() {
                        args.push(self.next());
                    }
                    let end = match self.match_type(TokenType::BlockEnd) {
                        Some(tok) => tok,
                        None => {
                            self.level -= 1;
                            return Err(self.error_here(ParseErrorKind::unexpected_eof(Some(
                                format!("'{}'", self.config.block_end_string),
                            ))));
                        }
                    };
                    self.record_end_tag(&end);
                    self.level -= 1;
                    let wrapper = Wrapper {
                        location,
                        nodes,
                        end_tag: end_tag.val.clone(),
                    };
                    return Ok((wrapper, self.args_parser(&end_tag.val, args)));
                }
                self.stream.backup();
            }

            match self.parse_doc_element() {
                Ok(Some(node)) => nodes.push(node),
                Ok(None) => {}
                Err(err) => {
                    self.level -= 1;
                    return Err(err);
                }
            }
        }

        self.level -= 1;
        Err(self.error_here(ParseErrorKind::unexpected_eof(Some(format!(
            "tag {}",
            names.join(" or ")
        )))))
    }
}
