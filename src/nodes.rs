//! AST node types produced by the parser.
//!
//! Expressions are one enum covering literals, composites, reference
//! chains, operators, filter chains and test expressions. Template content
//! (data, comments, outputs, statement blocks) lives in [`Node`]. Every
//! node keeps the token it originated from so errors can point at a
//! line/column.

use std::collections::HashMap;
use std::sync::Arc;

use crate::statements::Statement;
use crate::tokens::Token;
use crate::utils::ellipsis;

/// Whitespace trim flags attached to data nodes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Trim {
    pub left: bool,
    pub right: bool,
}

/// A literal run of template text.
#[derive(Debug, Clone)]
pub struct DataNode {
    pub token: Token,
    /// Explicit `-` markers on the surrounding tags.
    pub trim: Trim,
    /// `lstrip_blocks`: strip trailing spaces/tabs on the line of the next block tag.
    pub lstrip: bool,
    /// `trim_blocks`: drop the first newline left by the preceding block tag.
    pub trim_newline: bool,
}

impl DataNode {
    pub fn position(&self) -> &Token {
        &self.token
    }
}

impl std::fmt::Display for DataNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "data({})", ellipsis(&self.token.val, 20))
    }
}

/// A `{# … #}` comment. Produces no output.
#[derive(Debug, Clone)]
pub struct CommentNode {
    pub start: Token,
    pub text: String,
    pub end: Token,
}

impl CommentNode {
    pub fn position(&self) -> &Token {
        &self.start
    }
}

impl std::fmt::Display for CommentNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "comment({})", ellipsis(&self.text, 20))
    }
}

/// A printable `{{ … }}` expression node.
#[derive(Debug, Clone)]
pub struct OutputNode {
    pub start: Token,
    pub expression: Expression,
    pub end: Token,
}

impl OutputNode {
    pub fn position(&self) -> &Token {
        &self.start
    }
}

impl std::fmt::Display for OutputNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "output({})", self.expression)
    }
}

/// One `{% … %}` statement, dispatched through the statement registry.
#[derive(Debug, Clone)]
pub struct StatementBlock {
    pub location: Token,
    pub name: String,
    pub stmt: Arc<dyn Statement>,
}

impl StatementBlock {
    pub fn position(&self) -> &Token {
        &self.location
    }
}

impl std::fmt::Display for StatementBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.name, self.stmt)
    }
}

/// A top-level template content node.
#[derive(Debug, Clone)]
pub enum Node {
    Data(DataNode),
    Comment(CommentNode),
    Output(OutputNode),
    Statement(StatementBlock),
}

impl Node {
    pub fn position(&self) -> &Token {
        match self {
            Node::Data(n) => n.position(),
            Node::Comment(n) => n.position(),
            Node::Output(n) => n.position(),
            Node::Statement(n) => n.position(),
        }
    }
}

impl std::fmt::Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Node::Data(n) => write!(f, "{}", n),
            Node::Comment(n) => write!(f, "{}", n),
            Node::Output(n) => write!(f, "{}", n),
            Node::Statement(n) => write!(f, "{}", n),
        }
    }
}

/// A lexically nested body produced by block-form statements, together with
/// the name of the tag that closed it.
#[derive(Debug, Clone)]
pub struct Wrapper {
    pub location: Token,
    pub nodes: Vec<Node>,
    pub end_tag: String,
}

impl Wrapper {
    pub fn position(&self) -> &Token {
        &self.location
    }
}

impl std::fmt::Display for Wrapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "wrapper({})", self.end_tag)
    }
}

/// A `{% macro %}` definition: declared positional args and keyword
/// defaults plus the wrapped body.
#[derive(Debug, Clone)]
pub struct MacroNode {
    pub location: Token,
    pub name: String,
    pub args: Vec<String>,
    pub defaults: Vec<(String, Expression)>,
    pub wrapper: Arc<Wrapper>,
}

impl MacroNode {
    pub fn position(&self) -> &Token {
        &self.location
    }
}

impl std::fmt::Display for MacroNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({:?})", self.name, self.args)
    }
}

/// The root of a parsed template.
#[derive(Debug, Clone)]
pub struct TemplateNode {
    pub name: String,
    pub nodes: Vec<Node>,
    pub blocks: HashMap<String, Arc<Wrapper>>,
    pub macros: HashMap<String, Arc<MacroNode>>,
    pub parent: Option<Arc<TemplateNode>>,
}

impl TemplateNode {
    /// Collects the override chain for a block, most-derived wrapper first.
    /// The tail of the list is what `super()` continues into.
    pub fn get_blocks(&self, name: &str) -> Vec<Arc<Wrapper>> {
        let mut blocks = match &self.parent {
            Some(parent) => parent.get_blocks(name),
            None => Vec::new(),
        };
        if let Some(block) = self.blocks.get(name) {
            blocks.insert(0, block.clone());
        }
        blocks
    }
}

impl std::fmt::Display for TemplateNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "template({})", self.name)
    }
}

/// A dotted or indexed suffix after `.`: an identifier or an integer.
#[derive(Debug, Clone, PartialEq)]
pub enum Subscript {
    Name(String),
    Index(i64),
}

impl std::fmt::Display for Subscript {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Subscript::Name(name) => write!(f, "{}", name),
            Subscript::Index(idx) => write!(f, "{}", idx),
        }
    }
}

/// A single filter application inside a filter chain.
#[derive(Debug, Clone)]
pub struct FilterCall {
    pub token: Token,
    pub name: String,
    pub args: Vec<Expression>,
    pub kwargs: Vec<(String, Expression)>,
}

/// A single test application after `is`.
#[derive(Debug, Clone)]
pub struct TestCall {
    pub token: Token,
    pub name: String,
    pub args: Vec<Expression>,
    pub kwargs: Vec<(String, Expression)>,
}

/// A key/value pair of a dict literal.
#[derive(Debug, Clone)]
pub struct PairNode {
    pub key: Expression,
    pub value: Expression,
}

/// Every evaluable expression form.
#[derive(Debug, Clone)]
pub enum Expression {
    None(Token),
    Bool(Token, bool),
    Integer(Token, i64),
    Float(Token, f64),
    Str(Token, String),
    List {
        token: Token,
        items: Vec<Expression>,
    },
    Tuple {
        token: Token,
        items: Vec<Expression>,
    },
    Dict {
        token: Token,
        pairs: Vec<PairNode>,
    },
    Name(Token),
    Getattr {
        token: Token,
        node: Box<Expression>,
        attr: Subscript,
    },
    Getitem {
        token: Token,
        node: Box<Expression>,
        key: Subscript,
    },
    Call {
        token: Token,
        func: Box<Expression>,
        args: Vec<Expression>,
        kwargs: Vec<(String, Expression)>,
    },
    /// Logical `not`.
    Negation {
        op: Token,
        term: Box<Expression>,
    },
    /// Numeric sign (`+x` / `-x`).
    Unary {
        op: Token,
        negative: bool,
        term: Box<Expression>,
    },
    Binary {
        op: Token,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Filtered {
        expression: Box<Expression>,
        filters: Vec<FilterCall>,
    },
    Test {
        expression: Box<Expression>,
        test: TestCall,
    },
}

impl Expression {
    pub fn position(&self) -> &Token {
        match self {
            Expression::None(t)
            | Expression::Bool(t, _)
            | Expression::Integer(t, _)
            | Expression::Float(t, _)
            | Expression::Str(t, _)
            | Expression::Name(t) => t,
            Expression::List { token, .. }
            | Expression::Tuple { token, .. }
            | Expression::Dict { token, .. }
            | Expression::Getattr { token, .. }
            | Expression::Getitem { token, .. }
            | Expression::Call { token, .. } => token,
            Expression::Negation { op, .. } | Expression::Unary { op, .. } => op,
            Expression::Binary { left, .. } => left.position(),
            Expression::Filtered { expression, .. } | Expression::Test { expression, .. } => {
                expression.position()
            }
        }
    }
}

impl std::fmt::Display for Expression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expression::None(_) => write!(f, "none"),
            Expression::Bool(_, v) => write!(f, "{}", v),
            Expression::Integer(_, v) => write!(f, "{}", v),
            Expression::Float(_, v) => write!(f, "{}", v),
            Expression::Str(_, v) => write!(f, "'{}'", v),
            Expression::List { items, .. } => {
                write!(f, "[")?;
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Expression::Tuple { items, .. } => {
                write!(f, "(")?;
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, ")")
            }
            Expression::Dict { pairs, .. } => {
                write!(f, "{{")?;
                for (idx, pair) in pairs.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", pair.key, pair.value)?;
                }
                write!(f, "}}")
            }
            Expression::Name(t) => write!(f, "{}", t.val),
            Expression::Getattr { node, attr, .. } => write!(f, "{}.{}", node, attr),
            Expression::Getitem { node, key, .. } => write!(f, "{}[{}]", node, key),
            Expression::Call { func, args, .. } => write!(f, "{}(…{} args)", func, args.len()),
            Expression::Negation { term, .. } => write!(f, "not {}", term),
            Expression::Unary { op, term, .. } => write!(f, "{}{}", op.val, term),
            Expression::Binary { op, left, right } => {
                write!(f, "{} {} {}", left, op.val, right)
            }
            Expression::Filtered { expression, .. } => {
                write!(f, "filtered_expression({})", expression)
            }
            Expression::Test { expression, test } => {
                write!(f, "{} is {}", expression, test.name)
            }
        }
    }
}
