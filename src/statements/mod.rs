//! Built-in statements and the statement registry.
//!
//! Statement parsers are resolved once at parse time: `{% name … %}` looks
//! `name` up in the [`StatementSet`] and hands control to the registered
//! parser, which receives the outer parser (for body wrapping) and an
//! inner parser positioned at the tag's arguments. The parsed statement
//! executes later against a renderer.

mod assign;
mod control;
mod escape;
mod include;
mod inheritance;
mod macros;
mod raw;

use indexmap::IndexMap;

use crate::error::{GingerError, RenderError};
use crate::parser::Parser;
use crate::renderer::Renderer;
use crate::tokens::Token;

/// A parsed `{% … %}` statement, ready to execute.
pub trait Statement: std::fmt::Debug + std::fmt::Display + Send + Sync {
    fn position(&self) -> &Token;
    fn execute(&self, renderer: &mut Renderer<'_>) -> Result<(), RenderError>;
}

/// Parses one statement from its tag arguments.
pub type StatementParser =
    fn(&mut Parser<'_>, &mut Parser<'_>) -> Result<Box<dyn Statement>, GingerError>;

/// Case-sensitive map from statement names to their parsers.
#[derive(Debug, Clone, Default)]
pub struct StatementSet {
    entries: IndexMap<String, StatementParser>,
}

impl StatementSet {
    pub fn new() -> Self {
        StatementSet::default()
    }

    pub fn exists(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&StatementParser> {
        self.entries.get(name)
    }

    /// Registers a new statement. Fails if the name is taken.
    pub fn register(&mut self, name: &str, parser: StatementParser) -> Result<(), String> {
        if self.exists(name) {
            return Err(format!(
                "statement with name '{}' is already registered",
                name
            ));
        }
        self.entries.insert(name.to_string(), parser);
        Ok(())
    }

    /// Replaces an existing statement. Fails if the name is unknown.
    pub fn replace(&mut self, name: &str, parser: StatementParser) -> Result<(), String> {
        if !self.exists(name) {
            return Err(format!(
                "statement with name '{}' does not exist (therefore cannot be overridden)",
                name
            ));
        }
        self.entries.insert(name.to_string(), parser);
        Ok(())
    }

    /// Bulk merge, overwriting existing entries.
    pub fn update(&mut self, other: &StatementSet) {
        for (name, parser) in &other.entries {
            self.entries.insert(name.clone(), *parser);
        }
    }
}

/// The full built-in statement set.
pub fn default_statements() -> StatementSet {
    let mut set = StatementSet::new();
    let entries: &[(&str, StatementParser)] = &[
        ("if", control::parse_if),
        ("for", control::parse_for),
        ("block", inheritance::parse_block),
        ("extends", inheritance::parse_extends),
        ("include", include::parse_include),
        ("import", include::parse_import),
        ("from", include::parse_from),
        ("macro", macros::parse_macro),
        ("set", assign::parse_set),
        ("with", assign::parse_with),
        ("filter", escape::parse_filter_stmt),
        ("autoescape", escape::parse_autoescape),
        ("raw", raw::parse_raw),
        ("comment", raw::parse_comment_stmt),
    ];
    for (name, parser) in entries {
        // The set is empty here, so registration cannot collide.
        let _ = set.register(name, *parser);
    }
    set
}
