//! A Jinja2-compatible template engine.
//!
//! Template sources are lexed into tokens, parsed into an immutable AST
//! and rendered by a tree-walking interpreter against a scoped context.
//! The engine covers expressions with full operator precedence, filter
//! chains and tests, plus the statement set templates expect: `if`, `for`
//! (with the `loop` record), `set`, `with`, `filter`, `autoescape`, `raw`,
//! `macro`, `include`, `import` and template inheritance via
//! `extends`/`block`/`super()`.
//!
//! Filters, tests, statements and globals live in pluggable registries on
//! an [`Environment`], which also holds the loader and a thread-safe
//! template cache.
//!
//! ```
//! use ginger::Environment;
//! use serde_json::json;
//!
//! let env = Environment::default();
//! let tpl = env
//!     .from_string("{% for x in xs %}{{ loop.index }}:{{ x | upper }} {% endfor %}")
//!     .unwrap();
//! let out = tpl.render(&json!({"xs": ["a", "b"]})).unwrap();
//! assert_eq!(out, "1:A 2:B ");
//! ```

mod config;
mod context;
mod environment;
mod error;
mod eval;
mod filters;
mod globals;
mod lexer;
mod loader;
mod nodes;
mod parser;
mod renderer;
mod statements;
mod template;
mod testers;
mod tokens;
mod utils;
mod value;
mod varargs;

pub use config::Config;
pub use context::Context;
pub use environment::Environment;
pub use error::{GingerError, GingerResult, LoaderError, ParseError, ParseErrorKind, RenderError};
pub use eval::{EvalConfig, Evaluator, FilterFunction, FilterSet, Global, GlobalsSet, TestFunction, TestSet};
pub use loader::{FileSystemLoader, Loader, MemoryLoader};
pub use renderer::{Output, Renderer};
pub use statements::{Statement, StatementParser, StatementSet};
pub use template::Template;
pub use value::{to_value, Dict, Pair, Value};
pub use varargs::{KwArg, VarArgs};

// Lower-level building blocks, exported for statement authors.
pub use lexer::lex;
pub use nodes::{
    CommentNode, DataNode, Expression, FilterCall, MacroNode, Node, OutputNode, PairNode,
    StatementBlock, Subscript, TemplateNode, TestCall, Trim, Wrapper,
};
pub use parser::Parser;
pub use tokens::{Stream, Token, TokenType};
