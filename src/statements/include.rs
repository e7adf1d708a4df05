//! `include`, `import` and `from … import`.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::{GingerError, ParseErrorKind, RenderError};
use crate::nodes::{Expression, TemplateNode};
use crate::parser::Parser;
use crate::renderer::{macro_to_function, Renderer};
use crate::statements::Statement;
use crate::tokens::{Token, TokenType};
use crate::value::Value;

/// Resolves the target template of a statement: the preloaded AST for
/// literal paths, a load through the loader for dynamic ones.
fn resolve_template(
    r: &Renderer<'_>,
    template: &Option<Arc<TemplateNode>>,
    filename_expr: &Option<Expression>,
) -> Result<Arc<TemplateNode>, RenderError> {
    if let Some(expr) = filename_expr {
        let filename = r.eval(expr);
        if filename.is_error() {
            return Err(RenderError::Eval {
                message: format!("Unable to evaluate filename: {}", filename.error_message()),
            });
        }
        let name = filename.to_string();
        return r.config.get_template(&name).map_err(|err| {
            RenderError::Message(format!("Unable to load template '{}': {}", name, err))
        });
    }
    match template {
        Some(tpl) => Ok(Arc::clone(tpl)),
        None => Err(RenderError::Message(
            "No template to include".to_string(),
        )),
    }
}

#[derive(Debug)]
pub struct IncludeStmt {
    location: Token,
    filename: Option<String>,
    filename_expr: Option<Expression>,
    template: Option<Arc<TemplateNode>>,
    ignore_missing: bool,
    #[allow(dead_code)]
    with_context: bool,
    /// Literal path was missing and `ignore missing` was given.
    is_empty: bool,
}

impl std::fmt::Display for IncludeStmt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "IncludeStmt(Filename={:?} Line={} Col={})",
            self.filename, self.location.line, self.location.col
        )
    }
}

impl Statement for IncludeStmt {
    fn position(&self) -> &Token {
        &self.location
    }

    fn execute(&self, r: &mut Renderer<'_>) -> Result<(), RenderError> {
        if self.is_empty {
            return Ok(());
        }
        let template = if let Some(expr) = &self.filename_expr {
            let filename = r.eval(expr);
            if filename.is_error() {
                return Err(RenderError::Eval {
                    message: format!(
                        "Unable to evaluate filename: {}",
                        filename.error_message()
                    ),
                });
            }
            let name = filename.to_string();
            match r.config.get_template(&name) {
                Ok(template) => template,
                // Only loader failures are swallowed, not eval errors.
                Err(_) if self.ignore_missing => return Ok(()),
                Err(err) => {
                    return Err(RenderError::Message(format!(
                        "Unable to load template '{}': {}",
                        name, err
                    )))
                }
            }
        } else {
            match &self.template {
                Some(template) => Arc::clone(template),
                None => return Ok(()),
            }
        };
        let mut sub = r.inherit();
        sub.root = template;
        sub.execute()
    }
}

pub fn parse_include(
    p: &mut Parser<'_>,
    args: &mut Parser<'_>,
) -> Result<Box<dyn Statement>, GingerError> {
    let location = p.current_token().clone();
    let mut stmt = IncludeStmt {
        location,
        filename: None,
        filename_expr: None,
        template: None,
        ignore_missing: false,
        with_context: false,
        is_empty: false,
    };

    if let Some(tok) = args.match_type(TokenType::String) {
        stmt.filename = Some(tok.val);
    } else {
        stmt.filename_expr = Some(args.parse_expression()?);
    }

    if args.match_name(&["ignore"]).is_some() {
        if args.match_name(&["missing"]).is_some() {
            stmt.ignore_missing = true;
        } else {
            args.stream.backup();
        }
    }

    if let Some(tok) = args.match_name(&["with", "without"]) {
        if args.match_name(&["context"]).is_some() {
            stmt.with_context = tok.val == "with";
        } else {
            args.stream.backup();
        }
    }

    if let Some(filename) = &stmt.filename {
        match load_static(p, filename) {
            Ok(template) => stmt.template = Some(template),
            Err(_) if stmt.ignore_missing => stmt.is_empty = true,
            Err(err) => {
                return Err(args.error_here(ParseErrorKind::Message(format!(
                    "Unable to parse included template '{}': {}",
                    filename, err
                ))))
            }
        }
    }

    if !args.end() {
        return Err(args.error_here(ParseErrorKind::Message(
            "Malformed 'include'-tag args".to_string(),
        )));
    }

    Ok(Box::new(stmt))
}

fn load_static(p: &Parser<'_>, filename: &str) -> Result<Arc<TemplateNode>, String> {
    match p.template_parser {
        Some(tp) => tp(filename).map_err(|err| err.to_string()),
        None => Err("No template loader configured".to_string()),
    }
}

/// Binds every macro of a template as a callable, in the current scope.
fn imported_macros(
    r: &Renderer<'_>,
    template: &Arc<TemplateNode>,
) -> Result<IndexMap<String, Value>, RenderError> {
    let mut macros = IndexMap::new();
    for (name, node) in &template.macros {
        let f = macro_to_function(node, &r.config, &r.ctx, &r.root).map_err(|err| {
            RenderError::Message(format!("Unable to import macro '{}': {}", name, err))
        })?;
        macros.insert(name.clone(), f);
    }
    Ok(macros)
}

#[derive(Debug)]
pub struct ImportStmt {
    location: Token,
    #[allow(dead_code)]
    filename: Option<String>,
    filename_expr: Option<Expression>,
    template: Option<Arc<TemplateNode>>,
    alias: String,
}

impl std::fmt::Display for ImportStmt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ImportStmt(Line={} Col={})",
            self.location.line, self.location.col
        )
    }
}

impl Statement for ImportStmt {
    fn position(&self) -> &Token {
        &self.location
    }

    fn execute(&self, r: &mut Renderer<'_>) -> Result<(), RenderError> {
        let template = resolve_template(r, &self.template, &self.filename_expr)?;
        let macros = imported_macros(r, &template)?;
        r.ctx.set(self.alias.clone(), Value::from_map(macros));
        Ok(())
    }
}

pub fn parse_import(
    p: &mut Parser<'_>,
    args: &mut Parser<'_>,
) -> Result<Box<dyn Statement>, GingerError> {
    let location = p.current_token().clone();
    if args.end() {
        return Err(args.error_here(ParseErrorKind::Message(
            "You must at least specify one macro to import".to_string(),
        )));
    }

    let mut filename = None;
    let mut filename_expr = None;
    if let Some(tok) = args.match_type(TokenType::String) {
        filename = Some(tok.val);
    } else {
        filename_expr = Some(args.parse_expression()?);
    }

    if args.match_name(&["as"]).is_none() {
        return Err(args.error_here(ParseErrorKind::Expected {
            description: "\"as\" keyword".to_string(),
        }));
    }
    let alias = match args.match_type(TokenType::Name) {
        Some(tok) => tok.val,
        None => {
            return Err(args.error_here(ParseErrorKind::Expected {
                description: "macro alias name (identifier)".to_string(),
            }))
        }
    };

    if args.match_name(&["with", "without"]).is_some() {
        if args.match_name(&["context"]).is_none() {
            args.stream.backup();
        }
    }

    if !args.end() {
        return Err(args.error_here(ParseErrorKind::Message(
            "Malformed 'import'-tag args".to_string(),
        )));
    }

    let mut template = None;
    if let Some(filename) = &filename {
        template = Some(load_static(p, filename).map_err(|err| {
            args.error_here(ParseErrorKind::Message(format!(
                "Unable to parse imported template '{}': {}",
                filename, err
            )))
        })?);
    }

    Ok(Box::new(ImportStmt {
        location,
        filename,
        filename_expr,
        template,
        alias,
    }))
}

#[derive(Debug)]
pub struct FromImportStmt {
    location: Token,
    filename: Option<String>,
    filename_expr: Option<Expression>,
    template: Option<Arc<TemplateNode>>,
    /// alias → macro name.
    mappings: Vec<(String, String)>,
}

impl std::fmt::Display for FromImportStmt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "FromImportStmt(Line={} Col={})",
            self.location.line, self.location.col
        )
    }
}

impl Statement for FromImportStmt {
    fn position(&self) -> &Token {
        &self.location
    }

    fn execute(&self, r: &mut Renderer<'_>) -> Result<(), RenderError> {
        let template = resolve_template(r, &self.template, &self.filename_expr)?;
        let source = self
            .filename
            .clone()
            .unwrap_or_else(|| template.name.clone());
        for (alias, name) in &self.mappings {
            match template.macros.get(name) {
                Some(node) => {
                    let f = macro_to_function(node, &r.config, &r.ctx, &r.root).map_err(|err| {
                        RenderError::Message(format!(
                            "Unable to import macro '{}': {}",
                            name, err
                        ))
                    })?;
                    r.ctx.set(alias.clone(), f);
                }
                None => {
                    // Missing names only fail when actually called.
                    let message =
                        format!("Macro '{}' not found in '{}'", name, source);
                    r.ctx.set(
                        alias.clone(),
                        Value::from_function(move |_, _| Value::error(message.clone())),
                    );
                }
            }
        }
        Ok(())
    }
}

pub fn parse_from(
    p: &mut Parser<'_>,
    args: &mut Parser<'_>,
) -> Result<Box<dyn Statement>, GingerError> {
    let location = p.current_token().clone();
    if args.end() {
        return Err(args.error_here(ParseErrorKind::Message(
            "You must at least specify one macro to import".to_string(),
        )));
    }

    let mut filename = None;
    let mut filename_expr = None;
    if let Some(tok) = args.match_type(TokenType::String) {
        filename = Some(tok.val);
    } else {
        filename_expr = Some(args.parse_expression()?);
    }

    if args.match_name(&["import"]).is_none() {
        return Err(args.error_here(ParseErrorKind::Expected {
            description: "import keyword".to_string(),
        }));
    }

    let mut mappings = Vec::new();
    while !args.end() {
        let name = match args.match_type(TokenType::Name) {
            Some(tok) => tok.val,
            None => {
                return Err(args.error_here(ParseErrorKind::Expected {
                    description: "macro name (identifier)".to_string(),
                }))
            }
        };
        if args.match_name(&["as"]).is_some() {
            let alias = match args.match_type(TokenType::Name) {
                Some(tok) => tok.val,
                None => {
                    return Err(args.error_here(ParseErrorKind::Expected {
                        description: "macro alias name (identifier)".to_string(),
                    }))
                }
            };
            mappings.push((alias, name));
        } else {
            mappings.push((name.clone(), name));
        }

        if args.match_name(&["with", "without"]).is_some() {
            if args.match_name(&["context"]).is_some() {
                break;
            }
            args.stream.backup();
        }

        if args.end() {
            break;
        }
        if args.match_type(TokenType::Comma).is_none() {
            return Err(args.error_here(ParseErrorKind::Expected {
                description: "','".to_string(),
            }));
        }
    }

    let mut template = None;
    if let Some(filename) = &filename {
        template = Some(load_static(p, filename).map_err(|err| {
            args.error_here(ParseErrorKind::Message(format!(
                "Unable to parse imported template '{}': {}",
                filename, err
            )))
        })?);
    }

    Ok(Box::new(FromImportStmt {
        location,
        filename,
        filename_expr,
        template,
        mappings,
    }))
}
