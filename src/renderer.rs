//! Statement execution and output buffering.
//!
//! The [`Renderer`] walks template nodes, writing into an [`Output`]
//! buffer. Sub-renderers created with [`Renderer::inherit`] share the
//! buffer but get a fresh context frame and a child configuration, so
//! bindings made inside a wrapper never leak out. Rendering starts at the
//! root ancestor of the template's `extends` chain; block statements then
//! resolve overrides against the most-derived template.

use std::sync::Arc;

use log::trace;

use crate::context::Context;
use crate::error::RenderError;
use crate::eval::{EvalConfig, Evaluator};
use crate::nodes::{DataNode, Expression, MacroNode, Node, TemplateNode, Wrapper};
use crate::value::Value;
use crate::varargs::KwArg;

/// A growing output buffer with whitespace-trim handling.
///
/// Data writes pass through the trim flags computed at parse time: explicit
/// `-` markers strip all adjacent whitespace, `trim_blocks` drops the first
/// newline after a block tag, and `lstrip_blocks` removes the indentation
/// of a line that only leads up to a block tag.
#[derive(Debug, Default)]
pub struct Output {
    buf: String,
}

impl Output {
    pub fn new() -> Self {
        Output::default()
    }

    pub fn write_str(&mut self, s: &str) {
        self.buf.push_str(s);
    }

    pub fn write_data(&mut self, node: &DataNode) {
        let mut text: &str = &node.token.val;

        if node.trim.left {
            text = text.trim_start();
        } else if node.trim_newline {
            text = text.strip_prefix("\r\n").or_else(|| text.strip_prefix('\n')).unwrap_or(text);
        }

        if node.trim.right {
            text = text.trim_end();
            self.buf.push_str(text);
            return;
        }

        if node.lstrip {
            // Strip the trailing indentation only when the upcoming tag is
            // alone on its line.
            let line_start = text.rfind('\n').map(|i| i + 1);
            let (head, tail) = match line_start {
                Some(idx) => text.split_at(idx),
                None => ("", text),
            };
            let tail_is_indent = !tail.is_empty() && tail.bytes().all(|b| b == b' ' || b == b'\t');
            let at_line_start =
                line_start.is_some() || self.buf.is_empty() || self.buf.ends_with('\n');
            if tail_is_indent && at_line_start {
                self.buf.push_str(head);
                return;
            }
        }

        self.buf.push_str(text);
    }

    pub fn into_string(self) -> String {
        self.buf
    }

    pub fn as_str(&self) -> &str {
        &self.buf
    }
}

/// A tree-walking node visitor writing rendered output.
pub struct Renderer<'out> {
    pub config: EvalConfig,
    pub ctx: Context,
    pub root: Arc<TemplateNode>,
    pub out: &'out mut Output,
}

impl<'out> Renderer<'out> {
    pub fn new(
        config: EvalConfig,
        ctx: Context,
        root: Arc<TemplateNode>,
        out: &'out mut Output,
    ) -> Self {
        ctx.set("self", self_value(&config, &ctx, &root));
        Renderer {
            config,
            ctx,
            root,
            out,
        }
    }

    /// Creates a sub-renderer: same buffer, fresh context frame, child
    /// configuration.
    pub fn inherit(&mut self) -> Renderer<'_> {
        Renderer {
            config: self.config.inherit(),
            ctx: self.ctx.inherit(),
            root: Arc::clone(&self.root),
            out: &mut *self.out,
        }
    }

    pub fn eval(&self, expr: &Expression) -> Value {
        Evaluator::new(&self.config, &self.ctx).eval(expr)
    }

    pub fn evaluator(&self) -> Evaluator<'_> {
        Evaluator::new(&self.config, &self.ctx)
    }

    /// Renders the template, starting at the root ancestor of the
    /// inheritance chain.
    pub fn execute(&mut self) -> Result<(), RenderError> {
        let mut root = Arc::clone(&self.root);
        while let Some(parent) = &root.parent {
            root = Arc::clone(parent);
        }
        self.execute_nodes(&root.nodes)
    }

    pub fn execute_nodes(&mut self, nodes: &[Node]) -> Result<(), RenderError> {
        for node in nodes {
            self.visit(node)?;
        }
        Ok(())
    }

    /// Executes a wrapper body in an inherited scope.
    pub fn execute_wrapper(&mut self, wrapper: &Wrapper) -> Result<(), RenderError> {
        let mut sub = self.inherit();
        sub.execute_nodes(&wrapper.nodes)
    }

    fn visit(&mut self, node: &Node) -> Result<(), RenderError> {
        trace!("visit: {}", node);
        match node {
            Node::Comment(_) => Ok(()),
            Node::Data(data) => {
                self.out.write_data(data);
                Ok(())
            }
            Node::Output(output) => {
                let value = self.eval(&output.expression);
                if value.is_error() {
                    return Err(RenderError::Eval {
                        message: format!(
                            "{} at line {}: {}",
                            value.error_message(),
                            output.expression.position().line,
                            output.expression
                        ),
                    });
                }
                if self.config.config.autoescape && value.is_string() && !value.safe {
                    self.out.write_str(&value.escaped());
                } else {
                    self.out.write_str(&value.to_string());
                }
                Ok(())
            }
            Node::Statement(block) => {
                block.stmt.execute(self).map_err(|err| RenderError::Statement {
                    name: block.name.clone(),
                    message: format!("{} (line {})", err, block.location.line),
                })
            }
        }
    }
}

/// Builds the `self` binding: a mapping from block names to zero-argument
/// renderers for the most-derived version of each block.
pub fn self_value(config: &EvalConfig, ctx: &Context, root: &Arc<TemplateNode>) -> Value {
    let mut blocks = indexmap::IndexMap::new();
    let mut names = Vec::new();
    let mut tpl = Some(Arc::clone(root));
    while let Some(t) = tpl {
        for name in t.blocks.keys() {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
        tpl = t.parent.clone();
    }
    for name in names {
        let chain = root.get_blocks(&name);
        let config = config.inherit();
        let ctx = ctx.clone();
        let root = Arc::clone(root);
        blocks.insert(
            name,
            Value::from_function(move |_, _| render_block_chain(&config, &ctx, &root, &chain)),
        );
    }
    Value::from_map(blocks)
}

/// Renders the head of a block chain into a fresh buffer, binding `super`
/// to the continuation.
pub fn render_block_chain(
    config: &EvalConfig,
    ctx: &Context,
    root: &Arc<TemplateNode>,
    chain: &[Arc<Wrapper>],
) -> Value {
    let (block, rest) = match chain.split_first() {
        Some(parts) => parts,
        None => return Value::safe(Value::from("")),
    };
    let sub_ctx = ctx.inherit();
    sub_ctx.set("super", super_value(config, ctx, root, rest.to_vec()));
    let mut out = Output::new();
    {
        let mut renderer = Renderer::new(config.inherit(), sub_ctx, Arc::clone(root), &mut out);
        if let Err(err) = renderer.execute_wrapper(block) {
            return Value::error(err.to_string());
        }
    }
    Value::safe(Value::from(out.into_string()))
}

/// Builds the `super()` closure: renders the next wrapper up the override
/// chain, with its own `super` bound one level further.
pub fn super_value(
    config: &EvalConfig,
    ctx: &Context,
    root: &Arc<TemplateNode>,
    blocks: Vec<Arc<Wrapper>>,
) -> Value {
    let config = config.inherit();
    let ctx = ctx.clone();
    let root = Arc::clone(root);
    Value::from_function(move |_, _| render_block_chain(&config, &ctx, &root, &blocks))
}

/// Turns a macro definition into a callable value. Default expressions are
/// evaluated once, in the definition scope.
pub fn macro_to_function(
    node: &Arc<MacroNode>,
    config: &EvalConfig,
    ctx: &Context,
    root: &Arc<TemplateNode>,
) -> Result<Value, String> {
    let evaluator = Evaluator::new(config, ctx);
    let mut defaults = Vec::with_capacity(node.defaults.len());
    for (key, expr) in &node.defaults {
        let value = evaluator.eval(expr);
        if value.is_error() {
            return Err(format!(
                "Unable to evaluate parameter {}={}: {}",
                key,
                expr,
                value.error_message()
            ));
        }
        defaults.push(KwArg::new(key.clone(), value));
    }

    let node = Arc::clone(node);
    let config = config.inherit();
    let ctx = ctx.clone();
    let root = Arc::clone(root);
    Ok(Value::from_function(move |_, params| {
        let reduced = match params.expect(node.args.len(), &defaults) {
            Ok(reduced) => reduced,
            Err(err) => {
                return Value::error(format!("Wrong '{}' macro signature: {}", node.name, err))
            }
        };
        let sub_ctx = ctx.inherit();
        for (idx, arg) in reduced.args.iter().enumerate() {
            sub_ctx.set(node.args[idx].clone(), arg.clone());
        }
        for (key, value) in &reduced.kwargs {
            sub_ctx.set(key.clone(), value.clone());
        }
        let mut out = Output::new();
        {
            let mut renderer =
                Renderer::new(config.inherit(), sub_ctx, Arc::clone(&root), &mut out);
            if let Err(err) = renderer.execute_wrapper(&node.wrapper) {
                return Value::error(format!(
                    "Unable to execute macro '{}': {}",
                    node.name, err
                ));
            }
        }
        Value::safe(Value::from(out.into_string()))
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::Trim;
    use crate::tokens::{Token, TokenType};

    fn data(text: &str) -> DataNode {
        DataNode {
            token: Token::new(TokenType::Data, text, 0, 1, 1),
            trim: Trim::default(),
            lstrip: false,
            trim_newline: false,
        }
    }

    #[test]
    fn test_write_data_plain() {
        let mut out = Output::new();
        out.write_data(&data("  hello  "));
        assert_eq!(out.as_str(), "  hello  ");
    }

    #[test]
    fn test_write_data_explicit_trims() {
        let mut out = Output::new();
        let mut node = data("  hello\n");
        node.trim = Trim {
            left: true,
            right: true,
        };
        out.write_data(&node);
        assert_eq!(out.as_str(), "hello");
    }

    #[test]
    fn test_write_data_trim_newline() {
        let mut out = Output::new();
        let mut node = data("\n  rest");
        node.trim_newline = true;
        out.write_data(&node);
        assert_eq!(out.as_str(), "  rest");
    }

    #[test]
    fn test_write_data_lstrip_strips_indent() {
        let mut out = Output::new();
        let mut node = data("text\n   ");
        node.lstrip = true;
        out.write_data(&node);
        assert_eq!(out.as_str(), "text\n");
    }

    #[test]
    fn test_write_data_lstrip_keeps_inline_content() {
        // The tag is not alone on its line: nothing stripped.
        let mut out = Output::new();
        out.write_str("value");
        let mut node = data("   ");
        node.lstrip = true;
        out.write_data(&node);
        assert_eq!(out.as_str(), "value   ");
    }

    #[test]
    fn test_write_data_lstrip_at_buffer_start() {
        let mut out = Output::new();
        let mut node = data("  ");
        node.lstrip = true;
        out.write_data(&node);
        assert_eq!(out.as_str(), "");
    }
}
