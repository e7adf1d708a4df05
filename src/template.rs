//! Template orchestration: source → tokens → AST → rendered string.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::Config;
use crate::context::Context;
use crate::error::{GingerError, GingerResult};
use crate::eval::EvalConfig;
use crate::nodes::TemplateNode;
use crate::parser;
use crate::renderer::{Output, Renderer};
use crate::value::Value;

/// Strips a single trailing newline from the source unless
/// `keep_trailing_newline` is set. Runs before lexing, so whitespace
/// control sees the adjusted source.
pub fn prepare_source(source: String, config: &Config) -> String {
    if config.keep_trailing_newline {
        return source;
    }
    if let Some(stripped) = source.strip_suffix("\r\n") {
        return stripped.to_string();
    }
    if let Some(stripped) = source.strip_suffix('\n') {
        return stripped.to_string();
    }
    source
}

/// A parsed template: the cached AST plus everything needed to render it.
///
/// Parsing happens once in [`Template::new`]; each render allocates a
/// fresh context and output buffer, so a `Template` can be rendered
/// concurrently from multiple threads.
pub struct Template {
    pub name: String,
    pub source: String,
    env: EvalConfig,
    root: Arc<TemplateNode>,
}

impl std::fmt::Debug for Template {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Template")
            .field("name", &self.name)
            .field("source", &self.source)
            .finish()
    }
}

impl Template {
    /// Parses `source` into a renderable template.
    ///
    /// # Errors
    ///
    /// Returns a [`crate::ParseError`] when the source fails to lex or
    /// parse; templates referenced with a literal path (`extends`,
    /// `include`, `import`) are loaded here too, so their loader and
    /// parse failures surface as well.
    pub fn new(name: &str, source: String, env: EvalConfig) -> GingerResult<Self> {
        let prepared = prepare_source(source, &env.config);
        let root = parser::parse(
            name,
            &prepared,
            &env.config,
            &env.statements,
            Some(&|n: &str| env.get_template(n)),
        )?;
        Ok(Template {
            name: name.to_string(),
            source: prepared,
            env,
            root: Arc::new(root),
        })
    }

    /// The parsed AST root.
    pub fn root(&self) -> &Arc<TemplateNode> {
        &self.root
    }

    /// Renders with variables taken from a JSON object (`null` renders an
    /// empty context).
    ///
    /// # Errors
    ///
    /// Returns a [`crate::RenderError`] when evaluation fails: an error
    /// value reaching an output node, a failing statement, filter, test
    /// or macro call, or a template that a dynamic `include`/`import`
    /// cannot load.
    ///
    /// # Examples
    ///
    /// ```
    /// use ginger::Environment;
    ///
    /// let env = Environment::default();
    /// let tpl = env.from_string("Hello, {{ name | upper }}!").unwrap();
    /// let out = tpl.render(&serde_json::json!({"name": "ada"})).unwrap();
    /// assert_eq!(out, "Hello, ADA!");
    /// ```
    pub fn render(&self, data: &serde_json::Value) -> GingerResult<String> {
        let mut variables = HashMap::new();
        if let serde_json::Value::Object(map) = data {
            for (key, value) in map {
                variables.insert(key.clone(), Value::from(value.clone()));
            }
        }
        self.render_values(variables)
    }

    /// Renders with an explicit variable map.
    ///
    /// # Arguments
    ///
    /// * `variables` - Name/value bindings for the render's root scope;
    ///   they shadow globals of the same name.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`Template::render`].
    pub fn render_values(&self, variables: HashMap<String, Value>) -> GingerResult<String> {
        let globals = Context::new();
        for (name, global) in self.env.globals.iter() {
            globals.set(name.clone(), global.to_value());
        }
        let ctx = globals.inherit();
        for (name, value) in variables {
            ctx.set(name, value);
        }

        let mut out = Output::new();
        {
            let mut renderer =
                Renderer::new(self.env.inherit(), ctx, Arc::clone(&self.root), &mut out);
            renderer.execute().map_err(GingerError::Render)?;
        }
        let mut rendered = out.into_string();
        if self.env.config.newline_sequence != "\n" {
            rendered = rendered.replace('\n', &self.env.config.newline_sequence);
        }
        Ok(rendered)
    }
}
