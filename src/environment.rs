//! The environment: configuration, registries, loader and template cache.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::config::Config;
use crate::error::{GingerResult, LoaderError};
use crate::eval::{EvalConfig, FilterFunction, Global, TestFunction};
use crate::loader::Loader;
use crate::statements::StatementParser;
use crate::template::Template;
use crate::{filters, globals, statements, testers};

/// Owns everything shared across templates: configuration, the
/// filter/test/statement registries, globals, the loader and a
/// thread-safe AST cache keyed by template name.
///
/// Registries are meant to be mutated during setup only; renders treat
/// them as read-only.
///
/// # Examples
///
/// ```
/// use ginger::Environment;
///
/// let env = Environment::default();
/// let tpl = env.from_string("Hello, {{ name }}!").unwrap();
/// let out = tpl.render(&serde_json::json!({"name": "World"})).unwrap();
/// assert_eq!(out, "Hello, World!");
/// ```
pub struct Environment {
    eval_config: EvalConfig,
    cache: Mutex<HashMap<String, Arc<Template>>>,
}

impl Environment {
    /// An environment with the built-in registries and no loader.
    pub fn new(config: Config) -> Self {
        let mut eval_config = EvalConfig::new(config);
        eval_config.filters = Arc::new(filters::default_filters());
        eval_config.statements = Arc::new(statements::default_statements());
        eval_config.tests = Arc::new(testers::default_tests());
        eval_config.globals = Arc::new(globals::default_globals());
        Environment {
            eval_config,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// An environment that resolves `extends`/`include`/`import` through
    /// the given loader.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::Arc;
    /// use ginger::{Config, Environment, MemoryLoader};
    ///
    /// let mut loader = MemoryLoader::new();
    /// loader.add_template("hello.tpl", "Hello, {{ name }}!");
    ///
    /// let env = Environment::with_loader(Config::default(), Arc::new(loader));
    /// let tpl = env.from_file("hello.tpl").unwrap();
    /// let out = tpl.render(&serde_json::json!({"name": "World"})).unwrap();
    /// assert_eq!(out, "Hello, World!");
    /// ```
    pub fn with_loader(config: Config, loader: Arc<dyn Loader>) -> Self {
        let mut env = Environment::new(config);
        env.eval_config.loader = Some(loader);
        env
    }

    pub fn set_loader(&mut self, loader: Arc<dyn Loader>) {
        self.eval_config.loader = Some(loader);
    }

    pub fn config(&self) -> &Config {
        &self.eval_config.config
    }

    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.eval_config.config
    }

    pub fn eval_config(&self) -> &EvalConfig {
        &self.eval_config
    }

    // --- Registry setup ---

    /// Registers a new filter.
    ///
    /// # Errors
    ///
    /// Fails if a filter with the given name is already registered; use
    /// [`Environment::replace_filter`] to override one on purpose.
    pub fn add_filter(&mut self, name: &str, f: FilterFunction) -> Result<(), String> {
        Arc::make_mut(&mut self.eval_config.filters).register(name, f)
    }

    /// Replaces an already registered filter.
    ///
    /// # Errors
    ///
    /// Fails if no filter with the given name exists.
    pub fn replace_filter(&mut self, name: &str, f: FilterFunction) -> Result<(), String> {
        Arc::make_mut(&mut self.eval_config.filters).replace(name, f)
    }

    /// Registers a new test.
    ///
    /// # Errors
    ///
    /// Fails if a test with the given name is already registered.
    pub fn add_test(&mut self, name: &str, f: TestFunction) -> Result<(), String> {
        Arc::make_mut(&mut self.eval_config.tests).register(name, f)
    }

    /// Registers a new statement parser.
    ///
    /// # Errors
    ///
    /// Fails if a statement with the given name is already registered.
    pub fn add_statement(&mut self, name: &str, parser: StatementParser) -> Result<(), String> {
        Arc::make_mut(&mut self.eval_config.statements).register(name, parser)
    }

    /// Binds a global into the root context of every future render,
    /// overwriting any global of the same name.
    pub fn set_global(&mut self, name: &str, global: Global) {
        Arc::make_mut(&mut self.eval_config.globals).set(name, global);
    }

    // --- Template creation ---

    /// Parses a template from a source string.
    ///
    /// # Errors
    ///
    /// Returns a [`crate::ParseError`] when the source fails to lex or
    /// parse, and a loader error when a statically referenced template
    /// (`extends`, `include`, `import` with a literal path) cannot be
    /// loaded.
    ///
    /// # Examples
    ///
    /// ```
    /// use ginger::Environment;
    ///
    /// let env = Environment::default();
    /// let tpl = env.from_string("{{ 2 + 2 }}").unwrap();
    /// assert_eq!(tpl.render(&serde_json::json!(null)).unwrap(), "4");
    /// ```
    pub fn from_string(&self, source: impl Into<String>) -> GingerResult<Template> {
        Template::new("string", source.into(), self.eval_config.inherit())
    }

    /// Loads and parses a template through the loader.
    ///
    /// # Errors
    ///
    /// Returns a loader error when no loader is configured or the name
    /// does not resolve to a source, and a parse error when the loaded
    /// source is invalid.
    pub fn from_file(&self, name: &str) -> GingerResult<Template> {
        let loader = self
            .eval_config
            .loader
            .as_ref()
            .ok_or(LoaderError::NoLoader)?;
        let path = loader.path(name)?;
        let source = loader.get(&path)?;
        Template::new(name, source, self.eval_config.inherit())
    }

    /// Returns the cached template for `name`, loading and caching it on a
    /// miss. In debug mode every call re-parses so template edits show up
    /// immediately.
    ///
    /// # Arguments
    ///
    /// * `name` - The template name, as understood by the loader. Also
    ///   the cache key.
    ///
    /// # Returns
    ///
    /// A shared handle to the cached template; concurrent callers get the
    /// same parse.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`Environment::from_file`]; failed loads are
    /// not cached.
    pub fn from_cache(&self, name: &str) -> GingerResult<Arc<Template>> {
        if self.eval_config.config.debug {
            return self.from_file(name).map(Arc::new);
        }
        let mut cache = self.cache.lock().unwrap_or_else(|err| err.into_inner());
        if let Some(tpl) = cache.get(name) {
            return Ok(Arc::clone(tpl));
        }
        let tpl = Arc::new(self.from_file(name)?);
        cache.insert(name.to_string(), Arc::clone(&tpl));
        Ok(tpl)
    }

    /// Evicts the given names from the template cache, or clears it
    /// entirely when called without names.
    pub fn clean_cache(&self, names: &[&str]) {
        let mut cache = self.cache.lock().unwrap_or_else(|err| err.into_inner());
        if names.is_empty() {
            cache.clear();
            return;
        }
        for name in names {
            cache.remove(*name);
        }
    }
}

impl Default for Environment {
    fn default() -> Self {
        Environment::new(Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::MemoryLoader;
    use serde_json::json;

    fn env_with(templates: &[(&str, &str)]) -> Environment {
        let mut loader = MemoryLoader::new();
        for (name, source) in templates {
            loader.add_template(*name, *source);
        }
        Environment::with_loader(Config::default(), Arc::new(loader))
    }

    #[test]
    fn test_from_string_render() {
        let env = Environment::default();
        let tpl = env.from_string("{{ 1 + 2 }}").unwrap();
        assert_eq!(tpl.render(&json!(null)).unwrap(), "3");
    }

    #[test]
    fn test_from_cache_caches() {
        let env = env_with(&[("a.tpl", "hi {{ n }}")]);
        let first = env.from_cache("a.tpl").unwrap();
        let second = env.from_cache("a.tpl").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        env.clean_cache(&["a.tpl"]);
        let third = env.from_cache("a.tpl").unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
    }

    #[test]
    fn test_clean_cache_all() {
        let env = env_with(&[("a.tpl", "a"), ("b.tpl", "b")]);
        let a = env.from_cache("a.tpl").unwrap();
        let b = env.from_cache("b.tpl").unwrap();
        env.clean_cache(&[]);
        assert!(!Arc::ptr_eq(&a, &env.from_cache("a.tpl").unwrap()));
        assert!(!Arc::ptr_eq(&b, &env.from_cache("b.tpl").unwrap()));
    }

    #[test]
    fn test_debug_bypasses_cache() {
        let mut env = env_with(&[("a.tpl", "x")]);
        env.config_mut().debug = true;
        let first = env.from_cache("a.tpl").unwrap();
        let second = env.from_cache("a.tpl").unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_missing_template_is_loader_error() {
        let env = env_with(&[]);
        let err = env.from_file("nope.tpl").unwrap_err();
        assert!(err.to_string().contains("Template not found"));
    }

    #[test]
    fn test_custom_filter_registration() {
        fn shout(
            _e: &crate::eval::Evaluator<'_>,
            input: &crate::value::Value,
            _params: &crate::varargs::VarArgs,
        ) -> crate::value::Value {
            crate::value::Value::from(format!("{}!!", input))
        }
        let mut env = Environment::default();
        env.add_filter("shout", shout).unwrap();
        assert!(env.add_filter("shout", shout).is_err());
        let tpl = env.from_string("{{ 'hey' | shout }}").unwrap();
        assert_eq!(tpl.render(&json!(null)).unwrap(), "hey!!");
    }
}
