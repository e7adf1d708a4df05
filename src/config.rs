/// Lexer and parser parameters.
///
/// The six delimiter strings are configurable; the defaults match Jinja2.
/// Whitespace-control flags are described in the renderer module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Recompile templates on every cache access when set.
    pub debug: bool,
    /// The string marking the beginning of a block. Defaults to `{%`.
    pub block_start_string: String,
    /// The string marking the end of a block. Defaults to `%}`.
    pub block_end_string: String,
    /// The string marking the beginning of a print statement. Defaults to `{{`.
    pub variable_start_string: String,
    /// The string marking the end of a print statement. Defaults to `}}`.
    pub variable_end_string: String,
    /// The string marking the beginning of a comment. Defaults to `{#`.
    pub comment_start_string: String,
    /// The string marking the end of a comment. Defaults to `#}`.
    pub comment_end_string: String,
    /// Remove the first newline after a block tag.
    pub trim_blocks: bool,
    /// Strip leading spaces and tabs from the start of a line to a block tag.
    pub lstrip_blocks: bool,
    /// Preserve the trailing newline of the template source.
    pub keep_trailing_newline: bool,
    /// Sequence that ends a line. Used when normalizing newlines on output.
    pub newline_sequence: String,
    /// HTML-escape string output of `{{ }}` expressions by default.
    pub autoescape: bool,
    /// Treat missing names, attributes and items as errors instead of nil.
    pub strict_undefined: bool,
    /// Free-form storage for extension configuration.
    pub extensions: std::collections::HashMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            debug: false,
            block_start_string: "{%".to_string(),
            block_end_string: "%}".to_string(),
            variable_start_string: "{{".to_string(),
            variable_end_string: "}}".to_string(),
            comment_start_string: "{#".to_string(),
            comment_end_string: "#}".to_string(),
            trim_blocks: false,
            lstrip_blocks: false,
            keep_trailing_newline: false,
            newline_sequence: "\n".to_string(),
            autoescape: false,
            strict_undefined: false,
            extensions: std::collections::HashMap::new(),
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Produces a child copy for scoped overrides.
    pub fn inherit(&self) -> Self {
        self.clone()
    }
}
