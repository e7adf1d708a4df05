pub type GingerResult<T> = std::result::Result<T, GingerError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// The lexer terminated the stream with an error token.
    Lexical { message: String },
    UnexpectedToken {
        expected: String,
        found: String,
    },
    UnexpectedEof {
        expected_what: String,
    },
    UnknownStatement {
        name: String,
    },
    DuplicateBlock {
        name: String,
    },
    ExtendsNotAtRoot,
    Expected {
        description: String,
    },
    Message(String),
}

impl std::fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseErrorKind::Lexical { message } => write!(f, "{}", message),
            ParseErrorKind::UnexpectedToken { expected, found } => {
                write!(f, "Expected {}, found {}", expected, found)
            }
            ParseErrorKind::UnexpectedEof { expected_what } => {
                write!(f, "Unexpected EOF{}", expected_what)
            }
            ParseErrorKind::UnknownStatement { name } => {
                write!(f, "Statement '{}' not found", name)
            }
            ParseErrorKind::DuplicateBlock { name } => {
                write!(f, "Block named '{}' already defined", name)
            }
            ParseErrorKind::ExtendsNotAtRoot => {
                write!(f, "The 'extends' statement can only be defined at root level")
            }
            ParseErrorKind::Expected { description } => {
                write!(f, "Expected {}", description)
            }
            ParseErrorKind::Message(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for ParseErrorKind {}

impl ParseErrorKind {
    pub fn unexpected_eof(expected: Option<String>) -> Self {
        ParseErrorKind::UnexpectedEof {
            expected_what: expected.map_or_else(String::new, |e| format!(", expected {}", e)),
        }
    }
}

/// A parse (or lex) error with the position of the offending token.
///
/// `near` carries the token text so the rendered message reads
/// `msg (Line: L Col: C, near "…")`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub line: usize,
    pub column: usize,
    pub near: String,
    pub kind: ParseErrorKind,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} (Line: {} Col: {}, near \"{}\")",
            self.kind, self.line, self.column, self.near
        )
    }
}

impl std::error::Error for ParseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.kind)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// An error value reached an output node or statement.
    Eval {
        message: String,
    },
    Statement {
        name: String,
        message: String,
    },
    UnknownBlock {
        name: String,
    },
    Loader(LoaderError),
    Message(String),
}

impl std::fmt::Display for RenderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RenderError::Eval { message } => write!(f, "Unable to render expression: {}", message),
            RenderError::Statement { name, message } => {
                write!(f, "Unable to execute statement '{}': {}", name, message)
            }
            RenderError::UnknownBlock { name } => {
                write!(f, "Unable to find block \"{}\"", name)
            }
            RenderError::Loader(err) => write!(f, "{}", err),
            RenderError::Message(msg) => write!(f, "Rendering error: {}", msg),
        }
    }
}

impl std::error::Error for RenderError {}

impl From<LoaderError> for RenderError {
    fn from(error: LoaderError) -> Self {
        RenderError::Loader(error)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoaderError {
    NotFound { name: String },
    Io { name: String, message: String },
    NoLoader,
}

impl std::fmt::Display for LoaderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoaderError::NotFound { name } => write!(f, "Template not found: {}", name),
            LoaderError::Io { name, message } => {
                write!(f, "Unable to read template '{}': {}", name, message)
            }
            LoaderError::NoLoader => write!(f, "No template loader configured"),
        }
    }
}

impl std::error::Error for LoaderError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GingerError {
    Parse(ParseError),
    Render(RenderError),
    Loader(LoaderError),
}

impl std::fmt::Display for GingerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GingerError::Parse(err) => write!(f, "{}", err),
            GingerError::Render(err) => write!(f, "{}", err),
            GingerError::Loader(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for GingerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GingerError::Parse(err) => Some(err),
            GingerError::Render(err) => Some(err),
            GingerError::Loader(err) => Some(err),
        }
    }
}

impl From<ParseError> for GingerError {
    fn from(error: ParseError) -> Self {
        GingerError::Parse(error)
    }
}

impl From<RenderError> for GingerError {
    fn from(error: RenderError) -> Self {
        GingerError::Render(error)
    }
}

impl From<LoaderError> for GingerError {
    fn from(error: LoaderError) -> Self {
        GingerError::Loader(error)
    }
}
