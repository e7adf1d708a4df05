//! The template scanner.
//!
//! A state machine walks the source and emits tokens: literal data until a
//! delimiter prefix, then comment/variable/block states, with a dedicated
//! expression state for everything between an opening and a closing tag.
//! Raw-verbatim statements (`raw`, `comment`) switch the lexer into a scan
//! for the matching `{% end<name>` terminator so their body is emitted as a
//! single data token. A stack of bracket delimiters keeps `}}` inside an
//! unbalanced `{` from closing the surrounding variable tag.

use std::collections::HashMap;

use log::trace;
use regex::Regex;

use crate::config::Config;
use crate::tokens::{Token, TokenType};

enum State {
    Data,
    Comment,
    Variable,
    VariableEnd,
    Block,
    BlockEnd,
    Expression,
    Space,
    Number,
    Identifier,
    Str,
    Raw,
    Done,
}

pub struct Lexer<'a> {
    input: &'a str,
    start: usize,
    pos: usize,
    width: usize,
    config: &'a Config,
    tokens: Vec<Token>,
    delimiters: Vec<char>,
    raw_statements: HashMap<&'static str, Regex>,
    raw_end: Option<Regex>,
}

/// Lexes `input` into a token list terminated by an EOF or Error token.
pub fn lex(input: &str, config: &Config) -> Vec<Token> {
    Lexer::new(input, config).run()
}

fn readable_position(pos: usize, input: &str) -> (usize, usize) {
    let before = &input[..pos];
    let line = before.matches('\n').count() + 1;
    let col = match before.rfind('\n') {
        Some(idx) => before[idx + 1..].chars().count() + 1,
        None => before.chars().count() + 1,
    };
    (line, col)
}

fn is_alphanumeric(c: char) -> bool {
    c == '_' || c.is_alphanumeric()
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str, config: &'a Config) -> Self {
        let block_start = regex::escape(&config.block_start_string);
        let mut raw_statements = HashMap::new();
        for name in ["raw", "comment"] {
            // The pattern is built from escaped config strings, so it always compiles.
            if let Ok(re) = Regex::new(&format!(r"{}[-+]?\s*end{}", block_start, name)) {
                raw_statements.insert(name, re);
            }
        }
        Lexer {
            input,
            start: 0,
            pos: 0,
            width: 0,
            config,
            tokens: Vec::new(),
            delimiters: Vec::new(),
            raw_statements,
            raw_end: None,
        }
    }

    pub fn run(mut self) -> Vec<Token> {
        let mut state = State::Data;
        loop {
            state = match state {
                State::Data => self.lex_data(),
                State::Comment => self.lex_comment(),
                State::Variable => self.lex_variable(),
                State::VariableEnd => self.lex_variable_end(),
                State::Block => self.lex_block(),
                State::BlockEnd => self.lex_block_end(),
                State::Expression => self.lex_expression(),
                State::Space => self.lex_space(),
                State::Number => self.lex_number(),
                State::Identifier => self.lex_identifier(),
                State::Str => self.lex_string(),
                State::Raw => self.lex_raw(),
                State::Done => break,
            };
        }
        self.tokens
    }

    fn next(&mut self) -> Option<char> {
        if self.pos >= self.input.len() {
            self.width = 0;
            return None;
        }
        let c = self.input[self.pos..].chars().next()?;
        self.width = c.len_utf8();
        self.pos += self.width;
        Some(c)
    }

    fn backup(&mut self) {
        self.pos -= self.width;
    }

    fn peek(&mut self) -> Option<char> {
        let c = self.next();
        if c.is_some() {
            self.backup();
        }
        c
    }

    fn accept(&mut self, valid: &str) -> bool {
        if let Some(c) = self.next() {
            if valid.contains(c) {
                return true;
            }
            self.backup();
        }
        false
    }

    fn has_prefix(&self, prefix: &str) -> bool {
        self.input[self.pos..].starts_with(prefix)
    }

    fn current(&self) -> &str {
        &self.input[self.start..self.pos]
    }

    fn remaining(&self) -> &str {
        &self.input[self.pos..]
    }

    fn emit(&mut self, ty: TokenType) {
        self.process_and_emit(ty, None);
    }

    fn process_and_emit(&mut self, ty: TokenType, process: Option<fn(&str) -> String>) {
        let (line, col) = readable_position(self.start, self.input);
        let raw = self.current();
        let val = match process {
            Some(f) => f(raw),
            None => raw.to_string(),
        };
        trace!("emit {} {:?}", ty, val);
        self.tokens.push(Token::new(ty, val, self.start, line, col));
        self.start = self.pos;
    }

    fn errorf(&mut self, message: String) -> State {
        let (line, col) = readable_position(self.pos, self.input);
        self.tokens
            .push(Token::new(TokenType::Error, message, self.pos, line, col));
        State::Done
    }

    fn push_delimiter(&mut self, c: char) {
        self.delimiters.push(c);
    }

    fn pop_delimiter(&mut self, c: char) -> Result<(), State> {
        match self.delimiters.last().copied() {
            None => Err(self.errorf(format!("Unexpected delimiter \"{}\"", c))),
            Some(expected) if expected != c => Err(self.errorf(format!(
                "Unbalanced delimiters, expected \"{}\", got \"{}\"",
                expected, c
            ))),
            Some(_) => {
                self.delimiters.pop();
                Ok(())
            }
        }
    }

    /// Whether the next rune is the closing bracket we are waiting for.
    fn expect_delimiter(&self, c: Option<char>) -> bool {
        match (self.delimiters.last(), c) {
            (Some(&expected), Some(c)) => expected == c,
            _ => false,
        }
    }

    fn lex_data(&mut self) -> State {
        loop {
            if self.has_prefix(&self.config.comment_start_string) {
                if self.pos > self.start {
                    self.emit(TokenType::Data);
                }
                return State::Comment;
            }
            if self.has_prefix(&self.config.variable_start_string) {
                if self.pos > self.start {
                    self.emit(TokenType::Data);
                }
                return State::Variable;
            }
            if self.has_prefix(&self.config.block_start_string) {
                if self.pos > self.start {
                    self.emit(TokenType::Data);
                }
                return State::Block;
            }
            if self.next().is_none() {
                break;
            }
        }
        if self.pos > self.start {
            self.emit(TokenType::Data);
        }
        self.emit(TokenType::Eof);
        State::Done
    }

    fn lex_raw(&mut self) -> State {
        let re = match self.raw_end.take() {
            Some(re) => re,
            None => return self.errorf("Unable to find raw closing statement".to_string()),
        };
        match re.find(self.remaining()) {
            Some(m) => {
                self.pos += m.start();
                self.emit(TokenType::Data);
                State::Block
            }
            None => self.errorf("Unable to find raw closing statement".to_string()),
        }
    }

    fn lex_comment(&mut self) -> State {
        self.pos += self.config.comment_start_string.len();
        self.accept("-");
        self.emit(TokenType::CommentBegin);
        match self.remaining().find(&self.config.comment_end_string) {
            None => self.errorf("unclosed comment".to_string()),
            Some(mut i) => {
                // A trailing `-` belongs to the closing tag, not the text.
                if i > 0 && self.remaining()[..i].ends_with('-') {
                    i -= 1;
                }
                self.pos += i;
                self.emit(TokenType::Data);
                self.accept("-");
                self.pos += self.config.comment_end_string.len();
                self.emit(TokenType::CommentEnd);
                State::Data
            }
        }
    }

    fn lex_variable(&mut self) -> State {
        self.pos += self.config.variable_start_string.len();
        self.accept("-");
        self.emit(TokenType::VariableBegin);
        State::Expression
    }

    fn lex_variable_end(&mut self) -> State {
        self.accept("-");
        self.pos += self.config.variable_end_string.len();
        self.emit(TokenType::VariableEnd);
        State::Data
    }

    fn lex_block(&mut self) -> State {
        self.pos += self.config.block_start_string.len();
        self.accept("+-");
        self.emit(TokenType::BlockBegin);
        while matches!(self.peek(), Some(c) if c == ' ' || c == '\t' || c == '\r' || c == '\n') {
            self.next();
        }
        if !self.current().is_empty() {
            self.emit(TokenType::Whitespace);
        }
        let stmt = self.next_identifier().to_string();
        self.emit(TokenType::Name);
        if let Some(re) = self.raw_statements.get(stmt.as_str()) {
            self.raw_end = Some(re.clone());
        }
        State::Expression
    }

    fn lex_block_end(&mut self) -> State {
        self.accept("-");
        self.pos += self.config.block_end_string.len();
        self.emit(TokenType::BlockEnd);
        if self.raw_end.is_some() {
            State::Raw
        } else {
            State::Data
        }
    }

    fn lex_expression(&mut self) -> State {
        loop {
            let peeked = self.peek();
            if !self.expect_delimiter(peeked) {
                if self.has_prefix(&self.config.variable_end_string) {
                    return State::VariableEnd;
                }
                if self.has_prefix(&self.config.block_end_string) {
                    return State::BlockEnd;
                }
            }

            let c = match self.next() {
                Some(c) => c,
                None => return State::Data,
            };

            if c == ' ' || c == '\t' {
                return State::Space;
            }
            if c.is_ascii_digit() {
                return State::Number;
            }
            if is_alphanumeric(c) {
                return State::Identifier;
            }

            match c {
                '"' | '\'' => {
                    self.backup();
                    return State::Str;
                }
                ',' => self.emit(TokenType::Comma),
                '|' => self.emit(TokenType::Pipe),
                '+' => self.emit(TokenType::Add),
                '-' => {
                    if self.has_prefix(&self.config.block_end_string) {
                        self.backup();
                        return State::BlockEnd;
                    } else if self.has_prefix(&self.config.variable_end_string) {
                        self.backup();
                        return State::VariableEnd;
                    } else {
                        self.emit(TokenType::Sub);
                    }
                }
                '~' => self.emit(TokenType::Tilde),
                ':' => self.emit(TokenType::Colon),
                '.' => self.emit(TokenType::Dot),
                '%' => self.emit(TokenType::Mod),
                '/' => {
                    if self.accept("/") {
                        self.emit(TokenType::Floordiv);
                    } else {
                        self.emit(TokenType::Div);
                    }
                }
                '<' => {
                    if self.accept("=") {
                        self.emit(TokenType::Lteq);
                    } else {
                        self.emit(TokenType::Lt);
                    }
                }
                '>' => {
                    if self.accept("=") {
                        self.emit(TokenType::Gteq);
                    } else {
                        self.emit(TokenType::Gt);
                    }
                }
                '*' => {
                    if self.accept("*") {
                        self.emit(TokenType::Pow);
                    } else {
                        self.emit(TokenType::Mul);
                    }
                }
                '!' => {
                    if self.accept("=") {
                        self.emit(TokenType::Ne);
                    } else {
                        return self.errorf("Unexpected \"!\"".to_string());
                    }
                }
                '=' => {
                    if self.accept("=") {
                        self.emit(TokenType::Eq);
                    } else {
                        self.emit(TokenType::Assign);
                    }
                }
                '(' => {
                    self.emit(TokenType::Lparen);
                    self.push_delimiter(')');
                }
                '{' => {
                    self.emit(TokenType::Lbrace);
                    self.push_delimiter('}');
                }
                '[' => {
                    self.emit(TokenType::Lbracket);
                    self.push_delimiter(']');
                }
                ')' => {
                    if let Err(state) = self.pop_delimiter(')') {
                        return state;
                    }
                    self.emit(TokenType::Rparen);
                }
                '}' => {
                    if let Err(state) = self.pop_delimiter('}') {
                        return state;
                    }
                    self.emit(TokenType::Rbrace);
                }
                ']' => {
                    if let Err(state) = self.pop_delimiter(']') {
                        return state;
                    }
                    self.emit(TokenType::Rbracket);
                }
                '\n' | '\r' => return State::Space,
                _ => {
                    return self.errorf(format!("Unexpected character \"{}\"", c));
                }
            }
        }
    }

    fn lex_space(&mut self) -> State {
        while matches!(self.peek(), Some(c) if c == ' ' || c == '\t' || c == '\r' || c == '\n') {
            self.next();
        }
        self.emit(TokenType::Whitespace);
        State::Expression
    }

    fn next_identifier(&mut self) -> &str {
        loop {
            match self.next() {
                Some(c) if is_alphanumeric(c) => continue,
                Some(_) => {
                    self.backup();
                    break;
                }
                None => break,
            }
        }
        self.current()
    }

    fn lex_identifier(&mut self) -> State {
        self.next_identifier();
        self.emit(TokenType::Name);
        State::Expression
    }

    fn lex_number(&mut self) -> State {
        let mut ty = TokenType::Integer;
        loop {
            match self.next() {
                Some(c) if c.is_ascii_digit() => continue,
                Some('.') => {
                    if ty == TokenType::Float {
                        return self.errorf("two dots in numeric token".to_string());
                    }
                    ty = TokenType::Float;
                }
                Some(c) if is_alphanumeric(c) && ty == TokenType::Integer => {
                    return State::Identifier;
                }
                Some(_) => {
                    self.backup();
                    self.emit(ty);
                    return State::Expression;
                }
                None => {
                    self.emit(ty);
                    return State::Expression;
                }
            }
        }
    }

    fn lex_string(&mut self) -> State {
        let quote = match self.next() {
            Some(c) => c,
            None => return State::Data,
        };
        let mut prev = quote;
        loop {
            match self.next() {
                None => return self.errorf("unclosed string".to_string()),
                Some(c) => {
                    if c == quote && prev != '\\' {
                        break;
                    }
                    prev = c;
                }
            }
        }
        self.process_and_emit(TokenType::String, Some(unescape));
        State::Expression
    }
}

fn unescape(raw: &str) -> String {
    let inner = &raw[1..raw.len() - 1];
    inner.replace("\\\"", "\"").replace("\\'", "'")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn types(input: &str) -> Vec<TokenType> {
        let config = Config::default();
        lex(input, &config)
            .into_iter()
            .filter(|t| t.ty != TokenType::Whitespace)
            .map(|t| t.ty)
            .collect()
    }

    fn vals(input: &str) -> Vec<(TokenType, String)> {
        let config = Config::default();
        lex(input, &config)
            .into_iter()
            .filter(|t| t.ty != TokenType::Whitespace)
            .map(|t| (t.ty, t.val))
            .collect()
    }

    #[test]
    fn test_plain_data() {
        assert_eq!(types("hello"), vec![TokenType::Data, TokenType::Eof]);
    }

    #[test]
    fn test_variable_tag() {
        assert_eq!(
            types("{{ name }}"),
            vec![
                TokenType::VariableBegin,
                TokenType::Name,
                TokenType::VariableEnd,
                TokenType::Eof
            ]
        );
    }

    #[test]
    fn test_block_tag_with_expression() {
        assert_eq!(
            types("{% if a == 1 %}x{% endif %}"),
            vec![
                TokenType::BlockBegin,
                TokenType::Name,
                TokenType::Name,
                TokenType::Eq,
                TokenType::Integer,
                TokenType::BlockEnd,
                TokenType::Data,
                TokenType::BlockBegin,
                TokenType::Name,
                TokenType::BlockEnd,
                TokenType::Eof
            ]
        );
    }

    #[test]
    fn test_trim_markers_kept_in_token_text() {
        let toks = vals("a {%- if x +%} b {{- c -}} d");
        let begin: Vec<&str> = toks
            .iter()
            .filter(|(ty, _)| {
                matches!(
                    ty,
                    TokenType::BlockBegin | TokenType::VariableBegin | TokenType::VariableEnd
                )
            })
            .map(|(_, v)| v.as_str())
            .collect();
        assert_eq!(begin, vec!["{%-", "{{-", "-}}"]);
    }

    #[test]
    fn test_string_escapes() {
        let toks = vals(r#"{{ "a \"b\" 'c'" }}"#);
        assert_eq!(toks[1], (TokenType::String, "a \"b\" 'c'".to_string()));
        let toks = vals(r"{{ 'it\'s' }}");
        assert_eq!(toks[1], (TokenType::String, "it's".to_string()));
    }

    #[test]
    fn test_numbers() {
        let toks = vals("{{ 42 3.14 }}");
        assert_eq!(toks[1], (TokenType::Integer, "42".to_string()));
        assert_eq!(toks[2], (TokenType::Float, "3.14".to_string()));
    }

    #[test]
    fn test_two_dots_in_number_is_error() {
        let toks = vals("{{ 1.2.3 }}");
        assert!(toks
            .iter()
            .any(|(ty, v)| *ty == TokenType::Error && v.contains("two dots")));
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            types("{{ a + b - c * d / e // f % g ** h ~ i }}"),
            vec![
                TokenType::VariableBegin,
                TokenType::Name,
                TokenType::Add,
                TokenType::Name,
                TokenType::Sub,
                TokenType::Name,
                TokenType::Mul,
                TokenType::Name,
                TokenType::Div,
                TokenType::Name,
                TokenType::Floordiv,
                TokenType::Name,
                TokenType::Mod,
                TokenType::Name,
                TokenType::Pow,
                TokenType::Name,
                TokenType::Tilde,
                TokenType::Name,
                TokenType::VariableEnd,
                TokenType::Eof
            ]
        );
    }

    #[test]
    fn test_lone_bang_is_error() {
        let toks = vals("{{ !x }}");
        assert!(toks
            .iter()
            .any(|(ty, v)| *ty == TokenType::Error && v.contains("Unexpected \"!\"")));
    }

    #[test]
    fn test_braces_inside_variable_tag() {
        // The bracket stack keeps `}` from terminating the `{{` tag early.
        assert_eq!(
            types("{{ {'a': 'b'} }}"),
            vec![
                TokenType::VariableBegin,
                TokenType::Lbrace,
                TokenType::String,
                TokenType::Colon,
                TokenType::String,
                TokenType::Rbrace,
                TokenType::VariableEnd,
                TokenType::Eof
            ]
        );
    }

    #[test]
    fn test_unbalanced_delimiters() {
        let toks = vals("{{ (a] }}");
        assert!(toks
            .iter()
            .any(|(ty, v)| *ty == TokenType::Error && v.contains("Unbalanced delimiters")));
        let toks = vals("{{ a) }}");
        assert!(toks
            .iter()
            .any(|(ty, v)| *ty == TokenType::Error && v.contains("Unexpected delimiter")));
    }

    #[test]
    fn test_comment() {
        assert_eq!(
            vals("a{# note #}b")
                .iter()
                .map(|(ty, _)| *ty)
                .collect::<Vec<_>>(),
            vec![
                TokenType::Data,
                TokenType::CommentBegin,
                TokenType::Data,
                TokenType::CommentEnd,
                TokenType::Data,
                TokenType::Eof
            ]
        );
    }

    #[test]
    fn test_unclosed_comment() {
        let toks = vals("{# never closed");
        assert!(toks
            .iter()
            .any(|(ty, v)| *ty == TokenType::Error && v.contains("unclosed comment")));
    }

    #[test]
    fn test_raw_region() {
        let toks = vals("{% raw %}{{ not a tag }}{% endraw %}");
        let data: Vec<&str> = toks
            .iter()
            .filter(|(ty, _)| *ty == TokenType::Data)
            .map(|(_, v)| v.as_str())
            .collect();
        assert_eq!(data, vec!["{{ not a tag }}"]);
    }

    #[test]
    fn test_raw_region_unclosed() {
        let toks = vals("{% raw %}{{ x }}");
        assert!(toks
            .iter()
            .any(|(ty, v)| *ty == TokenType::Error && v.contains("raw closing")));
    }

    #[test]
    fn test_positions() {
        let config = Config::default();
        let toks = lex("ab\n{{ x }}", &config);
        let name = toks.iter().find(|t| t.ty == TokenType::Name).unwrap();
        assert_eq!(name.line, 2);
        assert_eq!(name.col, 4);
        assert_eq!(name.pos, 6);
    }

    #[test]
    fn test_custom_delimiters() {
        let config = Config {
            variable_start_string: "<<".to_string(),
            variable_end_string: ">>".to_string(),
            ..Config::default()
        };
        let toks: Vec<TokenType> = lex("a << x >> b", &config)
            .into_iter()
            .filter(|t| t.ty != TokenType::Whitespace)
            .map(|t| t.ty)
            .collect();
        assert_eq!(
            toks,
            vec![
                TokenType::Data,
                TokenType::VariableBegin,
                TokenType::Name,
                TokenType::VariableEnd,
                TokenType::Data,
                TokenType::Eof
            ]
        );
    }
}
