//! Atom parsing: literals, collections and variable reference chains.

use log::trace;

use crate::error::{GingerError, ParseErrorKind};
use crate::nodes::{Expression, PairNode, Subscript};
use crate::tokens::TokenType;

use super::Parser;

impl<'a> Parser<'a> {
    fn parse_number(&mut self) -> Result<Expression, GingerError> {
        let tok = match self.match_types(&[TokenType::Integer, TokenType::Float]) {
            Some(tok) => tok,
            None => {
                return Err(self.error_here(ParseErrorKind::Expected {
                    description: "a number".to_string(),
                }))
            }
        };
        if tok.ty == TokenType::Integer {
            let value = tok
                .val
                .parse::<i64>()
                .map_err(|e| self.error(ParseErrorKind::Message(e.to_string()), &tok))?;
            Ok(Expression::Integer(tok, value))
        } else {
            let value = tok
                .val
                .parse::<f64>()
                .map_err(|e| self.error(ParseErrorKind::Message(e.to_string()), &tok))?;
            Ok(Expression::Float(tok, value))
        }
    }

    fn parse_string(&mut self) -> Result<Expression, GingerError> {
        let tok = match self.match_type(TokenType::String) {
            Some(tok) => tok,
            None => {
                return Err(self.error_here(ParseErrorKind::Expected {
                    description: "a string".to_string(),
                }))
            }
        };
        // Quote escapes were handled by the lexer; the rest here.
        let mut value = String::with_capacity(tok.val.len());
        let mut chars = tok.val.chars();
        while let Some(c) = chars.next() {
            if c != '\\' {
                value.push(c);
                continue;
            }
            match chars.next() {
                Some('n') => value.push('\n'),
                Some('r') => value.push('\r'),
                Some('t') => value.push('\t'),
                Some('\\') => value.push('\\'),
                Some(other) => {
                    value.push('\\');
                    value.push(other);
                }
                None => value.push('\\'),
            }
        }
        Ok(Expression::Str(tok, value))
    }

    fn parse_collection(&mut self) -> Result<Expression, GingerError> {
        match self.current_token().ty {
            TokenType::Lbracket => self.parse_list(),
            TokenType::Lparen => self.parse_tuple(),
            TokenType::Lbrace => self.parse_dict(),
            _ => Err(self.error_here(ParseErrorKind::Expected {
                description: "a collection".to_string(),
            })),
        }
    }

    fn parse_list(&mut self) -> Result<Expression, GingerError> {
        let token = match self.match_type(TokenType::Lbracket) {
            Some(tok) => tok,
            None => {
                return Err(self.error_here(ParseErrorKind::Expected {
                    description: "'['".to_string(),
                }))
            }
        };
        let mut items = Vec::new();
        if self.match_type(TokenType::Rbracket).is_some() {
            return Ok(Expression::List { token, items });
        }
        items.push(self.parse_expression()?);
        while self.match_type(TokenType::Comma).is_some() {
            if self.current(&[TokenType::Rbracket]).is_some() {
                break;
            }
            items.push(self.parse_expression()?);
        }
        if self.match_type(TokenType::Rbracket).is_none() {
            return Err(self.error_here(ParseErrorKind::Expected {
                description: "']'".to_string(),
            }));
        }
        Ok(Expression::List { token, items })
    }

    fn parse_tuple(&mut self) -> Result<Expression, GingerError> {
        let token = match self.match_type(TokenType::Lparen) {
            Some(tok) => tok,
            None => {
                return Err(self.error_here(ParseErrorKind::Expected {
                    description: "'('".to_string(),
                }))
            }
        };
        let first = self.parse_expression()?;
        let mut items = vec![first];
        let mut trailing_comma = false;
        while self.match_type(TokenType::Comma).is_some() {
            if self.current(&[TokenType::Rparen]).is_some() {
                trailing_comma = true;
                break;
            }
            items.push(self.parse_expression()?);
        }
        if self.match_type(TokenType::Rparen).is_none() {
            // Report at the opening paren.
            return Err(self.error(
                ParseErrorKind::Message("Unbalanced parenthesis".to_string()),
                &token,
            ));
        }
        if items.len() > 1 || trailing_comma {
            Ok(Expression::Tuple { token, items })
        } else {
            // A single parenthesised expression is just grouping.
            Ok(items.remove(0))
        }
    }

    fn parse_pair(&mut self) -> Result<PairNode, GingerError> {
        let key = self.parse_expression()?;
        if self.match_type(TokenType::Colon).is_none() {
            return Err(self.error_here(ParseErrorKind::Expected {
                description: "':'".to_string(),
            }));
        }
        let value = self.parse_expression()?;
        Ok(PairNode { key, value })
    }

    fn parse_dict(&mut self) -> Result<Expression, GingerError> {
        let token = match self.match_type(TokenType::Lbrace) {
            Some(tok) => tok,
            None => {
                return Err(self.error_here(ParseErrorKind::Expected {
                    description: "'{'".to_string(),
                }))
            }
        };
        let mut pairs = Vec::new();
        if self.current(&[TokenType::Rbrace]).is_none() {
            pairs.push(self.parse_pair()?);
        }
        while self.match_type(TokenType::Comma).is_some() {
            if self.current(&[TokenType::Rbrace]).is_some() {
                break;
            }
            pairs.push(self.parse_pair()?);
        }
        if self.match_type(TokenType::Rbrace).is_none() {
            return Err(self.error_here(ParseErrorKind::Expected {
                description: "'}'".to_string(),
            }));
        }
        Ok(Expression::Dict { token, pairs })
    }

    /// Parses a bare identifier plus its `.attr`, `[key]` and `(call)`
    /// suffixes. `true`/`false`/`none` resolve to literals.
    pub fn parse_variable(&mut self) -> Result<Expression, GingerError> {
        let tok = match self.match_type(TokenType::Name) {
            Some(tok) => tok,
            None => {
                return Err(self.error_here(ParseErrorKind::Expected {
                    description: "an identifier".to_string(),
                }))
            }
        };
        match tok.val.as_str() {
            "true" | "True" => return Ok(Expression::Bool(tok, true)),
            "false" | "False" => return Ok(Expression::Bool(tok, false)),
            "none" | "None" => return Ok(Expression::None(tok)),
            _ => {}
        }

        let mut variable = Expression::Name(tok);
        while !self.stream.eof() {
            if let Some(dot) = self.match_type(TokenType::Dot) {
                let part = match self.match_types(&[TokenType::Name, TokenType::Integer]) {
                    Some(tok) => tok,
                    None => {
                        return Err(self.error_here(ParseErrorKind::Message(
                            "This token is not allowed within a variable name".to_string(),
                        )))
                    }
                };
                let attr = if part.ty == TokenType::Name {
                    Subscript::Name(part.val)
                } else {
                    let index = part
                        .val
                        .parse::<i64>()
                        .map_err(|e| self.error(ParseErrorKind::Message(e.to_string()), &part))?;
                    Subscript::Index(index)
                };
                variable = Expression::Getattr {
                    token: dot,
                    node: Box::new(variable),
                    attr,
                };
            } else if let Some(bracket) = self.match_type(TokenType::Lbracket) {
                let part = match self.match_types(&[TokenType::String, TokenType::Integer]) {
                    Some(tok) => tok,
                    None => {
                        return Err(self.error_here(ParseErrorKind::Message(
                            "This token is not allowed within a variable name".to_string(),
                        )))
                    }
                };
                let key = if part.ty == TokenType::String {
                    Subscript::Name(part.val)
                } else {
                    let index = part
                        .val
                        .parse::<i64>()
                        .map_err(|e| self.error(ParseErrorKind::Message(e.to_string()), &part))?;
                    Subscript::Index(index)
                };
                if self.match_type(TokenType::Rbracket).is_none() {
                    return Err(self.error(
                        ParseErrorKind::Message("Unbalanced bracket".to_string()),
                        &bracket,
                    ));
                }
                variable = Expression::Getitem {
                    token: bracket,
                    node: Box::new(variable),
                    key,
                };
            } else if let Some(lparen) = self.match_type(TokenType::Lparen) {
                let (args, kwargs) = self.parse_call_args()?;
                variable = Expression::Call {
                    token: lparen,
                    func: Box::new(variable),
                    args,
                    kwargs,
                };
            } else {
                break;
            }
        }
        Ok(variable)
    }

    /// Dispatches on the current token to a literal, collection or
    /// variable reference.
    pub fn parse_variable_or_literal(&mut self) -> Result<Expression, GingerError> {
        let tok = self.current_token();
        trace!("parse_variable_or_literal: {}", tok);
        match tok.ty {
            TokenType::Integer | TokenType::Float => self.parse_number(),
            TokenType::String => self.parse_string(),
            TokenType::Lparen | TokenType::Lbrace | TokenType::Lbracket => self.parse_collection(),
            TokenType::Name => self.parse_variable(),
            TokenType::Error => Err(self.error_here(ParseErrorKind::Lexical {
                message: tok.val.clone(),
            })),
            TokenType::Eof => Err(self.error_here(ParseErrorKind::unexpected_eof(Some(
                "a number, string, keyword or identifier".to_string(),
            )))),
            _ => Err(self.error_here(ParseErrorKind::Expected {
                description: "either a number, string, keyword or identifier".to_string(),
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::Config;
    use crate::error::GingerError;
    use crate::nodes::{Expression, Subscript};
    use crate::statements;
    use crate::tokens::Stream;
    use crate::{lexer, parser::Parser};

    fn parse_expr(source: &str) -> Result<Expression, GingerError> {
        let config = Config::default();
        let registry = statements::default_statements();
        let tokens: Vec<_> = lexer::lex(source, &config)
            .into_iter()
            .filter(|t| {
                !matches!(
                    t.ty,
                    crate::tokens::TokenType::VariableBegin | crate::tokens::TokenType::VariableEnd
                )
            })
            .collect();
        let mut parser = Parser::new("expr", &config, &registry, Stream::new(tokens));
        parser.parse_expression()
    }

    #[test]
    fn test_literals() {
        assert!(matches!(parse_expr("{{ 1 }}").unwrap(), Expression::Integer(_, 1)));
        assert!(matches!(parse_expr("{{ 1.5 }}").unwrap(), Expression::Float(_, _)));
        assert!(matches!(parse_expr("{{ true }}").unwrap(), Expression::Bool(_, true)));
        assert!(matches!(parse_expr("{{ None }}").unwrap(), Expression::None(_)));
        match parse_expr(r"{{ 'a\nb' }}").unwrap() {
            Expression::Str(_, v) => assert_eq!(v, "a\nb"),
            other => panic!("expected string, got {}", other),
        }
    }

    #[test]
    fn test_grouping_vs_tuple() {
        assert!(matches!(parse_expr("{{ (1) }}").unwrap(), Expression::Integer(_, 1)));
        assert!(matches!(
            parse_expr("{{ (1,) }}").unwrap(),
            Expression::Tuple { .. }
        ));
        assert!(matches!(
            parse_expr("{{ (1, 2) }}").unwrap(),
            Expression::Tuple { .. }
        ));
    }

    #[test]
    fn test_unbalanced_paren_reported_at_open() {
        let err = parse_expr("{{ (1, 2 }}").unwrap_err();
        assert!(err.to_string().contains("Unbalanced parenthesis"));
    }

    #[test]
    fn test_variable_suffixes() {
        match parse_expr("{{ user.name }}").unwrap() {
            Expression::Getattr { attr, .. } => {
                assert_eq!(attr, Subscript::Name("name".to_string()))
            }
            other => panic!("expected getattr, got {}", other),
        }
        match parse_expr("{{ user['name'] }}").unwrap() {
            Expression::Getitem { key, .. } => {
                assert_eq!(key, Subscript::Name("name".to_string()))
            }
            other => panic!("expected getitem, got {}", other),
        }
        match parse_expr("{{ items[0] }}").unwrap() {
            Expression::Getitem { key, .. } => assert_eq!(key, Subscript::Index(0)),
            other => panic!("expected getitem, got {}", other),
        }
    }

    #[test]
    fn test_call_args_and_kwargs() {
        match parse_expr("{{ greet('X', greeting='Hi',) }}").unwrap() {
            Expression::Call { args, kwargs, .. } => {
                assert_eq!(args.len(), 1);
                assert_eq!(kwargs.len(), 1);
                assert_eq!(kwargs[0].0, "greeting");
            }
            other => panic!("expected call, got {}", other),
        }
    }

    #[test]
    fn test_precedence_or_and() {
        // a or b and c => a or (b and c)
        match parse_expr("{{ a or b and c }}").unwrap() {
            Expression::Binary { op, right, .. } => {
                assert_eq!(op.val, "or");
                match *right {
                    Expression::Binary { op, .. } => assert_eq!(op.val, "and"),
                    other => panic!("expected and on the right, got {}", other),
                }
            }
            other => panic!("expected binary, got {}", other),
        }
    }

    #[test]
    fn test_comparison_binds_tighter_than_and() {
        // a == 1 and b == 2
        match parse_expr("{{ a == 1 and b == 2 }}").unwrap() {
            Expression::Binary { op, left, right } => {
                assert_eq!(op.val, "and");
                assert!(matches!(*left, Expression::Binary { .. }));
                assert!(matches!(*right, Expression::Binary { .. }));
            }
            other => panic!("expected binary, got {}", other),
        }
    }

    #[test]
    fn test_unary_binds_looser_than_power() {
        // -2 ** 2 => -(2 ** 2)
        match parse_expr("{{ -2 ** 2 }}").unwrap() {
            Expression::Unary { negative, term, .. } => {
                assert!(negative);
                assert!(matches!(*term, Expression::Binary { .. }));
            }
            other => panic!("expected unary, got {}", other),
        }
    }

    #[test]
    fn test_filter_chain_binds_last() {
        match parse_expr("{{ a + b | upper | replace('x', 'y') }}").unwrap() {
            Expression::Filtered { expression, filters } => {
                assert!(matches!(*expression, Expression::Binary { .. }));
                assert_eq!(filters.len(), 2);
                assert_eq!(filters[0].name, "upper");
                assert_eq!(filters[1].name, "replace");
                assert_eq!(filters[1].args.len(), 2);
            }
            other => panic!("expected filtered, got {}", other),
        }
    }

    #[test]
    fn test_is_test_with_argument() {
        match parse_expr("{{ x is divisibleby 3 }}").unwrap() {
            Expression::Test { test, .. } => {
                assert_eq!(test.name, "divisibleby");
                assert_eq!(test.args.len(), 1);
            }
            other => panic!("expected test, got {}", other),
        }
    }

    #[test]
    fn test_is_not_wraps_in_negation() {
        match parse_expr("{{ x is not defined }}").unwrap() {
            Expression::Negation { term, .. } => {
                assert!(matches!(*term, Expression::Test { .. }))
            }
            other => panic!("expected negation, got {}", other),
        }
    }

    #[test]
    fn test_symbolic_test_name() {
        match parse_expr("{{ x is == 3 }}").unwrap() {
            Expression::Test { test, .. } => assert_eq!(test.name, "=="),
            other => panic!("expected test, got {}", other),
        }
    }

    #[test]
    fn test_not_in_operator() {
        match parse_expr("{{ x not in xs }}").unwrap() {
            Expression::Binary { op, .. } => assert_eq!(op.val, "not in"),
            other => panic!("expected binary, got {}", other),
        }
    }

    #[test]
    fn test_dict_literal() {
        match parse_expr("{{ {'a': 1, 'b': 2} }}").unwrap() {
            Expression::Dict { pairs, .. } => assert_eq!(pairs.len(), 2),
            other => panic!("expected dict, got {}", other),
        }
    }

    #[test]
    fn test_list_trailing_comma() {
        match parse_expr("{{ [1, 2,] }}").unwrap() {
            Expression::List { items, .. } => assert_eq!(items.len(), 2),
            other => panic!("expected list, got {}", other),
        }
    }
}
