//! Expression parsing: the precedence ladder, filter chains and tests.
//!
//! Lowest to highest: filter application, `or`, `and`, `not`, comparisons
//! (including `in` / `not in` and the trailing `is` test), `+`/`-`, `~`,
//! `*`//`//`/`%`, unary sign, `**`, then atoms.

use log::trace;

use crate::error::{GingerError, ParseErrorKind};
use crate::nodes::{Expression, FilterCall, TestCall};
use crate::tokens::{Token, TokenType};

use super::Parser;

const COMPARE_OPS: &[TokenType] = &[
    TokenType::Eq,
    TokenType::Ne,
    TokenType::Gt,
    TokenType::Gteq,
    TokenType::Lt,
    TokenType::Lteq,
];

impl<'a> Parser<'a> {
    /// Parses a full expression with optional filters and test suffix.
    pub fn parse_expression(&mut self) -> Result<Expression, GingerError> {
        trace!("parse_expression: {}", self.current_token());
        let expr = self.parse_logical_expression()?;
        self.parse_filter_expression(expr)
    }

    /// Wraps `expr` in a filter chain if a pipe follows.
    pub fn parse_filter_expression(
        &mut self,
        expr: Expression,
    ) -> Result<Expression, GingerError> {
        if self.current(&[TokenType::Pipe]).is_none() {
            return Ok(expr);
        }
        let mut filters = Vec::new();
        while self.match_type(TokenType::Pipe).is_some() {
            filters.push(self.parse_filter()?);
        }
        Ok(Expression::Filtered {
            expression: Box::new(expr),
            filters,
        })
    }

    /// Parses one filter call: a name, optionally followed by
    /// parenthesised arguments.
    pub fn parse_filter(&mut self) -> Result<FilterCall, GingerError> {
        let ident = match self.match_type(TokenType::Name) {
            Some(tok) => tok,
            None => {
                return Err(self.error_here(ParseErrorKind::Message(
                    "Filter name must be an identifier".to_string(),
                )))
            }
        };
        let mut filter = FilterCall {
            name: ident.val.clone(),
            token: ident,
            args: Vec::new(),
            kwargs: Vec::new(),
        };
        if self.match_type(TokenType::Lparen).is_some() {
            if self.current(&[TokenType::VariableEnd]).is_some() {
                return Err(self.error_here(ParseErrorKind::Message(
                    "Filter parameter required after '('".to_string(),
                )));
            }
            let (args, kwargs) = self.parse_call_args()?;
            filter.args = args;
            filter.kwargs = kwargs;
        }
        Ok(filter)
    }

    /// Parses `a, b, name=c, …)` including the closing paren. The opening
    /// paren has already been consumed. Trailing commas are permitted.
    pub(crate) fn parse_call_args(
        &mut self,
    ) -> Result<(Vec<Expression>, Vec<(String, Expression)>), GingerError> {
        let mut args = Vec::new();
        let mut kwargs: Vec<(String, Expression)> = Vec::new();
        if self.match_type(TokenType::Rparen).is_some() {
            return Ok((args, kwargs));
        }
        loop {
            let value = self.parse_expression()?;
            if self.match_type(TokenType::Assign).is_some() {
                let key = value.position().val.clone();
                let kw_value = self.parse_expression()?;
                kwargs.push((key, kw_value));
            } else {
                args.push(value);
            }
            if self.match_type(TokenType::Rparen).is_some() {
                break;
            }
            if self.match_type(TokenType::Comma).is_none() {
                return Err(self.error_here(ParseErrorKind::Expected {
                    description: "',' or ')'".to_string(),
                }));
            }
            if self.match_type(TokenType::Rparen).is_some() {
                break;
            }
        }
        Ok((args, kwargs))
    }

    pub fn parse_logical_expression(&mut self) -> Result<Expression, GingerError> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expression, GingerError> {
        let mut expr = self.parse_and()?;
        while self.current_name(&["or"]).is_some() {
            let op = self.next();
            let right = self.parse_and()?;
            expr = Expression::Binary {
                op,
                left: Box::new(expr),
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn parse_and(&mut self) -> Result<Expression, GingerError> {
        let mut expr = self.parse_not()?;
        while self.current_name(&["and"]).is_some() {
            let op = self.next();
            let right = self.parse_not()?;
            expr = Expression::Binary {
                op,
                left: Box::new(expr),
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn parse_not(&mut self) -> Result<Expression, GingerError> {
        let op = self.match_name(&["not"]);
        let expr = self.parse_compare()?;
        match op {
            Some(op) => Ok(Expression::Negation {
                op,
                term: Box::new(expr),
            }),
            None => Ok(expr),
        }
    }

    fn parse_compare(&mut self) -> Result<Expression, GingerError> {
        let mut expr = self.parse_math()?;
        loop {
            let op = if self.current(COMPARE_OPS).is_some()
                || self.current_name(&["in"]).is_some()
            {
                self.next()
            } else if self.current_name(&["not"]).is_some()
                && self.peek(&[TokenType::Name]).map(|t| t.val == "in") == Some(true)
            {
                // `not in` folds into a single operator token.
                let mut not_tok = self.next();
                let in_tok = self.next();
                not_tok.val = format!("{} {}", not_tok.val, in_tok.val);
                not_tok
            } else {
                break;
            };
            let right = self.parse_math()?;
            expr = Expression::Binary {
                op,
                left: Box::new(expr),
                right: Box::new(right),
            };
        }
        self.parse_test(expr)
    }

    /// Parses an optional `is [not] <test> [arg]` suffix. Filters bind
    /// before the test so `x | f is defined` tests the filtered value.
    pub fn parse_test(&mut self, expr: Expression) -> Result<Expression, GingerError> {
        let expr = self.parse_filter_expression(expr)?;
        if self.match_name(&["is"]).is_none() {
            return Ok(expr);
        }
        let not = self.match_name(&["not"]);
        let ident = self.next();
        if ident.ty == TokenType::Eof {
            return Err(self.error(
                ParseErrorKind::unexpected_eof(Some("a test name".to_string())),
                &ident,
            ));
        }
        let mut test = TestCall {
            name: ident.val.clone(),
            token: ident,
            args: Vec::new(),
            kwargs: Vec::new(),
        };

        // `x is divisibleby(3)` and `x is divisibleby 3` are both accepted.
        if self.match_type(TokenType::Lparen).is_some() {
            let (args, kwargs) = self.parse_call_args()?;
            test.args = args;
            test.kwargs = kwargs;
        } else if self.test_argument_follows() {
            let arg = self.parse_expression()?;
            test.args.push(arg);
        }

        let mut result = Expression::Test {
            expression: Box::new(expr),
            test,
        };
        if let Some(op) = not {
            result = Expression::Negation {
                op,
                term: Box::new(result),
            };
        }
        Ok(result)
    }

    /// Whether the current token can start a test argument expression.
    fn test_argument_follows(&self) -> bool {
        if self.current_name(&["and", "or", "else", "if", "in", "is", "not"]).is_some() {
            return false;
        }
        matches!(
            self.current_token().ty,
            TokenType::Integer
                | TokenType::Float
                | TokenType::String
                | TokenType::Name
                | TokenType::Lparen
                | TokenType::Lbracket
                | TokenType::Lbrace
                | TokenType::Sub
                | TokenType::Add
        )
    }

    pub fn parse_math(&mut self) -> Result<Expression, GingerError> {
        let mut expr = self.parse_concat()?;
        while let Some(op) = self.match_types(&[TokenType::Add, TokenType::Sub]) {
            let right = self.parse_concat()?;
            expr = binary(op, expr, right);
        }
        Ok(expr)
    }

    fn parse_concat(&mut self) -> Result<Expression, GingerError> {
        let mut expr = self.parse_math_prioritary()?;
        while let Some(op) = self.match_type(TokenType::Tilde) {
            let right = self.parse_math_prioritary()?;
            expr = binary(op, expr, right);
        }
        Ok(expr)
    }

    fn parse_math_prioritary(&mut self) -> Result<Expression, GingerError> {
        let mut expr = self.parse_unary()?;
        while let Some(op) = self.match_types(&[
            TokenType::Mul,
            TokenType::Div,
            TokenType::Floordiv,
            TokenType::Mod,
        ]) {
            let right = self.parse_unary()?;
            expr = binary(op, expr, right);
        }
        Ok(expr)
    }

    fn parse_unary(&mut self) -> Result<Expression, GingerError> {
        let sign = self.match_types(&[TokenType::Add, TokenType::Sub]);
        let expr = self.parse_power()?;
        match sign {
            Some(op) => {
                let negative = op.val == "-";
                Ok(Expression::Unary {
                    op,
                    negative,
                    term: Box::new(expr),
                })
            }
            None => Ok(expr),
        }
    }

    pub fn parse_power(&mut self) -> Result<Expression, GingerError> {
        let mut expr = self.parse_variable_or_literal()?;
        while let Some(op) = self.match_type(TokenType::Pow) {
            let right = self.parse_variable_or_literal()?;
            expr = binary(op, expr, right);
        }
        Ok(expr)
    }
}

fn binary(op: Token, left: Expression, right: Expression) -> Expression {
    Expression::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}
