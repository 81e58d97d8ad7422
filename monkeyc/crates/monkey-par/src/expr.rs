//! Expression parsing using Pratt parsing (top-down operator precedence).
//!
//! Each token kind in expression position has a prefix handler; operators
//! additionally have infix handlers. `parse_expression` glues them together:
//! it parses a prefix expression, then keeps folding infix operators while
//! the next operator binds tighter than the current minimum.
//!
//! # Operator precedence (lowest to highest)
//!
//! | Level | Operators |
//! |-------|-----------|
//! | Equals | `==`, `!=` |
//! | LessGreater | `<`, `>` |
//! | Sum | `+`, `-` |
//! | Product | `*`, `/` |
//! | Prefix | `!x`, `-x` |
//! | Call | `f(x)`, `a[i]` |
//!
//! All binary operators are left-associative: the loop uses a strict `<`
//! against the peeked operator, so equal precedence folds to the left.

use monkey_lex::TokenKind;

use crate::ast::{
    ArrayLiteral, BooleanLiteral, CallExpression, Expression, FunctionLiteral, HashLiteral,
    Identifier, IfExpression, IndexExpression, InfixExpression, IntegerLiteral, PrefixExpression,
    StringLiteral,
};
use crate::Parser;

/// Binding power levels for Pratt parsing.
///
/// Derived ordering gives `Lowest < Equals < ... < Call`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
    Lowest,
    /// `==`, `!=`
    Equals,
    /// `<`, `>`
    LessGreater,
    /// `+`, `-`
    Sum,
    /// `*`, `/`
    Product,
    /// `!x`, `-x`
    Prefix,
    /// `f(x)`, `a[i]`
    Call,
}

impl Precedence {
    /// The binding power of a token appearing in infix position.
    fn of(kind: TokenKind) -> Precedence {
        match kind {
            TokenKind::Eq | TokenKind::NotEq => Precedence::Equals,
            TokenKind::Lt | TokenKind::Gt => Precedence::LessGreater,
            TokenKind::Plus | TokenKind::Minus => Precedence::Sum,
            TokenKind::Asterisk | TokenKind::Slash => Precedence::Product,
            TokenKind::LParen | TokenKind::LBracket => Precedence::Call,
            _ => Precedence::Lowest,
        }
    }
}

impl<'a> Parser<'a> {
    /// Parses an expression with the given minimum binding power.
    pub(crate) fn parse_expression(&mut self, precedence: Precedence) -> Option<Expression> {
        let mut left = self.parse_prefix()?;

        while !self.peek_token_is(TokenKind::Semicolon)
            && precedence < Precedence::of(self.peek_token().kind)
        {
            left = match self.peek_token().kind {
                TokenKind::Plus
                | TokenKind::Minus
                | TokenKind::Asterisk
                | TokenKind::Slash
                | TokenKind::Eq
                | TokenKind::NotEq
                | TokenKind::Lt
                | TokenKind::Gt => {
                    self.next_token();
                    self.parse_infix_expression(left)?
                }
                TokenKind::LParen => {
                    self.next_token();
                    self.parse_call_expression(left)?
                }
                TokenKind::LBracket => {
                    self.next_token();
                    self.parse_index_expression(left)?
                }
                _ => return Some(left),
            };
        }

        Some(left)
    }

    /// Dispatches on the current token's prefix handler.
    fn parse_prefix(&mut self) -> Option<Expression> {
        match self.cur_token().kind {
            TokenKind::Ident => Some(self.parse_identifier()),
            TokenKind::Int => self.parse_integer_literal(),
            TokenKind::True | TokenKind::False => Some(self.parse_boolean_literal()),
            TokenKind::Str => Some(self.parse_string_literal()),
            TokenKind::Bang | TokenKind::Minus => self.parse_prefix_expression(),
            TokenKind::LParen => self.parse_grouped_expression(),
            TokenKind::If => self.parse_if_expression(),
            TokenKind::Function => self.parse_function_literal(),
            TokenKind::LBracket => self.parse_array_literal(),
            TokenKind::LBrace => self.parse_hash_literal(),
            TokenKind::Illegal => {
                // Lexical errors travel as ILLEGAL tokens; surface the
                // message the lexer stored in the literal.
                let message = self.cur_token().literal.clone();
                self.push_error(message);
                None
            }
            kind => {
                self.push_error(format!("no prefix parse function for {} found", kind));
                None
            }
        }
    }

    fn parse_identifier(&mut self) -> Expression {
        Expression::Identifier(Identifier {
            token: self.cur_token().clone(),
            value: self.cur_token().literal.clone(),
        })
    }

    fn parse_integer_literal(&mut self) -> Option<Expression> {
        let token = self.cur_token().clone();

        // Underscore separators were validated by the lexer.
        let digits = token.literal.replace('_', "");
        let Ok(value) = digits.parse::<i64>() else {
            self.push_error(format!("could not parse {:?} as integer", token.literal));
            return None;
        };

        Some(Expression::IntegerLiteral(IntegerLiteral { token, value }))
    }

    fn parse_boolean_literal(&mut self) -> Expression {
        Expression::BooleanLiteral(BooleanLiteral {
            token: self.cur_token().clone(),
            value: self.cur_token_is(TokenKind::True),
        })
    }

    fn parse_string_literal(&mut self) -> Expression {
        Expression::StringLiteral(StringLiteral {
            token: self.cur_token().clone(),
            value: self.cur_token().literal.clone(),
        })
    }

    fn parse_prefix_expression(&mut self) -> Option<Expression> {
        let token = self.cur_token().clone();
        let operator = token.literal.clone();

        self.next_token();
        let right = self.parse_expression(Precedence::Prefix)?;

        Some(Expression::Prefix(PrefixExpression {
            token,
            operator,
            right: Box::new(right),
        }))
    }

    fn parse_infix_expression(&mut self, left: Expression) -> Option<Expression> {
        let token = self.cur_token().clone();
        let operator = token.literal.clone();
        let precedence = Precedence::of(token.kind);

        self.next_token();
        let right = self.parse_expression(precedence)?;

        Some(Expression::Infix(InfixExpression {
            token,
            operator,
            left: Box::new(left),
            right: Box::new(right),
        }))
    }

    fn parse_grouped_expression(&mut self) -> Option<Expression> {
        self.next_token();
        let expression = self.parse_expression(Precedence::Lowest)?;

        if !self.expect_peek(TokenKind::RParen) {
            return None;
        }

        Some(expression)
    }

    fn parse_if_expression(&mut self) -> Option<Expression> {
        let token = self.cur_token().clone();

        if !self.expect_peek(TokenKind::LParen) {
            return None;
        }

        self.next_token();
        let condition = self.parse_expression(Precedence::Lowest)?;

        if !self.expect_peek(TokenKind::RParen) {
            return None;
        }
        if !self.expect_peek(TokenKind::LBrace) {
            return None;
        }

        let consequence = self.parse_block_statement();

        let alternative = if self.peek_token_is(TokenKind::Else) {
            self.next_token();
            if !self.expect_peek(TokenKind::LBrace) {
                return None;
            }
            Some(self.parse_block_statement())
        } else {
            None
        };

        Some(Expression::If(IfExpression {
            token,
            condition: Box::new(condition),
            consequence,
            alternative,
        }))
    }

    fn parse_function_literal(&mut self) -> Option<Expression> {
        let token = self.cur_token().clone();

        if !self.expect_peek(TokenKind::LParen) {
            return None;
        }

        let parameters = self.parse_function_parameters()?;

        if !self.expect_peek(TokenKind::LBrace) {
            return None;
        }

        let body = self.parse_block_statement();

        Some(Expression::Function(FunctionLiteral {
            token,
            parameters,
            body,
            name: None,
        }))
    }

    fn parse_function_parameters(&mut self) -> Option<Vec<Identifier>> {
        let mut parameters = Vec::new();

        if self.peek_token_is(TokenKind::RParen) {
            self.next_token();
            return Some(parameters);
        }

        self.next_token();
        parameters.push(Identifier {
            token: self.cur_token().clone(),
            value: self.cur_token().literal.clone(),
        });

        while self.peek_token_is(TokenKind::Comma) {
            self.next_token();
            self.next_token();
            parameters.push(Identifier {
                token: self.cur_token().clone(),
                value: self.cur_token().literal.clone(),
            });
        }

        if !self.expect_peek(TokenKind::RParen) {
            return None;
        }

        Some(parameters)
    }

    fn parse_call_expression(&mut self, function: Expression) -> Option<Expression> {
        let token = self.cur_token().clone();
        let arguments = self.parse_expression_list(TokenKind::RParen)?;

        Some(Expression::Call(CallExpression {
            token,
            function: Box::new(function),
            arguments,
        }))
    }

    fn parse_array_literal(&mut self) -> Option<Expression> {
        let token = self.cur_token().clone();
        let elements = self.parse_expression_list(TokenKind::RBracket)?;

        Some(Expression::Array(ArrayLiteral { token, elements }))
    }

    fn parse_expression_list(&mut self, end: TokenKind) -> Option<Vec<Expression>> {
        let mut list = Vec::new();

        if self.peek_token_is(end) {
            self.next_token();
            return Some(list);
        }

        self.next_token();
        list.push(self.parse_expression(Precedence::Lowest)?);

        while self.peek_token_is(TokenKind::Comma) {
            self.next_token();
            self.next_token();
            list.push(self.parse_expression(Precedence::Lowest)?);
        }

        if !self.expect_peek(end) {
            return None;
        }

        Some(list)
    }

    fn parse_hash_literal(&mut self) -> Option<Expression> {
        let token = self.cur_token().clone();
        let mut pairs = Vec::new();

        while !self.peek_token_is(TokenKind::RBrace) {
            self.next_token();
            let key = self.parse_expression(Precedence::Lowest)?;

            if !self.expect_peek(TokenKind::Colon) {
                return None;
            }

            self.next_token();
            let value = self.parse_expression(Precedence::Lowest)?;
            pairs.push((key, value));

            if !self.peek_token_is(TokenKind::RBrace) && !self.expect_peek(TokenKind::Comma) {
                return None;
            }
        }

        if !self.expect_peek(TokenKind::RBrace) {
            return None;
        }

        Some(Expression::Hash(HashLiteral { token, pairs }))
    }

    fn parse_index_expression(&mut self, left: Expression) -> Option<Expression> {
        let token = self.cur_token().clone();

        self.next_token();
        let index = self.parse_expression(Precedence::Lowest)?;

        if !self.expect_peek(TokenKind::RBracket) {
            return None;
        }

        Some(Expression::Index(IndexExpression {
            token,
            left: Box::new(left),
            index: Box::new(index),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Program, Statement};

    fn parse(source: &str) -> Program {
        let mut parser = Parser::from_source(source);
        let program = parser.parse_program();
        assert!(
            parser.errors().is_empty(),
            "parser errors for {:?}: {:?}",
            source,
            parser.errors()
        );
        program
    }

    fn parse_single_expression(source: &str) -> Expression {
        let program = parse(source);
        assert_eq!(
            program.statements.len(),
            1,
            "expected one statement for {:?}",
            source
        );
        let Statement::Expression(statement) = &program.statements[0] else {
            panic!("expected expression statement, got {:?}", program.statements[0]);
        };
        statement.expression.clone()
    }

    #[test]
    fn test_identifier_expression() {
        let expression = parse_single_expression("foobar;");
        let Expression::Identifier(identifier) = expression else {
            panic!("expected identifier");
        };
        assert_eq!(identifier.value, "foobar");
    }

    #[test]
    fn test_integer_literal_expression() {
        let expression = parse_single_expression("5;");
        assert!(matches!(
            expression,
            Expression::IntegerLiteral(IntegerLiteral { value: 5, .. })
        ));
    }

    #[test]
    fn test_integer_literal_with_separators() {
        let expression = parse_single_expression("1_000_000;");
        assert!(matches!(
            expression,
            Expression::IntegerLiteral(IntegerLiteral {
                value: 1_000_000,
                ..
            })
        ));
    }

    #[test]
    fn test_boolean_literals() {
        assert!(matches!(
            parse_single_expression("true;"),
            Expression::BooleanLiteral(BooleanLiteral { value: true, .. })
        ));
        assert!(matches!(
            parse_single_expression("false;"),
            Expression::BooleanLiteral(BooleanLiteral { value: false, .. })
        ));
    }

    #[test]
    fn test_string_literal_expression() {
        let Expression::StringLiteral(literal) = parse_single_expression("\"hello world\";")
        else {
            panic!("expected string literal");
        };
        assert_eq!(literal.value, "hello world");
    }

    #[test]
    fn test_prefix_expressions() {
        let tests = [
            ("!5;", "!", "5"),
            ("-15;", "-", "15"),
            ("!true;", "!", "true"),
            ("!false;", "!", "false"),
        ];

        for (source, operator, right) in tests {
            let Expression::Prefix(prefix) = parse_single_expression(source) else {
                panic!("expected prefix expression for {:?}", source);
            };
            assert_eq!(prefix.operator, operator);
            assert_eq!(prefix.right.to_string(), right);
        }
    }

    #[test]
    fn test_infix_expressions() {
        let tests = [
            ("5 + 5;", "5", "+", "5"),
            ("5 - 5;", "5", "-", "5"),
            ("5 * 5;", "5", "*", "5"),
            ("5 / 5;", "5", "/", "5"),
            ("5 > 5;", "5", ">", "5"),
            ("5 < 5;", "5", "<", "5"),
            ("5 == 5;", "5", "==", "5"),
            ("5 != 5;", "5", "!=", "5"),
            ("true == true", "true", "==", "true"),
            ("true != false", "true", "!=", "false"),
        ];

        for (source, left, operator, right) in tests {
            let Expression::Infix(infix) = parse_single_expression(source) else {
                panic!("expected infix expression for {:?}", source);
            };
            assert_eq!(infix.left.to_string(), left);
            assert_eq!(infix.operator, operator);
            assert_eq!(infix.right.to_string(), right);
        }
    }

    #[test]
    fn test_operator_precedence() {
        let tests = [
            ("-a * b", "((-a) * b)"),
            ("!-a", "(!(-a))"),
            ("a + b + c", "((a + b) + c)"),
            ("a + b - c", "((a + b) - c)"),
            ("a * b * c", "((a * b) * c)"),
            ("a * b / c", "((a * b) / c)"),
            ("a + b / c", "(a + (b / c))"),
            ("a + b * c + d / e - f", "(((a + (b * c)) + (d / e)) - f)"),
            ("3 + 4 - 5 * 5", "((3 + 4) - (5 * 5))"),
            ("5 > 4 == 3 < 4", "((5 > 4) == (3 < 4))"),
            ("5 < 4 != 3 > 4", "((5 < 4) != (3 > 4))"),
            (
                "3 + 4 * 5 == 3 * 1 + 4 * 5",
                "((3 + (4 * 5)) == ((3 * 1) + (4 * 5)))",
            ),
            ("true", "true"),
            ("false", "false"),
            ("3 > 5 == false", "((3 > 5) == false)"),
            ("3 < 5 == true", "((3 < 5) == true)"),
            ("1 + (2 + 3) + 4", "((1 + (2 + 3)) + 4)"),
            ("(5 + 5) * 2", "((5 + 5) * 2)"),
            ("2 / (5 + 5)", "(2 / (5 + 5))"),
            ("-(5 + 5)", "(-(5 + 5))"),
            ("!(true == true)", "(!(true == true))"),
            ("a + add(b * c) + d", "((a + add((b * c))) + d)"),
            (
                "add(a, b, 1, 2 * 3, 4 + 5, add(6, 7 * 8))",
                "add(a, b, 1, (2 * 3), (4 + 5), add(6, (7 * 8)))",
            ),
            (
                "add(a + b + c * d / f + g)",
                "add((((a + b) + ((c * d) / f)) + g))",
            ),
            (
                "a * [1, 2, 3, 4][b * c] * d",
                "((a * ([1, 2, 3, 4][(b * c)])) * d)",
            ),
            (
                "add(a * b[2], b[1], 2 * [1, 2][1])",
                "add((a * (b[2])), (b[1]), (2 * ([1, 2][1])))",
            ),
        ];

        for (source, expected) in tests {
            let program = parse(source);
            assert_eq!(program.to_string(), expected, "for source {:?}", source);
        }
    }

    #[test]
    fn test_if_expression() {
        let Expression::If(expression) = parse_single_expression("if (x < y) { x }") else {
            panic!("expected if expression");
        };
        assert_eq!(expression.condition.to_string(), "(x < y)");
        assert_eq!(expression.consequence.statements.len(), 1);
        assert!(expression.alternative.is_none());
    }

    #[test]
    fn test_if_else_expression() {
        let Expression::If(expression) = parse_single_expression("if (x < y) { x } else { y }")
        else {
            panic!("expected if expression");
        };
        assert_eq!(expression.consequence.statements.len(), 1);
        let alternative = expression.alternative.expect("expected else branch");
        assert_eq!(alternative.statements.len(), 1);
        assert_eq!(alternative.statements[0].to_string(), "y");
    }

    #[test]
    fn test_function_literal() {
        let Expression::Function(function) = parse_single_expression("fn(x, y) { x + y; }")
        else {
            panic!("expected function literal");
        };
        assert_eq!(function.parameters.len(), 2);
        assert_eq!(function.parameters[0].value, "x");
        assert_eq!(function.parameters[1].value, "y");
        assert_eq!(function.body.statements.len(), 1);
        assert_eq!(function.body.statements[0].to_string(), "(x + y)");
        assert!(function.name.is_none());
    }

    #[test]
    fn test_function_parameter_lists() {
        let tests: [(&str, &[&str]); 3] = [
            ("fn() {};", &[]),
            ("fn(x) {};", &["x"]),
            ("fn(x, y, z) {};", &["x", "y", "z"]),
        ];

        for (source, expected) in tests {
            let Expression::Function(function) = parse_single_expression(source) else {
                panic!("expected function literal for {:?}", source);
            };
            let names: Vec<&str> = function
                .parameters
                .iter()
                .map(|p| p.value.as_str())
                .collect();
            assert_eq!(names, expected);
        }
    }

    #[test]
    fn test_let_bound_function_knows_its_name() {
        let program = parse("let myFunction = fn() { };");
        let Statement::Let(statement) = &program.statements[0] else {
            panic!("expected let statement");
        };
        let Expression::Function(function) = &statement.value else {
            panic!("expected function literal");
        };
        assert_eq!(function.name.as_deref(), Some("myFunction"));
    }

    #[test]
    fn test_call_expression() {
        let Expression::Call(call) = parse_single_expression("add(1, 2 * 3, 4 + 5);") else {
            panic!("expected call expression");
        };
        assert_eq!(call.function.to_string(), "add");
        assert_eq!(call.arguments.len(), 3);
        assert_eq!(call.arguments[0].to_string(), "1");
        assert_eq!(call.arguments[1].to_string(), "(2 * 3)");
        assert_eq!(call.arguments[2].to_string(), "(4 + 5)");
    }

    #[test]
    fn test_array_literal() {
        let Expression::Array(array) = parse_single_expression("[1, 2 * 2, 3 + 3]") else {
            panic!("expected array literal");
        };
        assert_eq!(array.elements.len(), 3);
        assert_eq!(array.elements[1].to_string(), "(2 * 2)");
    }

    #[test]
    fn test_empty_array_literal() {
        let Expression::Array(array) = parse_single_expression("[]") else {
            panic!("expected array literal");
        };
        assert!(array.elements.is_empty());
    }

    #[test]
    fn test_index_expression() {
        let Expression::Index(index) = parse_single_expression("myArray[1 + 1]") else {
            panic!("expected index expression");
        };
        assert_eq!(index.left.to_string(), "myArray");
        assert_eq!(index.index.to_string(), "(1 + 1)");
    }

    #[test]
    fn test_hash_literal_preserves_parse_order() {
        let Expression::Hash(hash) =
            parse_single_expression("{\"one\": 1, \"two\": 2, \"three\": 3}")
        else {
            panic!("expected hash literal");
        };

        let keys: Vec<String> = hash.pairs.iter().map(|(k, _)| k.to_string()).collect();
        assert_eq!(keys, ["\"one\"", "\"two\"", "\"three\""]);
    }

    #[test]
    fn test_empty_hash_literal() {
        let Expression::Hash(hash) = parse_single_expression("{}") else {
            panic!("expected hash literal");
        };
        assert!(hash.pairs.is_empty());
    }

    #[test]
    fn test_hash_literal_with_expression_values() {
        let Expression::Hash(hash) =
            parse_single_expression("{\"one\": 0 + 1, \"two\": 10 - 8, \"three\": 15 / 5}")
        else {
            panic!("expected hash literal");
        };
        assert_eq!(hash.pairs.len(), 3);
        assert_eq!(hash.pairs[0].1.to_string(), "(0 + 1)");
        assert_eq!(hash.pairs[1].1.to_string(), "(10 - 8)");
        assert_eq!(hash.pairs[2].1.to_string(), "(15 / 5)");
    }

    #[test]
    fn test_display_round_trip() {
        // Printing a parsed program and reparsing the print yields the same
        // canonical form.
        let sources = [
            "let a = 5; let b = a + 10; b;",
            "if (1 < 2) { 10 } else { 20 }",
            "let newAdder = fn(x) { fn(y) { x + y } }; let addTwo = newAdder(2); addTwo(3);",
            "let m = {\"one\": 1, \"two\": 2}; m[\"one\"] + m[\"two\"];",
            "let f = fn(a, b) { return a; }; f(1, 2)[0];",
            "[1, 2 * 3, \"x\"][!true]",
        ];

        for source in sources {
            let printed = parse(source).to_string();
            let reparsed = parse(&printed).to_string();
            assert_eq!(printed, reparsed, "round trip failed for {:?}", source);
        }
    }

    #[test]
    fn test_no_prefix_parse_function_error() {
        let mut parser = Parser::from_source("+ 5;");
        parser.parse_program();
        assert_eq!(
            parser.errors()[0],
            "no prefix parse function for + found".to_string()
        );
    }
}
