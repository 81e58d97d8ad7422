//! The Monkey lexer.
//!
//! Single pass, one character of lookahead. Whitespace and `//` line
//! comments are insignificant and skipped between tokens.

use crate::cursor::Cursor;
use crate::token::{Token, TokenKind};

/// Lexer for Monkey source code.
pub struct Lexer<'a> {
    cursor: Cursor<'a>,
}

impl<'a> Lexer<'a> {
    /// Creates a new lexer over the given source text.
    pub fn new(source: &'a str) -> Self {
        Self {
            cursor: Cursor::new(source),
        }
    }

    /// Returns the next token from the source.
    ///
    /// Skips whitespace and comments, then dispatches on the current
    /// character. At end of input this returns `Eof` forever.
    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace_and_comments();

        if self.cursor.is_at_end() {
            return Token::new(TokenKind::Eof, "");
        }

        match self.cursor.current_char() {
            '=' => self.lex_equals(),
            '!' => self.lex_bang(),
            '+' => self.single(TokenKind::Plus, "+"),
            '-' => self.single(TokenKind::Minus, "-"),
            '*' => self.single(TokenKind::Asterisk, "*"),
            '/' => self.single(TokenKind::Slash, "/"),
            '<' => self.single(TokenKind::Lt, "<"),
            '>' => self.single(TokenKind::Gt, ">"),
            ',' => self.single(TokenKind::Comma, ","),
            ';' => self.single(TokenKind::Semicolon, ";"),
            ':' => self.single(TokenKind::Colon, ":"),
            '(' => self.single(TokenKind::LParen, "("),
            ')' => self.single(TokenKind::RParen, ")"),
            '{' => self.single(TokenKind::LBrace, "{"),
            '}' => self.single(TokenKind::RBrace, "}"),
            '[' => self.single(TokenKind::LBracket, "["),
            ']' => self.single(TokenKind::RBracket, "]"),
            '"' => self.lex_string(),
            c if is_letter(c) => self.lex_identifier(),
            c if c.is_ascii_digit() => self.lex_number(),
            c => {
                self.cursor.advance();
                Token::new(TokenKind::Illegal, c.to_string())
            }
        }
    }

    fn single(&mut self, kind: TokenKind, literal: &str) -> Token {
        self.cursor.advance();
        Token::new(kind, literal)
    }

    /// Lexes `=` or `==`.
    fn lex_equals(&mut self) -> Token {
        self.cursor.advance();
        if self.cursor.match_char('=') {
            Token::new(TokenKind::Eq, "==")
        } else {
            Token::new(TokenKind::Assign, "=")
        }
    }

    /// Lexes `!` or `!=`.
    fn lex_bang(&mut self) -> Token {
        self.cursor.advance();
        if self.cursor.match_char('=') {
            Token::new(TokenKind::NotEq, "!=")
        } else {
            Token::new(TokenKind::Bang, "!")
        }
    }

    /// Lexes an identifier or keyword: `[A-Za-z_]+`.
    fn lex_identifier(&mut self) -> Token {
        let start = self.cursor.position();
        while is_letter(self.cursor.current_char()) {
            self.cursor.advance();
        }

        let literal = self.cursor.slice_from(start);
        Token::new(TokenKind::lookup_ident(literal), literal)
    }

    /// Lexes an integer literal: `[0-9][0-9_]*`.
    ///
    /// Underscores may separate digit groups but may not be doubled or
    /// trail the literal. Violations produce an `Illegal` token; the cursor
    /// is left on the offending character.
    fn lex_number(&mut self) -> Token {
        let start = self.cursor.position();
        let mut previous_was_underscore = false;

        loop {
            let c = self.cursor.current_char();
            if c == '_' {
                if previous_was_underscore {
                    return Token::new(TokenKind::Illegal, "invalid number: trailing underscore");
                }
                previous_was_underscore = true;
            } else if c.is_ascii_digit() {
                previous_was_underscore = false;
            } else {
                break;
            }
            self.cursor.advance();
        }

        if previous_was_underscore {
            return Token::new(TokenKind::Illegal, "invalid number: trailing underscore");
        }

        Token::new(TokenKind::Int, self.cursor.slice_from(start))
    }

    /// Lexes a string literal from `"` to the next `"`.
    ///
    /// There are no escape sequences. Reaching end of input before the
    /// closing quote yields an `Illegal` token.
    fn lex_string(&mut self) -> Token {
        self.cursor.advance();
        let start = self.cursor.position();

        loop {
            if self.cursor.is_at_end() {
                return Token::new(TokenKind::Illegal, "unterminated string");
            }
            if self.cursor.current_char() == '"' {
                break;
            }
            self.cursor.advance();
        }

        let literal = self.cursor.slice_from(start).to_string();
        self.cursor.advance();
        Token::new(TokenKind::Str, literal)
    }

    /// Skips whitespace and `//` line comments.
    ///
    /// A comment runs to the next newline or to end of input.
    fn skip_whitespace_and_comments(&mut self) {
        loop {
            while matches!(self.cursor.current_char(), ' ' | '\t' | '\r' | '\n') {
                self.cursor.advance();
            }

            if self.cursor.current_char() == '/' && self.cursor.peek_char() == '/' {
                while !self.cursor.is_at_end() && self.cursor.current_char() != '\n' {
                    self.cursor.advance();
                }
            } else {
                return;
            }
        }
    }
}

fn is_letter(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_tokens(source: &str, expected: &[(TokenKind, &str)]) {
        let mut lexer = Lexer::new(source);
        for (i, (kind, literal)) in expected.iter().enumerate() {
            let token = lexer.next_token();
            assert_eq!(token.kind, *kind, "token {} of {:?}", i, source);
            assert_eq!(token.literal, *literal, "token {} of {:?}", i, source);
        }
        assert_eq!(lexer.next_token().kind, TokenKind::Eof);
    }

    #[test]
    fn test_next_token() {
        let source = r#"let five = 5;
let ten = 10;

let add = fn(x, y) {
  x + y;
};

let result = add(five, ten);
!-/*5;
5 < 10 > 5;

if (5 < 10) {
	return true;
} else {
	return false;
}

10 == 10;
10 != 9;
"foobar"
"foo bar"
[1, 2];
{"foo": "bar"}
"#;

        use TokenKind::*;
        assert_tokens(
            source,
            &[
                (Let, "let"),
                (Ident, "five"),
                (Assign, "="),
                (Int, "5"),
                (Semicolon, ";"),
                (Let, "let"),
                (Ident, "ten"),
                (Assign, "="),
                (Int, "10"),
                (Semicolon, ";"),
                (Let, "let"),
                (Ident, "add"),
                (Assign, "="),
                (Function, "fn"),
                (LParen, "("),
                (Ident, "x"),
                (Comma, ","),
                (Ident, "y"),
                (RParen, ")"),
                (LBrace, "{"),
                (Ident, "x"),
                (Plus, "+"),
                (Ident, "y"),
                (Semicolon, ";"),
                (RBrace, "}"),
                (Semicolon, ";"),
                (Let, "let"),
                (Ident, "result"),
                (Assign, "="),
                (Ident, "add"),
                (LParen, "("),
                (Ident, "five"),
                (Comma, ","),
                (Ident, "ten"),
                (RParen, ")"),
                (Semicolon, ";"),
                (Bang, "!"),
                (Minus, "-"),
                (Slash, "/"),
                (Asterisk, "*"),
                (Int, "5"),
                (Semicolon, ";"),
                (Int, "5"),
                (Lt, "<"),
                (Int, "10"),
                (Gt, ">"),
                (Int, "5"),
                (Semicolon, ";"),
                (If, "if"),
                (LParen, "("),
                (Int, "5"),
                (Lt, "<"),
                (Int, "10"),
                (RParen, ")"),
                (LBrace, "{"),
                (Return, "return"),
                (True, "true"),
                (Semicolon, ";"),
                (RBrace, "}"),
                (Else, "else"),
                (LBrace, "{"),
                (Return, "return"),
                (False, "false"),
                (Semicolon, ";"),
                (RBrace, "}"),
                (Int, "10"),
                (Eq, "=="),
                (Int, "10"),
                (Semicolon, ";"),
                (Int, "10"),
                (NotEq, "!="),
                (Int, "9"),
                (Semicolon, ";"),
                (Str, "foobar"),
                (Str, "foo bar"),
                (LBracket, "["),
                (Int, "1"),
                (Comma, ","),
                (Int, "2"),
                (RBracket, "]"),
                (Semicolon, ";"),
                (LBrace, "{"),
                (Str, "foo"),
                (Colon, ":"),
                (Str, "bar"),
                (RBrace, "}"),
            ],
        );
    }

    #[test]
    fn test_line_comments() {
        assert_tokens(
            "// leading comment\nlet x = 1; // trailing\n// another\nx",
            &[
                (TokenKind::Let, "let"),
                (TokenKind::Ident, "x"),
                (TokenKind::Assign, "="),
                (TokenKind::Int, "1"),
                (TokenKind::Semicolon, ";"),
                (TokenKind::Ident, "x"),
            ],
        );
    }

    #[test]
    fn test_comment_at_end_of_input() {
        // The comment has no trailing newline; the lexer must still stop.
        let mut lexer = Lexer::new("5 // no newline after this");
        assert_eq!(lexer.next_token().kind, TokenKind::Int);
        assert_eq!(lexer.next_token().kind, TokenKind::Eof);
    }

    #[test]
    fn test_comment_only_input() {
        let mut lexer = Lexer::new("// nothing here");
        assert_eq!(lexer.next_token().kind, TokenKind::Eof);
    }

    #[test]
    fn test_number_with_underscores() {
        assert_tokens("1_000_000", &[(TokenKind::Int, "1_000_000")]);
        assert_tokens("1_0", &[(TokenKind::Int, "1_0")]);
    }

    #[test]
    fn test_number_doubled_underscore_is_illegal() {
        let mut lexer = Lexer::new("1__0");
        let token = lexer.next_token();
        assert_eq!(token.kind, TokenKind::Illegal);
        assert_eq!(token.literal, "invalid number: trailing underscore");
    }

    #[test]
    fn test_number_trailing_underscore_is_illegal() {
        let mut lexer = Lexer::new("1_");
        let token = lexer.next_token();
        assert_eq!(token.kind, TokenKind::Illegal);
        assert_eq!(token.literal, "invalid number: trailing underscore");
    }

    #[test]
    fn test_unterminated_string() {
        let mut lexer = Lexer::new("\"abc");
        let token = lexer.next_token();
        assert_eq!(token.kind, TokenKind::Illegal);
        assert_eq!(token.literal, "unterminated string");
        assert_eq!(lexer.next_token().kind, TokenKind::Eof);
    }

    #[test]
    fn test_unicode_string_literal() {
        let mut lexer = Lexer::new("\"héllo wörld\"");
        let token = lexer.next_token();
        assert_eq!(token.kind, TokenKind::Str);
        assert_eq!(token.literal, "héllo wörld");
    }

    #[test]
    fn test_eof_is_idempotent() {
        let mut lexer = Lexer::new("x");
        assert_eq!(lexer.next_token().kind, TokenKind::Ident);
        for _ in 0..5 {
            let token = lexer.next_token();
            assert_eq!(token.kind, TokenKind::Eof);
            assert_eq!(token.literal, "");
        }
    }

    #[test]
    fn test_illegal_character() {
        let mut lexer = Lexer::new("@");
        let token = lexer.next_token();
        assert_eq!(token.kind, TokenKind::Illegal);
        assert_eq!(token.literal, "@");
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            // The lexer must terminate and never panic, whatever the input.
            #[test]
            fn lexing_terminates(input in ".{0,200}") {
                let mut lexer = Lexer::new(&input);
                let mut reached_eof = false;
                for _ in 0..=input.len() + 1 {
                    if lexer.next_token().kind == TokenKind::Eof {
                        reached_eof = true;
                        break;
                    }
                }
                prop_assert!(reached_eof);
            }

            // Integer literals without separators always lex as one token.
            #[test]
            fn plain_integers_lex(value in 0u64..=u64::MAX / 2) {
                let source = value.to_string();
                let mut lexer = Lexer::new(&source);
                let token = lexer.next_token();
                prop_assert_eq!(token.kind, TokenKind::Int);
                prop_assert_eq!(token.literal, source.clone());
                prop_assert_eq!(lexer.next_token().kind, TokenKind::Eof);
            }
        }
    }
}
