//! monkey-lex - Lexical analyzer for the Monkey programming language.
//!
//! Transforms a stream of characters into a stream of tokens. The lexer is
//! pull-based: the parser asks for one token at a time via
//! [`Lexer::next_token`], and the lexer never looks more than one character
//! ahead.
//!
//! Lexical errors do not abort the stream. They are encoded as
//! [`TokenKind::Illegal`] tokens whose literal carries the error message, so
//! the parser can surface them alongside its own diagnostics.

pub mod cursor;
pub mod lexer;
pub mod token;

pub use cursor::Cursor;
pub use lexer::Lexer;
pub use token::{Token, TokenKind};
