//! Lexical analysis for data expressions

use crate::error::{BindingError, Result};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenType {
    // Punctuation
    LeftParen,  // (
    RightParen, // )
    Comma,      // ,
    Question,   // ?
    Colon,      // :

    // Operators
    Plus,         // +
    Minus,        // -
    Star,         // *
    Slash,        // /
    Bang,         // !
    AndAnd,       // &&
    OrOr,         // ||
    Pipe,         // |
    EqualEqual,   // ==
    BangEqual,    // !=
    Less,         // <
    LessEqual,    // <=
    Greater,      // >
    GreaterEqual, // >=

    // Literals
    String(String),
    Number(f64),
    Integer(i64),
    Boolean(bool),
    Identifier(String),

    Eof,
}

#[derive(Debug, Clone)]
pub struct Token {
    pub token_type: TokenType,
    /// Character offset of the first character of the token
    pub position: usize,
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenType::LeftParen => write!(f, "'('"),
            TokenType::RightParen => write!(f, "')'"),
            TokenType::Comma => write!(f, "','"),
            TokenType::Question => write!(f, "'?'"),
            TokenType::Colon => write!(f, "':'"),
            TokenType::Plus => write!(f, "'+'"),
            TokenType::Minus => write!(f, "'-'"),
            TokenType::Star => write!(f, "'*'"),
            TokenType::Slash => write!(f, "'/'"),
            TokenType::Bang => write!(f, "'!'"),
            TokenType::AndAnd => write!(f, "'&&'"),
            TokenType::OrOr => write!(f, "'||'"),
            TokenType::Pipe => write!(f, "'|'"),
            TokenType::EqualEqual => write!(f, "'=='"),
            TokenType::BangEqual => write!(f, "'!='"),
            TokenType::Less => write!(f, "'<'"),
            TokenType::LessEqual => write!(f, "'<='"),
            TokenType::Greater => write!(f, "'>'"),
            TokenType::GreaterEqual => write!(f, "'>='"),
            TokenType::String(s) => write!(f, "string('{}')", s),
            TokenType::Number(n) => write!(f, "number({})", n),
            TokenType::Integer(i) => write!(f, "integer({})", i),
            TokenType::Boolean(b) => write!(f, "boolean({})", b),
            TokenType::Identifier(id) => write!(f, "identifier({})", id),
            TokenType::Eof => write!(f, "end of expression"),
        }
    }
}

pub struct Lexer {
    input: Vec<char>,
    source: String,
    position: usize,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            source: input.to_string(),
            position: 0,
        }
    }

    pub fn tokenize(&mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();

        loop {
            self.skip_whitespace();
            if self.is_at_end() {
                break;
            }
            tokens.push(self.next_token()?);
        }

        tokens.push(Token {
            token_type: TokenType::Eof,
            position: self.position,
        });

        Ok(tokens)
    }

    fn next_token(&mut self) -> Result<Token> {
        let start = self.position;
        let ch = self.advance();

        let token_type = match ch {
            '(' => TokenType::LeftParen,
            ')' => TokenType::RightParen,
            ',' => TokenType::Comma,
            '?' => TokenType::Question,
            ':' => TokenType::Colon,
            '+' => TokenType::Plus,
            '-' => TokenType::Minus,
            '*' => TokenType::Star,
            '/' => TokenType::Slash,
            '!' => {
                if self.match_char('=') {
                    TokenType::BangEqual
                } else {
                    TokenType::Bang
                }
            }
            '&' => {
                if self.match_char('&') {
                    TokenType::AndAnd
                } else {
                    return Err(self.error(start, "Expected '&&' but found a single '&'."));
                }
            }
            '|' => {
                if self.match_char('|') {
                    TokenType::OrOr
                } else {
                    TokenType::Pipe
                }
            }
            '=' => {
                if self.match_char('=') {
                    TokenType::EqualEqual
                } else {
                    return Err(self.error(start, "Expected '==' but found a single '='."));
                }
            }
            '<' => {
                if self.match_char('=') {
                    TokenType::LessEqual
                } else {
                    TokenType::Less
                }
            }
            '>' => {
                if self.match_char('=') {
                    TokenType::GreaterEqual
                } else {
                    TokenType::Greater
                }
            }
            '\'' => self.read_string(start)?,
            c if c.is_ascii_digit() => self.read_number(start)?,
            c if c.is_ascii_alphabetic() || c == '_' => self.read_identifier(start),
            c => {
                return Err(self.error(start, format!("Unexpected character '{}'.", c)));
            }
        };

        Ok(Token {
            token_type,
            position: start,
        })
    }

    fn read_string(&mut self, start: usize) -> Result<TokenType> {
        let mut value = String::new();

        loop {
            match self.peek() {
                None => {
                    return Err(self.error(start, "Unterminated string literal, expected closing '''."));
                }
                Some('\'') => {
                    self.advance();
                    break;
                }
                Some('\\') => {
                    self.advance();
                    match self.peek() {
                        Some('n') => value.push('\n'),
                        Some('t') => value.push('\t'),
                        Some(c) => value.push(c),
                        None => continue,
                    }
                    self.advance();
                }
                Some(c) => {
                    value.push(c);
                    self.advance();
                }
            }
        }

        Ok(TokenType::String(value))
    }

    fn read_number(&mut self, start: usize) -> Result<TokenType> {
        let mut has_dot = false;

        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                self.advance();
            } else if c == '.' && !has_dot {
                has_dot = true;
                self.advance();
            } else {
                break;
            }
        }

        let text: String = self.input[start..self.position].iter().collect();
        if has_dot {
            text.parse::<f64>()
                .map(TokenType::Number)
                .map_err(|_| self.error(start, format!("Invalid number literal '{}'.", text)))
        } else {
            match text.parse::<i64>() {
                Ok(value) => Ok(TokenType::Integer(value)),
                // Too large for an integer, keep it as a float
                Err(_) => text
                    .parse::<f64>()
                    .map(TokenType::Number)
                    .map_err(|_| self.error(start, format!("Invalid number literal '{}'.", text))),
            }
        }
    }

    /// Variable paths may contain '.', '[', ']' and inner spaces; trailing spaces are trimmed.
    fn read_identifier(&mut self, start: usize) -> TokenType {
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '[' | ']' | ' ') {
                self.advance();
            } else {
                break;
            }
        }

        let text: String = self.input[start..self.position].iter().collect();
        let name = text.trim_end();

        match name {
            "true" => TokenType::Boolean(true),
            "false" => TokenType::Boolean(false),
            _ => TokenType::Identifier(name.to_string()),
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn error(&self, position: usize, message: impl Into<String>) -> BindingError {
        BindingError::syntax(self.source.clone(), position, message)
    }

    fn match_char(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn advance(&mut self) -> char {
        let c = self.input[self.position];
        self.position += 1;
        c
    }

    fn peek(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn is_at_end(&self) -> bool {
        self.position >= self.input.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token_types(input: &str) -> Vec<TokenType> {
        let mut lexer = Lexer::new(input);
        lexer.tokenize().unwrap().into_iter().map(|t| t.token_type).collect()
    }

    #[test]
    fn test_operators() {
        let tokens = token_types("+ - * / ! && || | == != < <= > >= ? : ( ) ,");
        assert_eq!(
            tokens,
            vec![
                TokenType::Plus,
                TokenType::Minus,
                TokenType::Star,
                TokenType::Slash,
                TokenType::Bang,
                TokenType::AndAnd,
                TokenType::OrOr,
                TokenType::Pipe,
                TokenType::EqualEqual,
                TokenType::BangEqual,
                TokenType::Less,
                TokenType::LessEqual,
                TokenType::Greater,
                TokenType::GreaterEqual,
                TokenType::Question,
                TokenType::Colon,
                TokenType::LeftParen,
                TokenType::RightParen,
                TokenType::Comma,
                TokenType::Eof,
            ]
        );
    }

    #[test]
    fn test_string_escaping() {
        let tokens = token_types(r"'it\'s \\ ok'");
        assert_eq!(tokens[0], TokenType::String("it's \\ ok".to_string()));
    }

    #[test]
    fn test_numbers() {
        let tokens = token_types("42 3.25");
        assert_eq!(tokens[0], TokenType::Integer(42));
        assert_eq!(tokens[1], TokenType::Number(3.25));
    }

    #[test]
    fn test_variable_paths() {
        let tokens = token_types("data.list[2].name  + true");
        assert_eq!(tokens[0], TokenType::Identifier("data.list[2].name".to_string()));
        assert_eq!(tokens[1], TokenType::Plus);
        assert_eq!(tokens[2], TokenType::Boolean(true));
    }

    #[test]
    fn test_lexer_errors() {
        assert!(Lexer::new("a & b").tokenize().is_err());
        assert!(Lexer::new("a = b").tokenize().is_err());
        assert!(Lexer::new("'open").tokenize().is_err());
        assert!(Lexer::new("#").tokenize().is_err());
    }
}
