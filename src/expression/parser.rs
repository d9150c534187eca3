//! Recursive descent compiler for data expressions
//!
//! The parser emits machine instructions directly while descending, there is no
//! intermediate syntax tree. A binary operator finds its left operand already in
//! `R`, saves it with `Push`, compiles the right operand into `R`, restores the
//! left operand with `Pop(L)` and finally emits the operator. The program stack
//! takes the place of the tree.
//!
//! Precedence, lowest first:
//!
//! ```text
//! expression     := ternary ( '|' transform )*
//! ternary        := or ( '?' expression ':' expression )?
//! or             := and ( '||' and )*
//! and            := equality ( '&&' equality )*
//! equality       := relational ( ( '==' | '!=' ) relational )*
//! relational     := additive ( ( '<' | '<=' | '>' | '>=' ) additive )*
//! additive       := multiplicative ( ( '+' | '-' ) multiplicative )*
//! multiplicative := unary ( ( '*' | '/' ) unary )*
//! unary          := '!' unary | primary
//! primary        := '(' expression ')' | string | number | '-' number
//!                 | 'true' | 'false' | variable
//! transform      := name ( '(' ( expression ( ',' expression )* )? ')' )?
//! ```

use super::lexer::{Lexer, Token, TokenType};
use super::vm::{Instruction, Program, Register};
use crate::error::{BindingError, Result};
use crate::variant::Variant;

/// Nesting limit for parentheses, ternaries and unary operators
pub const MAX_PARSE_DEPTH: usize = 128;

/// Tokenize and compile an expression string into a program
pub fn compile(expression: &str) -> Result<Program> {
    log::trace!("Parsing expression: {}", expression);
    let mut lexer = Lexer::new(expression);
    let tokens = lexer.tokenize()?;
    Parser::new(expression, tokens).parse()
}

pub struct Parser<'a> {
    expression: &'a str,
    tokens: Vec<Token>,
    current: usize,
    depth: usize,
    program: Vec<Instruction>,
    stack_size: usize,
}

impl<'a> Parser<'a> {
    pub fn new(expression: &'a str, tokens: Vec<Token>) -> Self {
        Self {
            expression,
            tokens,
            current: 0,
            depth: 0,
            program: Vec::new(),
            stack_size: 0,
        }
    }

    pub fn parse(mut self) -> Result<Program> {
        if self.is_at_end() {
            return Err(self.error("Expected an expression but the string is empty."));
        }

        self.expression()?;

        if !self.is_at_end() {
            return Err(self.error(format!("Unexpected {} encountered.", self.peek().token_type)));
        }

        log::trace!(
            "Finished parsing expression '{}'. Instructions: {}",
            self.expression,
            self.program.len()
        );

        Ok(Program::new(self.program))
    }

    fn expression(&mut self) -> Result<()> {
        self.enter()?;
        self.ternary()?;
        while self.match_token(&TokenType::Pipe) {
            self.transform()?;
        }
        self.leave();
        Ok(())
    }

    fn ternary(&mut self) -> Result<()> {
        self.or()?;
        if self.match_token(&TokenType::Question) {
            self.push();
            self.expression()?;
            self.push();
            self.consume(TokenType::Colon, "Expected ':' in ternary expression")?;
            self.expression()?;
            self.pop(Register::C)?;
            self.pop(Register::L)?;
            self.emit(Instruction::Ternary);
        }
        Ok(())
    }

    fn or(&mut self) -> Result<()> {
        self.and()?;
        while self.match_token(&TokenType::OrOr) {
            self.push();
            self.and()?;
            self.pop(Register::L)?;
            self.emit(Instruction::Or);
        }
        Ok(())
    }

    fn and(&mut self) -> Result<()> {
        self.equality()?;
        while self.match_token(&TokenType::AndAnd) {
            self.push();
            self.equality()?;
            self.pop(Register::L)?;
            self.emit(Instruction::And);
        }
        Ok(())
    }

    fn equality(&mut self) -> Result<()> {
        self.relational()?;
        loop {
            let instruction = match self.peek().token_type {
                TokenType::EqualEqual => Instruction::Equal,
                TokenType::BangEqual => Instruction::NotEqual,
                _ => break,
            };
            self.advance();
            self.push();
            self.relational()?;
            self.pop(Register::L)?;
            self.emit(instruction);
        }
        Ok(())
    }

    fn relational(&mut self) -> Result<()> {
        self.additive()?;
        loop {
            let instruction = match self.peek().token_type {
                TokenType::Less => Instruction::Less,
                TokenType::LessEqual => Instruction::LessEq,
                TokenType::Greater => Instruction::Greater,
                TokenType::GreaterEqual => Instruction::GreaterEq,
                _ => break,
            };
            self.advance();
            self.push();
            self.additive()?;
            self.pop(Register::L)?;
            self.emit(instruction);
        }
        Ok(())
    }

    fn additive(&mut self) -> Result<()> {
        self.multiplicative()?;
        loop {
            let instruction = match self.peek().token_type {
                TokenType::Plus => Instruction::Add,
                TokenType::Minus => Instruction::Subtract,
                _ => break,
            };
            self.advance();
            self.push();
            self.multiplicative()?;
            self.pop(Register::L)?;
            self.emit(instruction);
        }
        Ok(())
    }

    fn multiplicative(&mut self) -> Result<()> {
        self.unary()?;
        loop {
            let instruction = match self.peek().token_type {
                TokenType::Star => Instruction::Multiply,
                TokenType::Slash => Instruction::Divide,
                _ => break,
            };
            self.advance();
            self.push();
            self.unary()?;
            self.pop(Register::L)?;
            self.emit(instruction);
        }
        Ok(())
    }

    fn unary(&mut self) -> Result<()> {
        if self.match_token(&TokenType::Bang) {
            self.enter()?;
            self.unary()?;
            self.leave();
            self.emit(Instruction::Not);
            Ok(())
        } else {
            self.primary()
        }
    }

    fn primary(&mut self) -> Result<()> {
        let token_type = self.peek().token_type.clone();
        match token_type {
            TokenType::LeftParen => {
                self.advance();
                self.expression()?;
                self.consume(TokenType::RightParen, "Expected ')' to close parenthesis")?;
            }
            TokenType::String(value) => {
                self.advance();
                self.emit(Instruction::Literal(Variant::String(value)));
            }
            TokenType::Integer(value) => {
                self.advance();
                self.emit(Instruction::Literal(Variant::Int(value)));
            }
            TokenType::Number(value) => {
                self.advance();
                self.emit(Instruction::Literal(Variant::Float(value)));
            }
            TokenType::Boolean(value) => {
                self.advance();
                self.emit(Instruction::Literal(Variant::Bool(value)));
            }
            TokenType::Identifier(name) => {
                self.advance();
                self.emit(Instruction::Variable(name));
            }
            TokenType::Minus => {
                self.advance();
                let literal = match self.peek().token_type {
                    TokenType::Integer(value) => Variant::Int(-value),
                    TokenType::Number(value) => Variant::Float(-value),
                    _ => {
                        return Err(self.error(format!(
                            "Invalid number literal. Expected a number after '-' but found {}.",
                            self.peek().token_type
                        )))
                    }
                };
                self.advance();
                self.emit(Instruction::Literal(literal));
            }
            other => {
                return Err(self.error(format!(
                    "Expected literal, variable name, parenthesis, or '!' but found {}.",
                    other
                )));
            }
        }
        Ok(())
    }

    /// The leading '|' is already consumed; the value to transform is in `R`.
    fn transform(&mut self) -> Result<()> {
        let name = match &self.peek().token_type {
            TokenType::Identifier(name) => name.clone(),
            other => {
                return Err(self.error(format!(
                    "Expected a transform name but found {}.",
                    other
                )))
            }
        };
        self.advance();

        if self.match_token(&TokenType::LeftParen) && !self.match_token(&TokenType::RightParen) {
            // Save the input value while the arguments are evaluated
            self.push();

            let mut num_arguments = 0;
            loop {
                num_arguments += 1;
                self.expression()?;
                self.push();

                if self.match_token(&TokenType::Comma) {
                    continue;
                }
                self.consume(TokenType::RightParen, "Expected one of ')' or ','")?;
                break;
            }

            self.arguments(num_arguments)?;
            self.pop(Register::R)?;
        }

        self.emit(Instruction::Transform(name));
        Ok(())
    }

    fn emit(&mut self, instruction: Instruction) {
        debug_assert!(
            !matches!(instruction, Instruction::Push | Instruction::Pop(_) | Instruction::Arguments(_)),
            "use push(), pop() or arguments() for stack instructions"
        );
        self.program.push(instruction);
    }

    fn push(&mut self) {
        self.stack_size += 1;
        self.program.push(Instruction::Push);
    }

    fn pop(&mut self, destination: Register) -> Result<()> {
        if self.stack_size == 0 {
            return Err(self.error("Internal parser error: tried to pop an empty stack."));
        }
        self.stack_size -= 1;
        self.program.push(Instruction::Pop(destination));
        Ok(())
    }

    fn arguments(&mut self, count: usize) -> Result<()> {
        if self.stack_size < count {
            return Err(self.error(format!(
                "Internal parser error: popping {} arguments, but the stack contains only {} elements.",
                count, self.stack_size
            )));
        }
        self.stack_size -= count;
        self.program.push(Instruction::Arguments(count));
        Ok(())
    }

    fn enter(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > MAX_PARSE_DEPTH {
            return Err(self.error(format!(
                "Expression nesting exceeds the maximum depth of {}.",
                MAX_PARSE_DEPTH
            )));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn error(&self, message: impl Into<String>) -> BindingError {
        BindingError::syntax(self.expression, self.peek().position, message)
    }

    fn consume(&mut self, token_type: TokenType, message: &str) -> Result<&Token> {
        if self.check(&token_type) {
            Ok(self.advance())
        } else {
            Err(self.error(format!("{} but found {}.", message, self.peek().token_type)))
        }
    }

    fn match_token(&mut self, token_type: &TokenType) -> bool {
        if self.check(token_type) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn check(&self, token_type: &TokenType) -> bool {
        std::mem::discriminant(&self.peek().token_type) == std::mem::discriminant(token_type)
    }

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        &self.tokens[self.current - 1]
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    fn is_at_end(&self) -> bool {
        matches!(self.peek().token_type, TokenType::Eof)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binary_operator_saves_left_operand() {
        let program = compile("a - b").unwrap();
        assert_eq!(
            program.instructions(),
            &[
                Instruction::Variable("a".to_string()),
                Instruction::Push,
                Instruction::Variable("b".to_string()),
                Instruction::Pop(Register::L),
                Instruction::Subtract,
            ]
        );
    }

    #[test]
    fn test_multiplication_binds_tighter() {
        let program = compile("1 + 2 * 3").unwrap();
        let codes: String = program.instructions().iter().map(|i| i.code()).collect();
        assert_eq!(codes, "DPDPDo*o+");
    }

    #[test]
    fn test_ternary_compiles_both_arms() {
        let program = compile("c ? 'a' : 'b'").unwrap();
        let codes: String = program.instructions().iter().map(|i| i.code()).collect();
        assert_eq!(codes, "VPDPDoo?");
    }

    #[test]
    fn test_transform_arguments() {
        let program = compile("x | format(2, true)").unwrap();
        let codes: String = program.instructions().iter().map(|i| i.code()).collect();
        assert_eq!(codes, "VPDPDPaoF");
        assert_eq!(program.instructions()[6], Instruction::Arguments(2));
        assert_eq!(program.instructions()[8], Instruction::Transform("format".to_string()));
    }

    #[test]
    fn test_transform_without_arguments() {
        let program = compile("name | to_upper").unwrap();
        let codes: String = program.instructions().iter().map(|i| i.code()).collect();
        assert_eq!(codes, "VF");
        let program = compile("name | to_upper()").unwrap();
        assert_eq!(program.len(), 2);
    }

    #[test]
    fn test_negative_literal() {
        let program = compile("-1.5").unwrap();
        assert_eq!(program.instructions(), &[Instruction::Literal(Variant::Float(-1.5))]);
    }

    #[test]
    fn test_syntax_errors() {
        for source in ["", "   ", "(1 + 2", "1 +", "a ? b", "'x' 'y'", "| f", "f(", "x | ", "x | f(1,", "- a", ")"] {
            assert!(compile(source).is_err(), "expected syntax error for {:?}", source);
        }
    }

    #[test]
    fn test_error_position() {
        match compile("1 + )") {
            Err(BindingError::Syntax { position, .. }) => assert_eq!(position, 4),
            other => panic!("Expected syntax error, got {:?}", other),
        }
    }

    #[test]
    fn test_depth_limit() {
        let deep = format!("{}1{}", "(".repeat(500), ")".repeat(500));
        assert!(compile(&deep).is_err());
        let bangs = format!("{}true", "!".repeat(500));
        assert!(compile(&bangs).is_err());
    }
}
