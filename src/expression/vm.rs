//! The abstract machine for data expressions
//!
//! The machine executes a flat program against three registers:
//!
//! - `R` results and right-hand side operands
//! - `L` left-hand side operands
//! - `C` center operands (the true branch of the ternary operator)
//!
//! and two stacks:
//!
//! - `S` the main program stack, used to save a register across a sub-expression
//! - `A` the argument stack, only used to pass arguments to a transform
//!
//! | Instruction    | Effect                                   |
//! |----------------|------------------------------------------|
//! | `Push`         | `S+ = R`                                 |
//! | `Pop(reg)`     | `reg = S-`                               |
//! | `Literal(D)`   | `R = D`                                  |
//! | `Variable(D)`  | `R = model.get_value(D)`                 |
//! | binary ops     | `R = L <op> R`                           |
//! | `Not`          | `R = !R`                                 |
//! | `Ternary`      | `R = L ? C : R`                          |
//! | `Arguments(n)` | `A+ = S-`, repeated `n` times            |
//! | `Transform(D)` | `R = transform D(R, A)`, then `A` clears |

use super::ExpressionInterface;
use crate::error::{BindingError, Result};
use crate::variant::Variant;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Register {
    R,
    L,
    C,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    Push,
    Pop(Register),
    Literal(Variant),
    Variable(String),
    Add,
    Subtract,
    Multiply,
    Divide,
    Not,
    And,
    Or,
    Equal,
    NotEqual,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    Ternary,
    Arguments(usize),
    Transform(String),
}

impl Instruction {
    /// Single character mnemonic used in program listings
    pub fn code(&self) -> char {
        match self {
            Instruction::Push => 'P',
            Instruction::Pop(_) => 'o',
            Instruction::Literal(_) => 'D',
            Instruction::Variable(_) => 'V',
            Instruction::Add => '+',
            Instruction::Subtract => '-',
            Instruction::Multiply => '*',
            Instruction::Divide => '/',
            Instruction::Not => '!',
            Instruction::And => '&',
            Instruction::Or => '|',
            Instruction::Equal => '=',
            Instruction::NotEqual => 'N',
            Instruction::Less => '<',
            Instruction::LessEq => 'L',
            Instruction::Greater => '>',
            Instruction::GreaterEq => 'G',
            Instruction::Ternary => '?',
            Instruction::Arguments(_) => 'a',
            Instruction::Transform(_) => 'F',
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}'", self.code())?;
        match self {
            Instruction::Pop(register) => write!(f, "  {:?}", register),
            Instruction::Literal(value) => write!(f, "  {} ({})", value, value.type_name()),
            Instruction::Variable(name) | Instruction::Transform(name) => write!(f, "  {}", name),
            Instruction::Arguments(count) => write!(f, "  {}", count),
            _ => Ok(()),
        }
    }
}

/// An immutable, compiled expression
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Program {
    instructions: Vec<Instruction>,
}

impl Program {
    pub(crate) fn new(instructions: Vec<Instruction>) -> Self {
        Self { instructions }
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Variable paths in the order they are loaded
    pub fn variable_paths(&self) -> impl Iterator<Item = &str> {
        self.instructions.iter().filter_map(|instruction| match instruction {
            Instruction::Variable(path) => Some(path.as_str()),
            _ => None,
        })
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, instruction) in self.instructions.iter().enumerate() {
            writeln!(f, "  {:4}  {}", i, instruction)?;
        }
        Ok(())
    }
}

pub struct ExecutionContext<'a> {
    program: &'a Program,
    r: Variant,
    l: Variant,
    c: Variant,
    stack: Vec<Variant>,
    arguments: Vec<Variant>,
}

impl<'a> ExecutionContext<'a> {
    pub fn new(program: &'a Program) -> Self {
        Self {
            program,
            r: Variant::Empty,
            l: Variant::Empty,
            c: Variant::Empty,
            stack: Vec::new(),
            arguments: Vec::new(),
        }
    }

    /// Run the program to completion and return the value left in `R`
    pub fn run(mut self, interface: &dyn ExpressionInterface) -> Result<Variant> {
        log::trace!("Executing program:\n{}", self.program);

        let program = self.program;
        for instruction in program.instructions() {
            if let Err(e) = self.execute(instruction, interface) {
                log::warn!(
                    "Failed executing program with {} instructions. {}",
                    program.len(),
                    e
                );
                return Err(e);
            }
        }

        log::trace!(
            "Finished execution. R: '{}'  L: '{}'  C: '{}'  Stack #: {}",
            self.r,
            self.l,
            self.c,
            self.stack.len()
        );

        Ok(self.r)
    }

    fn execute(&mut self, instruction: &Instruction, interface: &dyn ExpressionInterface) -> Result<()> {
        match instruction {
            Instruction::Push => {
                let value = std::mem::take(&mut self.r);
                self.stack.push(value);
            }
            Instruction::Pop(register) => {
                let value = self
                    .stack
                    .pop()
                    .ok_or_else(|| BindingError::execution("Cannot pop stack, it is empty."))?;
                match register {
                    Register::R => self.r = value,
                    Register::L => self.l = value,
                    Register::C => self.c = value,
                }
            }
            Instruction::Literal(value) => {
                self.r = value.clone();
            }
            Instruction::Variable(path) => {
                self.r = interface.get_value(path)?;
            }
            Instruction::Add => {
                self.r = if self.l.is_string() || self.r.is_string() {
                    Variant::String(format!("{}{}", self.l, self.r))
                } else {
                    arithmetic(&self.l, &self.r, i64::checked_add, |a, b| a + b)
                };
            }
            Instruction::Subtract => {
                self.r = arithmetic(&self.l, &self.r, i64::checked_sub, |a, b| a - b);
            }
            Instruction::Multiply => {
                self.r = arithmetic(&self.l, &self.r, i64::checked_mul, |a, b| a * b);
            }
            Instruction::Divide => {
                self.r = Variant::Float(self.l.as_number() / self.r.as_number());
            }
            Instruction::Not => {
                self.r = Variant::Bool(!self.r.as_bool());
            }
            Instruction::And => {
                self.r = Variant::Bool(self.l.as_bool() && self.r.as_bool());
            }
            Instruction::Or => {
                self.r = Variant::Bool(self.l.as_bool() || self.r.as_bool());
            }
            Instruction::Equal => {
                self.r = Variant::Bool(self.values_equal());
            }
            Instruction::NotEqual => {
                self.r = Variant::Bool(!self.values_equal());
            }
            Instruction::Less => {
                self.r = Variant::Bool(self.l.as_number() < self.r.as_number());
            }
            Instruction::LessEq => {
                self.r = Variant::Bool(self.l.as_number() <= self.r.as_number());
            }
            Instruction::Greater => {
                self.r = Variant::Bool(self.l.as_number() > self.r.as_number());
            }
            Instruction::GreaterEq => {
                self.r = Variant::Bool(self.l.as_number() >= self.r.as_number());
            }
            Instruction::Ternary => {
                if self.l.as_bool() {
                    self.r = std::mem::take(&mut self.c);
                }
            }
            Instruction::Arguments(count) => {
                if !self.arguments.is_empty() {
                    return Err(BindingError::execution("Invalid program: argument stack is not empty."));
                }
                if self.stack.len() < *count {
                    return Err(BindingError::execution(format!(
                        "Cannot pop {} arguments, stack contains only {} elements.",
                        count,
                        self.stack.len()
                    )));
                }
                let first = self.stack.len() - count;
                self.arguments = self.stack.split_off(first);
            }
            Instruction::Transform(name) => {
                let arguments = std::mem::take(&mut self.arguments);
                log::trace!("Executing transform '{}' with {} argument(s)", name, arguments.len());
                self.r = interface.execute_transform(name, &self.r, &arguments)?;
            }
        }
        Ok(())
    }

    fn values_equal(&self) -> bool {
        if self.l.is_string() || self.r.is_string() {
            self.l.to_string() == self.r.to_string()
        } else {
            self.l.as_number() == self.r.as_number()
        }
    }
}

/// Integer arithmetic when both sides are integers and the result fits, floating point otherwise
fn arithmetic(
    left: &Variant,
    right: &Variant,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> Variant {
    if let (Variant::Int(a), Variant::Int(b)) = (left, right) {
        if let Some(result) = int_op(*a, *b) {
            return Variant::Int(result);
        }
    }
    Variant::Float(float_op(left.as_number(), right.as_number()))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoData;

    impl ExpressionInterface for NoData {
        fn get_value(&self, path: &str) -> Result<Variant> {
            Err(BindingError::resolution(path, "no data"))
        }

        fn execute_transform(&self, name: &str, _input: &Variant, _arguments: &[Variant]) -> Result<Variant> {
            Err(BindingError::transform(name, "no transforms"))
        }
    }

    #[test]
    fn test_stack_underflow_is_an_error() {
        let program = Program::new(vec![Instruction::Pop(Register::L)]);
        assert!(ExecutionContext::new(&program).run(&NoData).is_err());
    }

    #[test]
    fn test_argument_underflow_is_an_error() {
        let program = Program::new(vec![Instruction::Push, Instruction::Arguments(2)]);
        assert!(ExecutionContext::new(&program).run(&NoData).is_err());
    }

    #[test]
    fn test_hand_assembled_program() {
        // 2 * 3 - 1
        let program = Program::new(vec![
            Instruction::Literal(Variant::Int(2)),
            Instruction::Push,
            Instruction::Literal(Variant::Int(3)),
            Instruction::Pop(Register::L),
            Instruction::Multiply,
            Instruction::Push,
            Instruction::Literal(Variant::Int(1)),
            Instruction::Pop(Register::L),
            Instruction::Subtract,
        ]);
        let result = ExecutionContext::new(&program).run(&NoData).unwrap();
        assert_eq!(result, Variant::Int(5));
    }

    #[test]
    fn test_listing() {
        let program = Program::new(vec![Instruction::Variable("x".to_string()), Instruction::Not]);
        let listing = program.to_string();
        assert!(listing.contains("'V'  x"));
        assert!(listing.contains("'!'"));
    }
}
