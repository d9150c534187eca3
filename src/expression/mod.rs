//! Data expressions: compile once at binding construction, execute on every update
//!
//! Expressions are used in attribute bindings, `{{ }}` interpolations and
//! conditional directives. A [`DataExpression`] owns its compiled [`Program`];
//! variables are looked up at execution time through an [`ExpressionInterface`],
//! so the same program can be run against a changing data model.

pub mod lexer;
pub mod parser;
pub mod transform;
pub mod vm;

use crate::error::{BindingError, Result};
use crate::variant::Variant;

pub use transform::{TransformFn, TransformRegister};
pub use vm::{ExecutionContext, Instruction, Program, Register};

/// What a running program needs from the outside world
pub trait ExpressionInterface {
    /// Resolve a variable path and fetch its scalar value
    fn get_value(&self, path: &str) -> Result<Variant>;

    /// Invoke the named transform with the piped input value
    fn execute_transform(&self, name: &str, input: &Variant, arguments: &[Variant]) -> Result<Variant>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct DataExpression {
    source: String,
    program: Program,
}

impl DataExpression {
    /// Compile an expression. Syntax errors are reported on the diagnostic channel and returned.
    pub fn compile(source: &str) -> Result<Self> {
        match parser::compile(source) {
            Ok(program) => {
                log::debug!("Compiled expression '{}' into {} instructions", source, program.len());
                Ok(Self {
                    source: source.to_string(),
                    program,
                })
            }
            Err(e) => {
                report_error(&e);
                Err(e)
            }
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    /// Distinct variable paths read by the program, in first-use order
    pub fn variable_paths(&self) -> Vec<&str> {
        let mut paths: Vec<&str> = Vec::new();
        for path in self.program.variable_paths() {
            if !paths.contains(&path) {
                paths.push(path);
            }
        }
        paths
    }

    pub fn run(&self, interface: &dyn ExpressionInterface) -> Result<Variant> {
        ExecutionContext::new(&self.program).run(interface)
    }
}

/// Log an error, with a caret line under the offending column for syntax errors
pub fn report_error(error: &BindingError) {
    match error {
        BindingError::Syntax {
            expression,
            position,
            message,
        } => {
            let prefix = "Error in expression '";
            log::warn!("{}{}' at {}. {}", prefix, expression, position, message);
            log::warn!("{}^", " ".repeat(prefix.len() + position));
        }
        other => log::warn!("{}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::collections::HashMap;
    use std::rc::Rc;

    struct TestInterface {
        values: HashMap<String, Variant>,
        transforms: TransformRegister,
    }

    impl TestInterface {
        fn new() -> Self {
            let mut values = HashMap::new();
            values.insert("x".to_string(), Variant::Int(5));
            values.insert("y".to_string(), Variant::Int(3));
            values.insert("s".to_string(), Variant::from("ab"));
            Self {
                values,
                transforms: TransformRegister::with_builtins(),
            }
        }
    }

    impl ExpressionInterface for TestInterface {
        fn get_value(&self, path: &str) -> Result<Variant> {
            self.values
                .get(path)
                .cloned()
                .ok_or_else(|| BindingError::resolution(path, "not found"))
        }

        fn execute_transform(&self, name: &str, input: &Variant, arguments: &[Variant]) -> Result<Variant> {
            self.transforms.execute(name, input, arguments)
        }
    }

    fn eval(source: &str) -> Variant {
        DataExpression::compile(source).unwrap().run(&TestInterface::new()).unwrap()
    }

    #[test]
    fn test_arithmetic_and_concatenation() {
        assert_eq!(eval("x+y").to_string(), "8");
        assert_eq!(eval("s+'c'"), Variant::from("abc"));
        assert_eq!(eval("x - y * 2"), Variant::Int(-1));
        assert_eq!(eval("(x - y) * 2"), Variant::Int(4));
        assert_eq!(eval("x / 2"), Variant::Float(2.5));
        assert_eq!(eval("'n=' + x"), Variant::from("n=5"));
    }

    #[test]
    fn test_comparison_and_logic() {
        assert_eq!(eval("x>y"), Variant::Bool(true));
        assert_eq!(eval("x <= y"), Variant::Bool(false));
        assert_eq!(eval("!false"), Variant::Bool(true));
        assert_eq!(eval("x > 1 && y > 1"), Variant::Bool(true));
        assert_eq!(eval("x > 10 || y > 10"), Variant::Bool(false));
        assert_eq!(eval("s == 'ab'"), Variant::Bool(true));
        assert_eq!(eval("x != 5"), Variant::Bool(false));
        assert_eq!(eval("x == '5'"), Variant::Bool(true));
    }

    #[test]
    fn test_ternary() {
        assert_eq!(eval("x==5?'yes':'no'"), Variant::from("yes"));
        assert_eq!(eval("x==4 ? 'yes' : 'no'"), Variant::from("no"));
        assert_eq!(eval("x > y ? x : y"), Variant::Int(5));
        assert_eq!(eval("false ? 1 : true ? 2 : 3"), Variant::Int(2));
    }

    #[test]
    fn test_transforms_in_expressions() {
        assert_eq!(eval("s | to_upper"), Variant::from("AB"));
        assert_eq!(eval("x / 3 | format(2)"), Variant::from("1.67"));
        assert_eq!(eval("'v' + (s | to_upper)"), Variant::from("vAB"));
    }

    #[test]
    fn test_both_ternary_arms_are_evaluated() {
        let calls = Rc::new(Cell::new(0));
        let mut interface = TestInterface::new();
        let counter = calls.clone();
        interface.transforms.register("count", move |input, _| {
            counter.set(counter.get() + 1);
            Some(input.clone())
        });

        let expression = DataExpression::compile("x == 5 ? 'taken' : ('untaken' | count)").unwrap();
        assert_eq!(expression.run(&interface).unwrap(), Variant::from("taken"));
        assert_eq!(calls.get(), 1);

        assert_eq!(expression.run(&interface).unwrap(), Variant::from("taken"));
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_runtime_errors_yield_no_result() {
        let expression = DataExpression::compile("missing + 1").unwrap();
        assert!(expression.run(&TestInterface::new()).is_err());
        let expression = DataExpression::compile("x | nonexistent").unwrap();
        assert!(expression.run(&TestInterface::new()).is_err());
    }

    #[test]
    fn test_variable_paths() {
        let expression = DataExpression::compile("a.b + c[0] + a.b").unwrap();
        assert_eq!(expression.variable_paths(), vec!["a.b", "c[0]"]);
    }
}
