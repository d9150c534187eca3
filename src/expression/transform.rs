//! Named transform functions callable from expressions with the pipe syntax

use crate::error::{BindingError, Result};
use crate::variant::Variant;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// `input | name(arguments...)` evaluates to `transform(input, arguments)`.
/// Returning `None` signals that the arguments or input were not acceptable.
pub type TransformFn = dyn Fn(&Variant, &[Variant]) -> Option<Variant>;

#[derive(Clone, Default)]
pub struct TransformRegister {
    transforms: HashMap<String, Rc<TransformFn>>,
}

impl TransformRegister {
    pub fn new() -> Self {
        Self::default()
    }

    /// A register pre-populated with the built-in transforms
    pub fn with_builtins() -> Self {
        let mut register = Self::new();
        register.register_builtins();
        register
    }

    pub fn register<F>(&mut self, name: impl Into<String>, transform: F)
    where
        F: Fn(&Variant, &[Variant]) -> Option<Variant> + 'static,
    {
        let name = name.into();
        if self.transforms.insert(name.clone(), Rc::new(transform)).is_some() {
            log::warn!("Transform '{}' was registered twice, the previous one is replaced", name);
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.transforms.contains_key(name)
    }

    pub fn execute(&self, name: &str, input: &Variant, arguments: &[Variant]) -> Result<Variant> {
        let transform = self
            .transforms
            .get(name)
            .ok_or_else(|| BindingError::transform(name, "no transform with this name is registered"))?;

        transform(input, arguments).ok_or_else(|| {
            BindingError::transform(
                name,
                format!("could not be applied to '{}' with {} argument(s)", input, arguments.len()),
            )
        })
    }

    fn register_builtins(&mut self) {
        self.register("to_upper", |input, _| Some(Variant::String(input.to_string().to_uppercase())));
        self.register("to_lower", |input, _| Some(Variant::String(input.to_string().to_lowercase())));
        self.register("round", |input, _| input.to_number().map(|n| Variant::Float(n.round())));
        self.register("format", |input, arguments| {
            let value = input.to_number()?;
            let precision = match arguments.first() {
                Some(argument) => usize::try_from(argument.to_integer()?).ok()?,
                None => 0,
            };
            let remove_trailing_zeros = arguments.get(1).map(|a| a.as_bool()).unwrap_or(false);

            let mut text = format!("{:.*}", precision, value);
            if remove_trailing_zeros && text.contains('.') {
                let trimmed_len = text.trim_end_matches('0').trim_end_matches('.').len();
                text.truncate(trimmed_len);
            }
            Some(Variant::String(text))
        });
    }
}

impl fmt::Debug for TransformRegister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.transforms.keys().collect();
        names.sort();
        f.debug_struct("TransformRegister").field("transforms", &names).finish()
    }
}
