//! Error types for the Kryon data binding layer

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BindingError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Syntax error in expression '{expression}' at {position}: {message}")]
    Syntax { expression: String, position: usize, message: String },

    #[error("Invalid data address '{address}': {message}")]
    Address { address: String, message: String },

    #[error("Could not resolve data variable '{address}': {message}")]
    Resolution { address: String, message: String },

    #[error("Data variable '{address}' is a {found}, expected a {expected}")]
    Kind { address: String, expected: String, found: String },

    #[error("Error during execution: {message}")]
    Execution { message: String },

    #[error("Transform '{name}' failed: {message}")]
    Transform { name: String, message: String },

    #[error("Type registration error: {message}")]
    Registration { message: String },

    #[error("Binding error: {message}")]
    Binding { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: String },

    #[error("Invalid format: {message}")]
    InvalidFormat { message: String },
}

pub type Result<T> = std::result::Result<T, BindingError>;

impl BindingError {
    pub fn syntax(expression: impl Into<String>, position: usize, message: impl Into<String>) -> Self {
        Self::Syntax {
            expression: expression.into(),
            position,
            message: message.into(),
        }
    }

    pub fn address(address: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Address {
            address: address.into(),
            message: message.into(),
        }
    }

    pub fn resolution(address: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Resolution {
            address: address.into(),
            message: message.into(),
        }
    }

    pub fn kind(address: impl Into<String>, expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self::Kind {
            address: address.into(),
            expected: expected.into(),
            found: found.into(),
        }
    }

    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution {
            message: message.into(),
        }
    }

    pub fn transform(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transform {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn registration(message: impl Into<String>) -> Self {
        Self::Registration {
            message: message.into(),
        }
    }

    pub fn binding(message: impl Into<String>) -> Self {
        Self::Binding {
            message: message.into(),
        }
    }
}
