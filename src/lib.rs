//! Kryon Data Binding
//!
//! Reactive bindings between host application data and a Kryon document tree.
//! Host values are exposed to markup through registered types, small
//! expressions are compiled once and re-run whenever the variables they read
//! are marked dirty.
//!
//! # Features
//!
//! - Expression language with arithmetic, comparison, logic, ternaries and `|transform(args)` pipes
//! - Register based virtual machine running compiled expression programs
//! - Reflection of host scalars, structs and containers through a type register
//! - Text interpolation, attribute, style, class, content, conditional and repetition views
//! - Value and event controllers writing interaction back into the data
//! - Dependency indexed update scheduler ordered by tree depth
//!
//! # Basic Usage
//!
//! ```rust
//! use kryon_databind::{DataModel, Document, ElementTemplate, Result};
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! fn main() -> Result<()> {
//!     let score = Rc::new(RefCell::new(42));
//!     let mut model = DataModel::new("game");
//!     model.bind_scalar("score", &score)?;
//!
//!     let mut document = Document::new();
//!     let label = document.instantiate(&ElementTemplate::text("Score: {{score}}"));
//!     document.append_child(document.root(), label)?;
//!
//!     model.bind_document(&mut document);
//!     model.update(&mut document);
//!     assert_eq!(document.text(label), Some("Score: 42"));
//!
//!     *score.borrow_mut() = 43;
//!     model.dirty_variable("score");
//!     model.update(&mut document);
//!     assert_eq!(document.text(label), Some("Score: 43"));
//!     Ok(())
//! }
//! ```
//!
//! # Update Cycle
//!
//! 1. **Bind**: host data is bound by name; markup bindings become views and controllers
//! 2. **Dirty**: the host marks top-level variable names whose data changed
//! 3. **Update**: views depending on dirty names run, parents before children
//! 4. **Events**: controllers write interaction results back and dirty their variables

pub mod binder;
pub mod cli;
pub mod controller;
pub mod dom;
pub mod error;
pub mod expression;
pub mod model;
pub mod variant;
pub mod view;

use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::rc::Rc;

// Re-export commonly used types and functions
pub use binder::{Binder, Bindings};
pub use controller::{DataController, DataControllers, EventController, ValueController};
pub use dom::{Document, ElementId, ElementTemplate, Event, EventKind, ListenerId};
pub use error::{BindingError, Result};
pub use expression::{DataExpression, ExpressionInterface, Program, TransformRegister};
pub use model::{
    parse_address, AddressEntry, BoundExpression, DataAddress, DataContainer, DataModel, DataStore, Scalar,
    TypeRegister, Variable, VariableKind,
};
pub use variant::Variant;
pub use view::{DataView, DataViews, ViewBase, ViewContext};
pub use cli::EnhancedCli;

/// Library version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Library build information
pub const BUILD_INFO: BuildInfo = BuildInfo {
    version: VERSION,
    name: NAME,
    description: DESCRIPTION,
    supported_features: &[
        "expressions",
        "transforms",
        "text-interpolation",
        "attribute-views",
        "style-views",
        "class-views",
        "rml-views",
        "conditional-views",
        "repetition-views",
        "value-controllers",
        "event-controllers",
    ],
};

/// Library information structure
#[derive(Debug, Clone)]
pub struct BuildInfo {
    pub version: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub supported_features: &'static [&'static str],
}

/// Data binding options and settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataBindingOptions {
    /// Upper bound on scheduler passes per update when views create new views
    pub max_update_iterations: usize,

    /// Loop variable name of `data-for` bindings without an explicit alias
    pub default_alias: String,

    /// Dump compiled expression programs at debug level
    pub debug_mode: bool,

    /// Register the built-in transforms in new models
    pub builtin_transforms: bool,
}

impl Default for DataBindingOptions {
    fn default() -> Self {
        Self {
            max_update_iterations: 10,
            default_alias: "it".to_string(),
            debug_mode: false,
            builtin_transforms: true,
        }
    }
}

/// Check if a feature is supported
pub fn supports_feature(feature: &str) -> bool {
    BUILD_INFO.supported_features.contains(&feature)
}

/// Get library build information
pub fn get_build_info() -> &'static BuildInfo {
    &BUILD_INFO
}

/// Compile and run an expression against a set of named scalar values
pub fn evaluate_expression(source: &str, variables: &[(String, Variant)]) -> Result<Variant> {
    evaluate_expression_with_options(source, variables, &DataBindingOptions::default())
}

pub fn evaluate_expression_with_options(
    source: &str,
    variables: &[(String, Variant)],
    options: &DataBindingOptions,
) -> Result<Variant> {
    let mut store = DataStore::new(options.clone());

    // Kept alive until the expression has run; the store only holds weak handles
    let mut cells = Vec::with_capacity(variables.len());
    for (name, value) in variables {
        let cell = Rc::new(RefCell::new(value.clone()));
        store.bind_scalar(name, &cell)?;
        cells.push(cell);
    }

    let document = Document::new();
    let expression = BoundExpression::new(source, document.root(), &store, &document)?;
    let result = expression.run(&store);
    drop(cells);
    result
}
