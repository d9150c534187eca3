//! The reactive data model
//!
//! [`DataStore`] owns everything the bindings read and write: the bound
//! top-level variables, the type register, per-element aliases, transforms and
//! the set of dirty variable names. [`DataModel`] pairs a store with the live
//! views and controllers and drives the update cycle.

pub mod address;
pub mod definition;
pub mod registry;

pub use address::{parse_address, AddressEntry, DataAddress};
pub use definition::{
    Accessor, ArrayDefinition, DataHandle, ScalarDefinition, StructDefinition, Variable, VariableDefinition,
    VariableKind,
};
pub use registry::{DataContainer, Scalar, StructHandle, TypeRegister};

use crate::binder::Binder;
use crate::controller::{DataController, DataControllers};
use crate::dom::{Document, ElementId, Event};
use crate::error::{BindingError, Result};
use crate::expression::{DataExpression, ExpressionInterface, TransformRegister};
use crate::variant::Variant;
use crate::view::{DataView, DataViews, ViewContext};
use crate::DataBindingOptions;
use std::any::Any;
use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::rc::Rc;

#[derive(Debug)]
pub struct DataStore {
    variables: HashMap<String, Variable>,
    types: TypeRegister,
    aliases: HashMap<ElementId, HashMap<String, DataAddress>>,
    transforms: TransformRegister,
    dirty: HashSet<String>,
    options: DataBindingOptions,
}

impl Default for DataStore {
    fn default() -> Self {
        Self::new(DataBindingOptions::default())
    }
}

impl DataStore {
    pub fn new(options: DataBindingOptions) -> Self {
        let transforms = if options.builtin_transforms {
            TransformRegister::with_builtins()
        } else {
            TransformRegister::new()
        };
        Self {
            variables: HashMap::new(),
            types: TypeRegister::new(),
            aliases: HashMap::new(),
            transforms,
            dirty: HashSet::new(),
            options,
        }
    }

    pub fn options(&self) -> &DataBindingOptions {
        &self.options
    }

    pub fn types(&self) -> &TypeRegister {
        &self.types
    }

    pub fn types_mut(&mut self) -> &mut TypeRegister {
        &mut self.types
    }

    pub fn transforms(&self) -> &TransformRegister {
        &self.transforms
    }

    pub fn transforms_mut(&mut self) -> &mut TransformRegister {
        &mut self.transforms
    }

    /// Bind host data of a registered struct or container type under `name`
    pub fn bind<T: Any>(&mut self, name: &str, data: &Rc<RefCell<T>>) -> Result<()> {
        let definition = self.types.get::<T>().ok_or_else(|| {
            BindingError::registration(format!(
                "cannot bind '{}', type {} is not registered",
                name,
                std::any::type_name::<T>()
            ))
        })?;
        self.insert_variable(name, definition, DataHandle::new(data))
    }

    /// Bind a scalar, registering its definition on first use
    pub fn bind_scalar<T: Scalar>(&mut self, name: &str, data: &Rc<RefCell<T>>) -> Result<()> {
        let definition = self.types.get_or_add_scalar::<T>();
        self.insert_variable(name, definition, DataHandle::new(data))
    }

    pub fn unbind(&mut self, name: &str) -> bool {
        self.variables.remove(name).is_some()
    }

    pub fn is_bound(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    pub fn variable_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.variables.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    fn insert_variable(&mut self, name: &str, definition: Rc<dyn VariableDefinition>, handle: DataHandle) -> Result<()> {
        let address = parse_address(name)?;
        if address.len() != 1 {
            return Err(BindingError::binding(format!("'{}' is not a valid variable name", name)));
        }
        if self.variables.contains_key(name) {
            return Err(BindingError::binding(format!("a variable named '{}' is already bound", name)));
        }
        log::debug!("Bound variable '{}' of type {}", name, definition.type_name());
        self.variables
            .insert(name.to_string(), Variable::new(address, definition, handle));
        Ok(())
    }

    /// Parse `path` and substitute the nearest alias found on `element` or its ancestors
    pub fn resolve_address(&self, path: &str, element: ElementId, document: &Document) -> Result<DataAddress> {
        let address = parse_address(path)?;
        if !self.aliases.is_empty() {
            for ancestor in document.ancestors(element) {
                if let Some(alias) = self.aliases.get(&ancestor).and_then(|aliases| aliases.get(address.root())) {
                    return Ok(address.rebase(alias));
                }
            }
        }
        Ok(address)
    }

    pub fn get_variable(&self, address: &DataAddress) -> Result<Variable> {
        let mut entries = address.entries().iter();
        let root = match entries.next() {
            Some(AddressEntry::Name(name)) => name,
            _ => return Err(BindingError::address(address.to_string(), "address must start with a name")),
        };

        let mut variable = self
            .variables
            .get(root)
            .cloned()
            .ok_or_else(|| BindingError::resolution(address.to_string(), format!("no variable named '{}' is bound", root)))?;

        for entry in entries {
            variable = variable.child(entry)?;
        }
        Ok(variable)
    }

    pub fn get_value(&self, address: &DataAddress) -> Result<Variant> {
        self.get_variable(address).and_then(|variable| variable.get()).map_err(|e| {
            log::warn!("{}", e);
            e
        })
    }

    pub fn set_value(&self, address: &DataAddress, value: &Variant) -> Result<()> {
        self.get_variable(address).and_then(|variable| variable.set(value)).map_err(|e| {
            log::warn!("{}", e);
            e
        })
    }

    pub fn insert_alias(&mut self, element: ElementId, name: &str, address: DataAddress) {
        log::trace!("Alias '{}' -> '{}' on element {}", name, address, element);
        self.aliases
            .entry(element)
            .or_default()
            .insert(name.to_string(), address);
    }

    pub fn erase_aliases(&mut self, element: ElementId) {
        self.aliases.remove(&element);
    }

    pub fn alias(&self, element: ElementId, name: &str) -> Option<&DataAddress> {
        self.aliases.get(&element).and_then(|aliases| aliases.get(name))
    }

    /// Drop aliases of elements that no longer exist
    pub fn purge_aliases(&mut self, document: &Document) {
        self.aliases.retain(|element, _| document.contains(*element));
    }

    pub fn dirty_variable(&mut self, name: &str) {
        self.dirty.insert(name.to_string());
    }

    pub fn is_variable_dirty(&self, name: &str) -> bool {
        self.dirty.contains(name)
    }

    pub fn take_dirty(&mut self) -> HashSet<String> {
        std::mem::take(&mut self.dirty)
    }

    fn clear(&mut self) {
        self.aliases.clear();
        self.dirty.clear();
    }
}

/// An expression compiled against the model, with its variable paths resolved
#[derive(Debug, Clone)]
pub struct BoundExpression {
    expression: DataExpression,
    addresses: HashMap<String, DataAddress>,
}

impl BoundExpression {
    pub fn new(source: &str, element: ElementId, store: &DataStore, document: &Document) -> Result<Self> {
        let expression = DataExpression::compile(source)?;

        let mut addresses = HashMap::new();
        for path in expression.variable_paths() {
            let address = store.resolve_address(path, element, document)?;
            addresses.insert(path.to_string(), address);
        }

        if store.options().debug_mode {
            log::debug!("Program for '{}':\n{}", source, expression.program());
        }

        Ok(Self { expression, addresses })
    }

    pub fn source(&self) -> &str {
        self.expression.source()
    }

    /// Root names of every variable the expression reads
    pub fn dependencies(&self) -> Vec<String> {
        let names: BTreeSet<&str> = self.addresses.values().map(DataAddress::root).collect();
        names.into_iter().map(str::to_string).collect()
    }

    pub fn run(&self, store: &DataStore) -> Result<Variant> {
        let interface = ModelInterface {
            store,
            addresses: &self.addresses,
        };
        self.expression.run(&interface)
    }
}

struct ModelInterface<'a> {
    store: &'a DataStore,
    addresses: &'a HashMap<String, DataAddress>,
}

impl ExpressionInterface for ModelInterface<'_> {
    fn get_value(&self, path: &str) -> Result<Variant> {
        let address = self
            .addresses
            .get(path)
            .ok_or_else(|| BindingError::resolution(path, "variable was not resolved when the expression was compiled"))?;
        self.store.get_value(address)
    }

    fn execute_transform(&self, name: &str, input: &Variant, arguments: &[Variant]) -> Result<Variant> {
        self.store.transforms.execute(name, input, arguments)
    }
}

/// A reactive scope: data store, views and controllers
pub struct DataModel {
    name: String,
    store: DataStore,
    views: DataViews,
    controllers: DataControllers,
    binder: Binder,
}

impl DataModel {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_options(name, DataBindingOptions::default())
    }

    pub fn with_options(name: impl Into<String>, options: DataBindingOptions) -> Self {
        let binder = Binder::new(&options.default_alias);
        Self {
            name: name.into(),
            store: DataStore::new(options),
            views: DataViews::new(),
            controllers: DataControllers::new(),
            binder,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn store(&self) -> &DataStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut DataStore {
        &mut self.store
    }

    pub fn types_mut(&mut self) -> &mut TypeRegister {
        self.store.types_mut()
    }

    pub fn views(&self) -> &DataViews {
        &self.views
    }

    pub fn controllers(&self) -> &DataControllers {
        &self.controllers
    }

    pub fn bind<T: Any>(&mut self, name: &str, data: &Rc<RefCell<T>>) -> Result<()> {
        self.store.bind(name, data)
    }

    pub fn bind_scalar<T: Scalar>(&mut self, name: &str, data: &Rc<RefCell<T>>) -> Result<()> {
        self.store.bind_scalar(name, data)
    }

    pub fn register_transform<F>(&mut self, name: &str, transform: F)
    where
        F: Fn(&Variant, &[Variant]) -> Option<Variant> + 'static,
    {
        self.store.transforms_mut().register(name, transform);
    }

    pub fn dirty_variable(&mut self, name: &str) {
        self.store.dirty_variable(name);
    }

    pub fn is_variable_dirty(&self, name: &str) -> bool {
        self.store.is_variable_dirty(name)
    }

    /// Construct views and controllers for every binding in the document
    pub fn bind_document(&mut self, document: &mut Document) -> usize {
        let root = document.root();
        self.bind_element(document, root)
    }

    /// Construct views and controllers for every binding found under `root`.
    /// Returns the number of bindings created; they take effect on the next update.
    pub fn bind_element(&mut self, document: &mut Document, root: ElementId) -> usize {
        let bindings = self.binder.bind_subtree(&self.store, document, root);
        let count = bindings.views.len() + bindings.controllers.len();
        for view in bindings.views {
            self.views.add(view);
        }
        for controller in bindings.controllers {
            self.register_controller(controller, document);
        }
        log::debug!("Data model '{}': {} binding(s) created under {}", self.name, count, root);
        count
    }

    pub fn add_view(&mut self, view: Box<dyn DataView>) {
        self.views.add(view);
    }

    pub fn add_controller(&mut self, controller: Box<dyn DataController>, document: &mut Document) -> Result<()> {
        self.controllers.add(controller, document).map(|_| ())
    }

    /// Run one update cycle for the variables dirtied since the last call.
    /// Returns true if any view changed the document.
    pub fn update(&mut self, document: &mut Document) -> bool {
        let dirty = self.store.take_dirty();
        let max_iterations = self.store.options().max_update_iterations;

        let (changed, new_controllers) = {
            let mut context = ViewContext::new(&mut self.store, document, &self.binder);
            let changed = self.views.update(&mut context, &dirty, max_iterations);
            (changed, context.into_controllers())
        };

        for controller in new_controllers {
            self.register_controller(controller, document);
        }
        self.controllers.remove_dead(document);
        self.store.purge_aliases(document);

        changed
    }

    /// Dispatch an event to the controllers listening on its target.
    /// Returns true if a bound variable was written.
    pub fn process_event(&mut self, document: &mut Document, event: &Event) -> bool {
        self.controllers.process_event(&mut self.store, document, event)
    }

    /// Release every view, controller and alias of this scope
    pub fn clear(&mut self, document: &mut Document) {
        self.controllers.clear(document);
        self.views.clear();
        self.store.clear();
    }

    fn register_controller(&mut self, controller: Box<dyn DataController>, document: &mut Document) {
        if let Err(e) = self.controllers.add(controller, document) {
            log::warn!("Could not add data controller: {}", e);
        }
    }
}

impl std::fmt::Debug for DataModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataModel")
            .field("name", &self.name)
            .field("variables", &self.store.variable_names())
            .field("views", &self.views.len())
            .field("controllers", &self.controllers.len())
            .finish()
    }
}
