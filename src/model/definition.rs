//! Variable definitions describe how to read, write and navigate host data
//!
//! One definition instance is registered per host type and shared by every
//! [`Variable`] that points at a value of that type. A variable pairs the
//! definition with a [`DataHandle`]: a weak reference to the bound root plus
//! the chain of accessors leading from the root to the value.

use super::address::{AddressEntry, DataAddress};
use super::registry::{DataContainer, Scalar};
use crate::error::{BindingError, Result};
use crate::variant::Variant;
use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::rc::{Rc, Weak};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableKind {
    Scalar,
    Array,
    Struct,
}

impl fmt::Display for VariableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VariableKind::Scalar => write!(f, "scalar"),
            VariableKind::Array => write!(f, "array"),
            VariableKind::Struct => write!(f, "struct"),
        }
    }
}

type GetFn = dyn Fn(&dyn Any) -> Option<&dyn Any>;
type GetMutFn = dyn Fn(&mut dyn Any) -> Option<&mut dyn Any>;

/// One navigation step from a parent value to a child value
#[derive(Clone)]
pub struct Accessor {
    get: Rc<GetFn>,
    get_mut: Rc<GetMutFn>,
}

impl Accessor {
    pub fn new<G, M>(get: G, get_mut: M) -> Self
    where
        G: Fn(&dyn Any) -> Option<&dyn Any> + 'static,
        M: Fn(&mut dyn Any) -> Option<&mut dyn Any> + 'static,
    {
        Self {
            get: Rc::new(get),
            get_mut: Rc::new(get_mut),
        }
    }

    /// Accessor for a field of struct `T`
    pub fn member<T: Any, M: Any>(get: fn(&T) -> &M, get_mut: fn(&mut T) -> &mut M) -> Self {
        Self::new(
            move |data| data.downcast_ref::<T>().map(|object| get(object) as &dyn Any),
            move |data| data.downcast_mut::<T>().map(|object| get_mut(object) as &mut dyn Any),
        )
    }

    /// Accessor for the item at `index` of container `C`
    pub fn index<C: DataContainer>(index: usize) -> Self {
        Self::new(
            move |data| {
                data.downcast_ref::<C>()
                    .and_then(|container| container.item(index))
                    .map(|item| item as &dyn Any)
            },
            move |data| {
                data.downcast_mut::<C>()
                    .and_then(|container| container.item_mut(index))
                    .map(|item| item as &mut dyn Any)
            },
        )
    }
}

impl fmt::Debug for Accessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Accessor")
    }
}

/// Describes how to interpret a value of one host type
pub trait VariableDefinition {
    fn kind(&self) -> VariableKind;

    /// Host type name, for diagnostics
    fn type_name(&self) -> &'static str;

    fn get(&self, _data: &dyn Any) -> Option<Variant> {
        None
    }

    /// Returns false if the value could not be converted to the host type
    fn set(&self, _data: &mut dyn Any, _value: &Variant) -> bool {
        false
    }

    fn size(&self, _data: &dyn Any) -> Option<usize> {
        None
    }

    fn child(&self, _data: &dyn Any, _entry: &AddressEntry) -> Option<(Rc<dyn VariableDefinition>, Accessor)> {
        None
    }
}

pub struct ScalarDefinition<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T: Scalar> ScalarDefinition<T> {
    pub fn new() -> Self {
        Self { _marker: PhantomData }
    }
}

impl<T: Scalar> Default for ScalarDefinition<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Scalar> VariableDefinition for ScalarDefinition<T> {
    fn kind(&self) -> VariableKind {
        VariableKind::Scalar
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn get(&self, data: &dyn Any) -> Option<Variant> {
        data.downcast_ref::<T>().map(Scalar::to_variant)
    }

    fn set(&self, data: &mut dyn Any, value: &Variant) -> bool {
        match data.downcast_mut::<T>() {
            Some(target) => target.assign_variant(value),
            None => false,
        }
    }
}

pub struct ArrayDefinition<C> {
    element: Rc<dyn VariableDefinition>,
    _marker: PhantomData<fn() -> C>,
}

impl<C: DataContainer> ArrayDefinition<C> {
    pub fn new(element: Rc<dyn VariableDefinition>) -> Self {
        Self {
            element,
            _marker: PhantomData,
        }
    }
}

impl<C: DataContainer> VariableDefinition for ArrayDefinition<C> {
    fn kind(&self) -> VariableKind {
        VariableKind::Array
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<C>()
    }

    fn size(&self, data: &dyn Any) -> Option<usize> {
        data.downcast_ref::<C>().map(DataContainer::len)
    }

    fn child(&self, data: &dyn Any, entry: &AddressEntry) -> Option<(Rc<dyn VariableDefinition>, Accessor)> {
        let container = data.downcast_ref::<C>()?;
        match entry {
            AddressEntry::Index(index) if *index < container.len() => {
                Some((self.element.clone(), Accessor::index::<C>(*index)))
            }
            _ => None,
        }
    }
}

pub(crate) struct StructMember {
    definition: Rc<dyn VariableDefinition>,
    accessor: Accessor,
}

pub struct StructDefinition<T> {
    members: RefCell<HashMap<String, StructMember>>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Any> StructDefinition<T> {
    pub fn new() -> Self {
        Self {
            members: RefCell::new(HashMap::new()),
            _marker: PhantomData,
        }
    }

    /// Returns false if a member with this name already exists
    pub(crate) fn add_member(&self, name: &str, definition: Rc<dyn VariableDefinition>, accessor: Accessor) -> bool {
        let Ok(mut members) = self.members.try_borrow_mut() else {
            return false;
        };
        if members.contains_key(name) {
            return false;
        }
        members.insert(name.to_string(), StructMember { definition, accessor });
        true
    }

    pub fn member_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .members
            .try_borrow()
            .map(|members| members.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }
}

impl<T: Any> Default for StructDefinition<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Any> VariableDefinition for StructDefinition<T> {
    fn kind(&self) -> VariableKind {
        VariableKind::Struct
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn child(&self, _data: &dyn Any, entry: &AddressEntry) -> Option<(Rc<dyn VariableDefinition>, Accessor)> {
        let AddressEntry::Name(name) = entry else {
            return None;
        };
        let members = self.members.try_borrow().ok()?;
        members
            .get(name)
            .map(|member| (member.definition.clone(), member.accessor.clone()))
    }
}

/// Where a variable's value lives: a bound root and the path from it
#[derive(Clone)]
pub struct DataHandle {
    root: Weak<RefCell<dyn Any>>,
    path: Vec<Accessor>,
}

impl DataHandle {
    pub fn new<T: Any>(root: &Rc<RefCell<T>>) -> Self {
        let root: Rc<RefCell<dyn Any>> = root.clone();
        Self {
            root: Rc::downgrade(&root),
            path: Vec::new(),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.root.strong_count() > 0
    }

    fn child(&self, accessor: Accessor) -> Self {
        let mut path = self.path.clone();
        path.push(accessor);
        Self {
            root: self.root.clone(),
            path,
        }
    }
}

impl fmt::Debug for DataHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataHandle")
            .field("alive", &self.is_alive())
            .field("depth", &self.path.len())
            .finish()
    }
}

/// A definition bound to a concrete location. Recomputed on every access.
#[derive(Clone)]
pub struct Variable {
    address: DataAddress,
    definition: Rc<dyn VariableDefinition>,
    handle: DataHandle,
}

impl Variable {
    pub fn new(address: DataAddress, definition: Rc<dyn VariableDefinition>, handle: DataHandle) -> Self {
        Self {
            address,
            definition,
            handle,
        }
    }

    pub fn address(&self) -> &DataAddress {
        &self.address
    }

    pub fn kind(&self) -> VariableKind {
        self.definition.kind()
    }

    /// False once the bound host data has been dropped
    pub fn is_valid(&self) -> bool {
        self.handle.is_alive()
    }

    pub fn get(&self) -> Result<Variant> {
        self.expect_kind(VariableKind::Scalar)?;
        self.with_data(|data| {
            self.definition
                .get(data)
                .ok_or_else(|| self.error("stored value does not match its definition"))
        })
    }

    pub fn set(&self, value: &Variant) -> Result<()> {
        self.expect_kind(VariableKind::Scalar)?;
        self.with_data_mut(|data| {
            if self.definition.set(data, value) {
                Ok(())
            } else {
                Err(self.error(format!(
                    "cannot assign '{}' ({}) to {}",
                    value,
                    value.type_name(),
                    self.definition.type_name()
                )))
            }
        })
    }

    pub fn size(&self) -> Result<usize> {
        self.expect_kind(VariableKind::Array)?;
        self.with_data(|data| {
            self.definition
                .size(data)
                .ok_or_else(|| self.error("stored value does not match its definition"))
        })
    }

    pub fn child(&self, entry: &AddressEntry) -> Result<Variable> {
        match (self.kind(), entry) {
            (VariableKind::Struct, AddressEntry::Name(_)) | (VariableKind::Array, AddressEntry::Index(_)) => {}
            (VariableKind::Scalar, _) => {
                return Err(BindingError::kind(self.address.to_string(), "struct or array", "scalar"));
            }
            (VariableKind::Struct, AddressEntry::Index(_)) => {
                return Err(BindingError::kind(self.address.to_string(), "array", "struct"));
            }
            (VariableKind::Array, AddressEntry::Name(_)) => {
                return Err(BindingError::kind(self.address.to_string(), "struct", "array"));
            }
        }

        let (definition, accessor) = self.with_data(|data| {
            self.definition.child(data, entry).ok_or_else(|| match entry {
                AddressEntry::Name(name) => self.error(format!("no member named '{}'", name)),
                AddressEntry::Index(index) => self.error(format!(
                    "index {} is out of bounds for size {}",
                    index,
                    self.definition.size(data).unwrap_or(0)
                )),
            })
        })?;

        Ok(Variable {
            address: self.address.child(entry.clone()),
            definition,
            handle: self.handle.child(accessor),
        })
    }

    fn expect_kind(&self, expected: VariableKind) -> Result<()> {
        let found = self.kind();
        if found == expected {
            Ok(())
        } else {
            Err(BindingError::kind(self.address.to_string(), expected.to_string(), found.to_string()))
        }
    }

    fn error(&self, message: impl Into<String>) -> BindingError {
        BindingError::resolution(self.address.to_string(), message)
    }

    fn with_data<R>(&self, f: impl FnOnce(&dyn Any) -> Result<R>) -> Result<R> {
        let root = self.handle.root.upgrade().ok_or_else(|| self.error("bound data was dropped"))?;
        let borrowed = root
            .try_borrow()
            .map_err(|_| self.error("bound data is mutably borrowed"))?;

        let mut current: &dyn Any = &*borrowed;
        for accessor in &self.handle.path {
            current = (accessor.get)(current).ok_or_else(|| self.error("data changed shape since resolution"))?;
        }
        f(current)
    }

    fn with_data_mut<R>(&self, f: impl FnOnce(&mut dyn Any) -> Result<R>) -> Result<R> {
        let root = self.handle.root.upgrade().ok_or_else(|| self.error("bound data was dropped"))?;
        let mut borrowed = root
            .try_borrow_mut()
            .map_err(|_| self.error("bound data is already borrowed"))?;

        let mut current: &mut dyn Any = &mut *borrowed;
        for accessor in &self.handle.path {
            current = (accessor.get_mut)(current).ok_or_else(|| self.error("data changed shape since resolution"))?;
        }
        f(current)
    }
}

impl fmt::Debug for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Variable")
            .field("address", &self.address.to_string())
            .field("kind", &self.kind())
            .field("type", &self.definition.type_name())
            .field("handle", &self.handle)
            .finish()
    }
}
