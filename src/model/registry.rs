//! Registration of host types with the data model
//!
//! Scalars are registered on first use. Structs and containers must be
//! registered explicitly before they can be bound or used as members:
//!
//! ```
//! use kryon_databind::model::TypeRegister;
//!
//! struct Invader {
//!     name: String,
//!     charge: f32,
//! }
//!
//! let mut types = TypeRegister::new();
//! let mut invader = types.register_struct::<Invader>().unwrap();
//! invader.register_member("name", |i: &Invader| &i.name, |i: &mut Invader| &mut i.name).unwrap();
//! invader.register_member("charge", |i: &Invader| &i.charge, |i: &mut Invader| &mut i.charge).unwrap();
//! types.register_array::<Vec<Invader>>().unwrap();
//! ```

use super::definition::{Accessor, ArrayDefinition, ScalarDefinition, StructDefinition, VariableDefinition};
use crate::error::{BindingError, Result};
use crate::variant::Variant;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// A host type that converts to and from a [`Variant`]
pub trait Scalar: Any {
    fn to_variant(&self) -> Variant;

    /// Returns false if the value cannot be represented
    fn assign_variant(&mut self, value: &Variant) -> bool;
}

impl Scalar for bool {
    fn to_variant(&self) -> Variant {
        Variant::Bool(*self)
    }

    fn assign_variant(&mut self, value: &Variant) -> bool {
        match value.to_bool() {
            Some(b) => {
                *self = b;
                true
            }
            None => false,
        }
    }
}

macro_rules! impl_integer_scalar {
    ($($ty:ty),*) => {
        $(
            impl Scalar for $ty {
                fn to_variant(&self) -> Variant {
                    match i64::try_from(*self) {
                        Ok(value) => Variant::Int(value),
                        Err(_) => Variant::Float(*self as f64),
                    }
                }

                fn assign_variant(&mut self, value: &Variant) -> bool {
                    match value.to_integer().and_then(|v| <$ty>::try_from(v).ok()) {
                        Some(v) => {
                            *self = v;
                            true
                        }
                        None => false,
                    }
                }
            }
        )*
    };
}

impl_integer_scalar!(i8, i16, i32, i64, u8, u16, u32, u64, usize);

impl Scalar for f32 {
    fn to_variant(&self) -> Variant {
        Variant::Float(f64::from(*self))
    }

    fn assign_variant(&mut self, value: &Variant) -> bool {
        match value.to_number() {
            Some(n) => {
                *self = n as f32;
                true
            }
            None => false,
        }
    }
}

impl Scalar for f64 {
    fn to_variant(&self) -> Variant {
        Variant::Float(*self)
    }

    fn assign_variant(&mut self, value: &Variant) -> bool {
        match value.to_number() {
            Some(n) => {
                *self = n;
                true
            }
            None => false,
        }
    }
}

impl Scalar for String {
    fn to_variant(&self) -> Variant {
        Variant::String(self.clone())
    }

    fn assign_variant(&mut self, value: &Variant) -> bool {
        *self = value.to_string();
        true
    }
}

impl Scalar for Variant {
    fn to_variant(&self) -> Variant {
        self.clone()
    }

    fn assign_variant(&mut self, value: &Variant) -> bool {
        *self = value.clone();
        true
    }
}

/// An indexable host container of items of one type
pub trait DataContainer: Any {
    type Item: Any;

    fn len(&self) -> usize;

    fn item(&self, index: usize) -> Option<&Self::Item>;

    fn item_mut(&mut self, index: usize) -> Option<&mut Self::Item>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Any> DataContainer for Vec<T> {
    type Item = T;

    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn item(&self, index: usize) -> Option<&T> {
        self.get(index)
    }

    fn item_mut(&mut self, index: usize) -> Option<&mut T> {
        self.get_mut(index)
    }
}

impl<T: Any, const N: usize> DataContainer for [T; N] {
    type Item = T;

    fn len(&self) -> usize {
        N
    }

    fn item(&self, index: usize) -> Option<&T> {
        self.get(index)
    }

    fn item_mut(&mut self, index: usize) -> Option<&mut T> {
        self.get_mut(index)
    }
}

/// Variable definitions keyed by host type identity
#[derive(Default)]
pub struct TypeRegister {
    definitions: HashMap<TypeId, Rc<dyn VariableDefinition>>,
}

impl TypeRegister {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get<T: Any>(&self) -> Option<Rc<dyn VariableDefinition>> {
        self.definitions.get(&TypeId::of::<T>()).cloned()
    }

    pub fn contains<T: Any>(&self) -> bool {
        self.definitions.contains_key(&TypeId::of::<T>())
    }

    pub fn get_or_add_scalar<T: Scalar>(&mut self) -> Rc<dyn VariableDefinition> {
        self.definitions
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Rc::new(ScalarDefinition::<T>::new()))
            .clone()
    }

    /// Register struct `T`; members are added through the returned handle
    pub fn register_struct<T: Any>(&mut self) -> Result<StructHandle<'_, T>> {
        self.ensure_unregistered::<T>()?;
        let definition = Rc::new(StructDefinition::<T>::new());
        self.definitions.insert(TypeId::of::<T>(), definition.clone());
        log::debug!("Registered struct type {}", std::any::type_name::<T>());
        Ok(StructHandle {
            register: self,
            definition,
        })
    }

    /// Register a container whose item type is already registered
    pub fn register_array<C: DataContainer>(&mut self) -> Result<()> {
        let element = self.get::<C::Item>().ok_or_else(|| {
            BindingError::registration(format!(
                "cannot register array {}, its item type {} is not registered",
                std::any::type_name::<C>(),
                std::any::type_name::<C::Item>()
            ))
        })?;
        self.insert_array::<C>(element)
    }

    /// Register a container of scalars, adding the scalar definition if needed
    pub fn register_scalar_array<C>(&mut self) -> Result<()>
    where
        C: DataContainer,
        C::Item: Scalar,
    {
        let element = self.get_or_add_scalar::<C::Item>();
        self.insert_array::<C>(element)
    }

    fn insert_array<C: DataContainer>(&mut self, element: Rc<dyn VariableDefinition>) -> Result<()> {
        self.ensure_unregistered::<C>()?;
        self.definitions
            .insert(TypeId::of::<C>(), Rc::new(ArrayDefinition::<C>::new(element)));
        log::debug!("Registered array type {}", std::any::type_name::<C>());
        Ok(())
    }

    fn ensure_unregistered<T: Any>(&self) -> Result<()> {
        if self.contains::<T>() {
            return Err(BindingError::registration(format!(
                "type {} is already registered",
                std::any::type_name::<T>()
            )));
        }
        Ok(())
    }
}

impl fmt::Debug for TypeRegister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.definitions.values().map(|d| d.type_name()).collect();
        names.sort_unstable();
        f.debug_struct("TypeRegister").field("types", &names).finish()
    }
}

/// Adds members to a registered struct definition
pub struct StructHandle<'a, T: Any> {
    register: &'a mut TypeRegister,
    definition: Rc<StructDefinition<T>>,
}

impl<'a, T: Any> StructHandle<'a, T> {
    /// Add a scalar member
    pub fn register_member<M: Scalar>(
        &mut self,
        name: &str,
        get: fn(&T) -> &M,
        get_mut: fn(&mut T) -> &mut M,
    ) -> Result<&mut Self> {
        let definition = self.register.get_or_add_scalar::<M>();
        self.add(name, definition, Accessor::member(get, get_mut))
    }

    /// Add a struct or array member whose type is already registered
    pub fn register_nested_member<M: Any>(
        &mut self,
        name: &str,
        get: fn(&T) -> &M,
        get_mut: fn(&mut T) -> &mut M,
    ) -> Result<&mut Self> {
        let definition = self.register.get::<M>().ok_or_else(|| {
            BindingError::registration(format!(
                "member '{}' of {} has unregistered type {}",
                name,
                std::any::type_name::<T>(),
                std::any::type_name::<M>()
            ))
        })?;
        self.add(name, definition, Accessor::member(get, get_mut))
    }

    pub fn member_names(&self) -> Vec<String> {
        self.definition.member_names()
    }

    fn add(&mut self, name: &str, definition: Rc<dyn VariableDefinition>, accessor: Accessor) -> Result<&mut Self> {
        if name.is_empty() || name.contains(['.', '[', ']']) {
            return Err(BindingError::registration(format!("'{}' is not a valid member name", name)));
        }
        if !self.definition.add_member(name, definition, accessor) {
            return Err(BindingError::registration(format!(
                "member '{}' is already registered on {}",
                name,
                std::any::type_name::<T>()
            )));
        }
        Ok(self)
    }
}
