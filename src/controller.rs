//! Controllers write user interaction back into the data model

use crate::dom::{Document, ElementId, Event, EventKind, ListenerId};
use crate::error::{BindingError, Result};
use crate::model::{BoundExpression, DataAddress, DataStore};
use crate::variant::Variant;
use std::collections::BTreeMap;

pub trait DataController {
    fn element(&self) -> ElementId;

    /// The event kind this controller listens for
    fn event_kind(&self) -> EventKind;

    /// Handle an event on the element. Returns true if a bound variable was written.
    fn process_event(&mut self, store: &mut DataStore, document: &Document, event: &Event) -> bool;
}

/// `data-value`: writes the element's value into a variable on change
pub struct ValueController {
    element: ElementId,
    address: DataAddress,
    last_value: Option<Variant>,
}

impl ValueController {
    pub fn new(store: &DataStore, document: &Document, element: ElementId, binding: &str) -> Result<Self> {
        if !document.contains(element) {
            return Err(BindingError::binding(format!("cannot attach a controller to missing element {}", element)));
        }
        let address = store.resolve_address(binding, element, document)?;
        store.get_variable(&address)?;
        Ok(Self {
            element,
            address,
            last_value: None,
        })
    }
}

impl DataController for ValueController {
    fn element(&self) -> ElementId {
        self.element
    }

    fn event_kind(&self) -> EventKind {
        EventKind::Change
    }

    fn process_event(&mut self, store: &mut DataStore, document: &Document, event: &Event) -> bool {
        let value = match event.parameter("value") {
            Some(value) => value.clone(),
            None => match document.attribute(self.element, "value") {
                Some(value) => Variant::from(value),
                None => return false,
            },
        };

        if self.last_value.as_ref() == Some(&value) {
            return false;
        }
        if store.set_value(&self.address, &value).is_err() {
            return false;
        }

        store.dirty_variable(self.address.root());
        self.last_value = Some(value);
        true
    }
}

/// `data-event-<kind>="target = expression"`: assigns the expression result on the event.
/// Without an assignment the expression only runs for its transforms.
pub struct EventController {
    element: ElementId,
    kind: EventKind,
    target: Option<DataAddress>,
    expression: BoundExpression,
}

impl EventController {
    pub fn new(store: &DataStore, document: &Document, element: ElementId, kind: EventKind, binding: &str) -> Result<Self> {
        if !document.contains(element) {
            return Err(BindingError::binding(format!("cannot attach a controller to missing element {}", element)));
        }

        let (target, source) = match split_assignment(binding) {
            Some((target, source)) => {
                if target.is_empty() || source.is_empty() {
                    return Err(BindingError::binding(format!("invalid assignment '{}'", binding)));
                }
                let address = store.resolve_address(target, element, document)?;
                store.get_variable(&address)?;
                (Some(address), source)
            }
            None => (None, binding.trim()),
        };

        Ok(Self {
            element,
            kind,
            target,
            expression: BoundExpression::new(source, element, store, document)?,
        })
    }
}

impl DataController for EventController {
    fn element(&self) -> ElementId {
        self.element
    }

    fn event_kind(&self) -> EventKind {
        self.kind
    }

    fn process_event(&mut self, store: &mut DataStore, _document: &Document, _event: &Event) -> bool {
        let Ok(value) = self.expression.run(store) else {
            return false;
        };
        let Some(target) = &self.target else {
            return false;
        };
        if store.set_value(target, &value).is_err() {
            return false;
        }
        store.dirty_variable(target.root());
        true
    }
}

/// Split `target = expression` at the first top-level `=` that is not part of a comparison
fn split_assignment(binding: &str) -> Option<(&str, &str)> {
    let bytes = binding.as_bytes();
    let mut in_string = false;
    let mut escaped = false;

    for (i, &byte) in bytes.iter().enumerate() {
        if in_string {
            match byte {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'\'' => in_string = false,
                _ => {}
            }
            continue;
        }
        match byte {
            b'\'' => in_string = true,
            b'=' => {
                let previous = if i > 0 { bytes[i - 1] } else { b' ' };
                let next = bytes.get(i + 1).copied().unwrap_or(b' ');
                if !matches!(previous, b'=' | b'!' | b'<' | b'>') && next != b'=' {
                    return Some((binding[..i].trim(), binding[i + 1..].trim()));
                }
            }
            _ => {}
        }
    }
    None
}

/// Live controllers keyed by the listener id registered on their element
#[derive(Default)]
pub struct DataControllers {
    controllers: BTreeMap<ListenerId, Box<dyn DataController>>,
    next_id: u64,
}

impl DataControllers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.controllers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controllers.is_empty()
    }

    pub fn add(&mut self, controller: Box<dyn DataController>, document: &mut Document) -> Result<ListenerId> {
        let id = ListenerId(self.next_id);
        document.add_event_listener(controller.element(), controller.event_kind(), id)?;
        self.next_id += 1;
        self.controllers.insert(id, controller);
        Ok(id)
    }

    pub fn process_event(&mut self, store: &mut DataStore, document: &Document, event: &Event) -> bool {
        let mut changed = false;
        for id in document.listeners(event.target, event.kind) {
            if let Some(controller) = self.controllers.get_mut(&id) {
                changed |= controller.process_event(store, document, event);
            }
        }
        changed
    }

    /// Drop controllers whose element no longer exists
    pub fn remove_dead(&mut self, document: &Document) {
        self.controllers.retain(|_, controller| document.contains(controller.element()));
    }

    /// Unregister every listener and drop all controllers
    pub fn clear(&mut self, document: &mut Document) {
        for (id, controller) in std::mem::take(&mut self.controllers) {
            document.remove_event_listener(controller.element(), controller.event_kind(), id);
        }
    }
}

impl std::fmt::Debug for DataControllers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataControllers")
            .field("controllers", &self.controllers.len())
            .finish()
    }
}
