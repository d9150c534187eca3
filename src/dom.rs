//! In-memory document tree the bindings operate on
//!
//! Elements live in an arena and are referred to by [`ElementId`], a
//! generation-checked index. An id stays cheap to copy and never keeps its
//! element alive: once the element is removed the slot's generation moves on
//! and every lookup through the old id reports absence.

use crate::error::{BindingError, Result};
use crate::variant::Variant;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

pub const TEXT_TAG: &str = "#text";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId {
    index: u32,
    generation: u32,
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Change,
    Click,
    DoubleClick,
    MouseDown,
    MouseUp,
    MouseOver,
    MouseOut,
    Focus,
    Blur,
    KeyDown,
    KeyUp,
    Submit,
}

impl EventKind {
    pub fn from_name(name: &str) -> Option<Self> {
        let kind = match name {
            "change" => EventKind::Change,
            "click" => EventKind::Click,
            "dblclick" => EventKind::DoubleClick,
            "mousedown" => EventKind::MouseDown,
            "mouseup" => EventKind::MouseUp,
            "mouseover" => EventKind::MouseOver,
            "mouseout" => EventKind::MouseOut,
            "focus" => EventKind::Focus,
            "blur" => EventKind::Blur,
            "keydown" => EventKind::KeyDown,
            "keyup" => EventKind::KeyUp,
            "submit" => EventKind::Submit,
            _ => return None,
        };
        Some(kind)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub u64);

#[derive(Debug, Clone)]
pub struct Event {
    pub kind: EventKind,
    pub target: ElementId,
    pub parameters: HashMap<String, Variant>,
}

impl Event {
    pub fn new(kind: EventKind, target: ElementId) -> Self {
        Self {
            kind,
            target,
            parameters: HashMap::new(),
        }
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<Variant>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    pub fn parameter(&self, name: &str) -> Option<&Variant> {
        self.parameters.get(name)
    }
}

/// Detached description of an element subtree, used to build and clone markup
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ElementTemplate {
    pub tag: String,
    pub attributes: BTreeMap<String, String>,
    pub text: Option<String>,
    pub children: Vec<ElementTemplate>,
}

impl ElementTemplate {
    pub fn element(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Default::default()
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self {
            tag: TEXT_TAG.to_string(),
            text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn child(mut self, child: ElementTemplate) -> Self {
        self.children.push(child);
        self
    }
}

#[derive(Debug, Clone, Default)]
struct Element {
    tag: String,
    attributes: BTreeMap<String, String>,
    properties: BTreeMap<String, String>,
    text: Option<String>,
    parent: Option<ElementId>,
    children: Vec<ElementId>,
    listeners: Vec<(EventKind, ListenerId)>,
}

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    element: Option<Element>,
}

#[derive(Debug)]
pub struct Document {
    slots: Vec<Slot>,
    free: Vec<u32>,
    root: ElementId,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        let mut document = Self {
            slots: Vec::new(),
            free: Vec::new(),
            root: ElementId { index: 0, generation: 0 },
        };
        document.root = document.allocate(Element {
            tag: "body".to_string(),
            ..Default::default()
        });
        document
    }

    pub fn root(&self) -> ElementId {
        self.root
    }

    /// Number of live elements, including the root
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.element.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: ElementId) -> bool {
        self.get(id).is_some()
    }

    pub fn create_element(&mut self, tag: &str) -> ElementId {
        self.allocate(Element {
            tag: tag.to_string(),
            ..Default::default()
        })
    }

    pub fn create_text(&mut self, text: &str) -> ElementId {
        self.allocate(Element {
            tag: TEXT_TAG.to_string(),
            text: Some(text.to_string()),
            ..Default::default()
        })
    }

    pub fn append_child(&mut self, parent: ElementId, child: ElementId) -> Result<()> {
        self.attach(parent, child, None)
    }

    pub fn insert_before(&mut self, parent: ElementId, child: ElementId, reference: ElementId) -> Result<()> {
        self.attach(parent, child, Some(reference))
    }

    /// Detach `child` from `parent` and destroy it together with its descendants
    pub fn remove_child(&mut self, parent: ElementId, child: ElementId) -> Result<()> {
        if self.parent(child) != Some(parent) {
            return Err(BindingError::binding(format!("{} is not a child of {}", child, parent)));
        }
        self.detach(child);
        self.destroy(child);
        Ok(())
    }

    pub fn parent(&self, id: ElementId) -> Option<ElementId> {
        self.get(id).and_then(|element| element.parent)
    }

    pub fn children(&self, id: ElementId) -> &[ElementId] {
        self.get(id).map(|element| element.children.as_slice()).unwrap_or(&[])
    }

    pub fn tag(&self, id: ElementId) -> Option<&str> {
        self.get(id).map(|element| element.tag.as_str())
    }

    /// Number of ancestors
    pub fn depth(&self, id: ElementId) -> Option<usize> {
        self.get(id)?;
        let mut depth = 0;
        let mut current = self.parent(id);
        while let Some(parent) = current {
            depth += 1;
            current = self.parent(parent);
        }
        Some(depth)
    }

    /// The element itself followed by its ancestors, nearest first
    pub fn ancestors(&self, id: ElementId) -> impl Iterator<Item = ElementId> + '_ {
        std::iter::successors(self.get(id).map(|_| id), move |current| self.parent(*current))
    }

    pub fn attribute(&self, id: ElementId, name: &str) -> Option<&str> {
        self.get(id)?.attributes.get(name).map(String::as_str)
    }

    pub fn attributes(&self, id: ElementId) -> Option<&BTreeMap<String, String>> {
        self.get(id).map(|element| &element.attributes)
    }

    pub fn set_attribute(&mut self, id: ElementId, name: &str, value: &str) -> Result<()> {
        self.get_mut(id)?.attributes.insert(name.to_string(), value.to_string());
        Ok(())
    }

    pub fn remove_attribute(&mut self, id: ElementId, name: &str) -> Result<Option<String>> {
        Ok(self.get_mut(id)?.attributes.remove(name))
    }

    pub fn property(&self, id: ElementId, name: &str) -> Option<&str> {
        self.get(id)?.properties.get(name).map(String::as_str)
    }

    pub fn set_property(&mut self, id: ElementId, name: &str, value: &str) -> Result<()> {
        self.get_mut(id)?.properties.insert(name.to_string(), value.to_string());
        Ok(())
    }

    pub fn remove_property(&mut self, id: ElementId, name: &str) -> Result<Option<String>> {
        Ok(self.get_mut(id)?.properties.remove(name))
    }

    pub fn text(&self, id: ElementId) -> Option<&str> {
        self.get(id)?.text.as_deref()
    }

    pub fn set_text(&mut self, id: ElementId, text: &str) -> Result<()> {
        self.get_mut(id)?.text = Some(text.to_string());
        Ok(())
    }

    /// Concatenated text of the element and all its descendants
    pub fn inner_text(&self, id: ElementId) -> String {
        let mut result = String::new();
        self.collect_text(id, &mut result);
        result
    }

    /// Replace all children with a single text node holding `content`
    pub fn set_inner_rml(&mut self, id: ElementId, content: &str) -> Result<()> {
        let children = self.get(id).map(|element| element.children.clone()).ok_or_else(|| missing(id))?;
        for child in children {
            self.remove_child(id, child)?;
        }
        let text = self.create_text(content);
        self.append_child(id, text)
    }

    pub fn add_event_listener(&mut self, id: ElementId, kind: EventKind, listener: ListenerId) -> Result<()> {
        let element = self.get_mut(id)?;
        if !element.listeners.contains(&(kind, listener)) {
            element.listeners.push((kind, listener));
        }
        Ok(())
    }

    pub fn remove_event_listener(&mut self, id: ElementId, kind: EventKind, listener: ListenerId) {
        if let Ok(element) = self.get_mut(id) {
            element.listeners.retain(|entry| *entry != (kind, listener));
        }
    }

    pub fn listeners(&self, id: ElementId, kind: EventKind) -> Vec<ListenerId> {
        self.get(id)
            .map(|element| {
                element
                    .listeners
                    .iter()
                    .filter(|(k, _)| *k == kind)
                    .map(|(_, listener)| *listener)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Capture an element subtree as a template
    pub fn snapshot(&self, id: ElementId) -> Option<ElementTemplate> {
        let element = self.get(id)?;
        Some(ElementTemplate {
            tag: element.tag.clone(),
            attributes: element.attributes.clone(),
            text: element.text.clone(),
            children: element.children.iter().filter_map(|child| self.snapshot(*child)).collect(),
        })
    }

    /// Build a detached subtree from a template
    pub fn instantiate(&mut self, template: &ElementTemplate) -> ElementId {
        let id = self.allocate(Element {
            tag: template.tag.clone(),
            attributes: template.attributes.clone(),
            text: template.text.clone(),
            ..Default::default()
        });
        for child_template in &template.children {
            let child = self.instantiate(child_template);
            if let Some(element) = self.slot_element_mut(id) {
                element.children.push(child);
            }
            if let Some(element) = self.slot_element_mut(child) {
                element.parent = Some(id);
            }
        }
        id
    }

    fn get(&self, id: ElementId) -> Option<&Element> {
        let slot = self.slots.get(id.index as usize)?;
        if slot.generation == id.generation {
            slot.element.as_ref()
        } else {
            None
        }
    }

    fn get_mut(&mut self, id: ElementId) -> Result<&mut Element> {
        self.slot_element_mut(id).ok_or_else(|| missing(id))
    }

    fn slot_element_mut(&mut self, id: ElementId) -> Option<&mut Element> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation == id.generation {
            slot.element.as_mut()
        } else {
            None
        }
    }

    fn allocate(&mut self, element: Element) -> ElementId {
        match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.element = Some(element);
                ElementId {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    element: Some(element),
                });
                ElementId { index, generation: 0 }
            }
        }
    }

    fn attach(&mut self, parent: ElementId, child: ElementId, reference: Option<ElementId>) -> Result<()> {
        for id in [parent, child] {
            if !self.contains(id) {
                return Err(missing(id));
            }
        }
        if self.ancestors(parent).any(|ancestor| ancestor == child) {
            return Err(BindingError::binding(format!(
                "cannot insert {} into its own descendant {}",
                child, parent
            )));
        }
        if let Some(reference) = reference {
            if reference == child || self.parent(reference) != Some(parent) {
                return Err(BindingError::binding(format!("{} is not a child of {}", reference, parent)));
            }
        }

        self.detach(child);

        // Looked up after detaching, the child may have been an earlier sibling
        let position = reference.and_then(|reference| self.children(parent).iter().position(|c| *c == reference));

        let parent_element = self.get_mut(parent)?;
        match position {
            Some(position) => parent_element.children.insert(position, child),
            None => parent_element.children.push(child),
        }
        self.get_mut(child)?.parent = Some(parent);
        Ok(())
    }

    fn detach(&mut self, child: ElementId) {
        if let Some(parent) = self.parent(child) {
            if let Some(element) = self.slot_element_mut(parent) {
                element.children.retain(|c| *c != child);
            }
        }
        if let Some(element) = self.slot_element_mut(child) {
            element.parent = None;
        }
    }

    fn destroy(&mut self, id: ElementId) {
        let children = match self.get(id) {
            Some(element) => element.children.clone(),
            None => return,
        };
        for child in children {
            self.destroy(child);
        }
        let slot = &mut self.slots[id.index as usize];
        slot.element = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
    }

    fn collect_text(&self, id: ElementId, result: &mut String) {
        if let Some(element) = self.get(id) {
            if let Some(text) = &element.text {
                result.push_str(text);
            }
            for child in &element.children {
                self.collect_text(*child, result);
            }
        }
    }
}

fn missing(id: ElementId) -> BindingError {
    BindingError::binding(format!("element {} no longer exists", id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_operations() {
        let mut document = Document::new();
        let root = document.root();
        let list = document.create_element("ul");
        let first = document.create_element("li");
        let second = document.create_element("li");

        document.append_child(root, list).unwrap();
        document.append_child(list, second).unwrap();
        document.insert_before(list, first, second).unwrap();

        assert_eq!(document.children(list), &[first, second]);
        assert_eq!(document.parent(first), Some(list));
        assert_eq!(document.depth(first), Some(2));
        assert_eq!(document.depth(root), Some(0));
        assert!(document.append_child(first, list).is_err());
    }

    #[test]
    fn test_removed_ids_become_stale() {
        let mut document = Document::new();
        let root = document.root();
        let parent = document.create_element("div");
        let child = document.create_text("hello");
        document.append_child(root, parent).unwrap();
        document.append_child(parent, child).unwrap();

        document.remove_child(root, parent).unwrap();
        assert!(!document.contains(parent));
        assert!(!document.contains(child));
        assert!(document.set_attribute(child, "a", "b").is_err());

        // Slot reuse must not revive the old id
        let reused = document.create_element("span");
        assert!(document.contains(reused));
        assert!(!document.contains(parent) && !document.contains(child));
    }

    #[test]
    fn test_snapshot_and_instantiate() {
        let mut document = Document::new();
        let template = ElementTemplate::element("div")
            .attribute("class", "row")
            .child(ElementTemplate::text("value"));
        let id = document.instantiate(&template);
        assert_eq!(document.snapshot(id), Some(template));
        assert_eq!(document.inner_text(id), "value");
        assert_eq!(document.parent(id), None);
    }

    #[test]
    fn test_listeners() {
        let mut document = Document::new();
        let button = document.create_element("button");
        document.add_event_listener(button, EventKind::Click, ListenerId(3)).unwrap();
        document.add_event_listener(button, EventKind::Click, ListenerId(3)).unwrap();
        assert_eq!(document.listeners(button, EventKind::Click), vec![ListenerId(3)]);
        assert!(document.listeners(button, EventKind::Change).is_empty());
        document.remove_event_listener(button, EventKind::Click, ListenerId(3));
        assert!(document.listeners(button, EventKind::Click).is_empty());
    }

    #[test]
    fn test_inner_rml_replaces_children() {
        let mut document = Document::new();
        let div = document.create_element("div");
        let old = document.create_text("old");
        document.append_child(div, old).unwrap();
        document.set_inner_rml(div, "new").unwrap();
        assert!(!document.contains(old));
        assert_eq!(document.inner_text(div), "new");
    }
}
