//! Finds binding attributes in a document subtree and constructs the matching views and controllers

use crate::controller::{DataController, EventController, ValueController};
use crate::dom::{Document, ElementId, EventKind, TEXT_TAG};
use crate::error::{BindingError, Result};
use crate::model::DataStore;
use crate::view::{AttributeView, ClassView, DataView, ForView, IfView, RmlView, StyleView, TextView};
use regex::Regex;

/// Views and controllers created for one subtree
#[derive(Default)]
pub struct Bindings {
    pub views: Vec<Box<dyn DataView>>,
    pub controllers: Vec<Box<dyn DataController>>,
}

impl Bindings {
    pub fn len(&self) -> usize {
        self.views.len() + self.controllers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty() && self.controllers.is_empty()
    }
}

#[derive(Debug)]
pub struct Binder {
    directive_regex: Regex,
    default_alias: String,
}

impl Binder {
    pub fn new(default_alias: &str) -> Self {
        Self {
            directive_regex: Regex::new(r"^data-(attr|style|class|event)-(.+)$").unwrap(),
            default_alias: default_alias.to_string(),
        }
    }

    /// Walk `root` and its descendants. Malformed bindings are reported and skipped.
    pub fn bind_subtree(&self, store: &DataStore, document: &mut Document, root: ElementId) -> Bindings {
        let mut bindings = Bindings::default();
        self.bind_element(store, document, root, &mut bindings);
        bindings
    }

    fn bind_element(&self, store: &DataStore, document: &mut Document, element: ElementId, bindings: &mut Bindings) {
        let Some(tag) = document.tag(element).map(str::to_string) else {
            return;
        };

        if tag == TEXT_TAG {
            if document.text(element).map_or(false, |text| text.contains("{{")) {
                match TextView::new(store, document, element) {
                    Ok(view) => bindings.views.push(Box::new(view)),
                    Err(e) => report(&tag, "text", &e),
                }
            }
            return;
        }

        let attributes = document.attributes(element).cloned().unwrap_or_default();

        // The children of a repeated element are its template, not live content
        if let Some(binding) = attributes.get("data-for") {
            match ForView::new(store, document, element, binding, &self.default_alias) {
                Ok(view) => bindings.views.push(Box::new(view)),
                Err(e) => report(&tag, "data-for", &e),
            }
            return;
        }

        for (name, value) in attributes.iter().filter(|(name, _)| name.starts_with("data-")) {
            match self.bind_attribute(store, document, element, name, value) {
                Ok(Binding::View(view)) => bindings.views.push(view),
                Ok(Binding::Controller(controller)) => bindings.controllers.push(controller),
                Err(e) => report(&tag, name, &e),
            }
        }

        for child in document.children(element).to_vec() {
            self.bind_element(store, document, child, bindings);
        }
    }

    fn bind_attribute(
        &self,
        store: &DataStore,
        document: &Document,
        element: ElementId,
        name: &str,
        value: &str,
    ) -> Result<Binding> {
        match name {
            "data-if" => return Ok(Binding::view(IfView::new(store, document, element, value)?)),
            "data-rml" => return Ok(Binding::view(RmlView::new(store, document, element, value)?)),
            "data-value" => {
                return Ok(Binding::controller(ValueController::new(store, document, element, value)?));
            }
            _ => {}
        }

        let captures = self
            .directive_regex
            .captures(name)
            .ok_or_else(|| BindingError::binding(format!("unknown data attribute '{}'", name)))?;
        let argument = &captures[2];

        match &captures[1] {
            "attr" => Ok(Binding::view(AttributeView::new(store, document, element, argument, value)?)),
            "style" => Ok(Binding::view(StyleView::new(store, document, element, argument, value)?)),
            "class" => Ok(Binding::view(ClassView::new(store, document, element, argument, value)?)),
            _ => {
                let kind = EventKind::from_name(argument)
                    .ok_or_else(|| BindingError::binding(format!("unknown event kind '{}'", argument)))?;
                Ok(Binding::controller(EventController::new(store, document, element, kind, value)?))
            }
        }
    }
}

enum Binding {
    View(Box<dyn DataView>),
    Controller(Box<dyn DataController>),
}

impl Binding {
    fn view(view: impl DataView + 'static) -> Self {
        Binding::View(Box::new(view))
    }

    fn controller(controller: impl DataController + 'static) -> Self {
        Binding::Controller(Box::new(controller))
    }
}

fn report(tag: &str, attribute: &str, error: &BindingError) {
    log::warn!("Ignoring {} binding on <{}>: {}", attribute, tag, error);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::ElementTemplate;
    use crate::model::DataModel;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_binds_every_directive() {
        let mut store = DataStore::default();
        let flag = Rc::new(RefCell::new(true));
        store.bind_scalar("flag", &flag).unwrap();

        let mut document = Document::new();
        let template = ElementTemplate::element("div")
            .attribute("data-if", "flag")
            .attribute("data-attr-title", "flag")
            .attribute("data-style-color", "flag ? 'red' : 'blue'")
            .attribute("data-class-on", "flag")
            .attribute("data-event-click", "flag = !flag")
            .child(ElementTemplate::element("input").attribute("data-value", "flag"))
            .child(ElementTemplate::element("p").attribute("data-rml", "flag"))
            .child(ElementTemplate::text("Flag is {{ flag }}"))
            .child(ElementTemplate::text("plain text"));
        let root = document.instantiate(&template);
        document.append_child(document.root(), root).unwrap();

        let binder = Binder::new("it");
        let root = document.root();
        let bindings = binder.bind_subtree(&store, &mut document, root);
        let mut names: Vec<_> = bindings.views.iter().map(|v| v.name()).collect();
        names.sort_unstable();
        assert_eq!(names, vec!["attribute", "class", "if", "rml", "style", "text"]);
        assert_eq!(bindings.controllers.len(), 2);
    }

    #[test]
    fn test_malformed_bindings_are_skipped() {
        let store = DataStore::default();
        let mut document = Document::new();
        let template = ElementTemplate::element("div")
            .attribute("data-unknown", "x")
            .attribute("data-event-hover", "x = 1")
            .attribute("data-attr-title", "1 +")
            .attribute("data-if", "ok")
            .attribute("title", "plain");
        let root = document.instantiate(&template);
        document.append_child(document.root(), root).unwrap();

        let root = document.root();
        let bindings = Binder::new("it").bind_subtree(&store, &mut document, root);
        assert_eq!(bindings.len(), 1);
    }

    #[test]
    fn test_click_assignment_end_to_end() {
        let clicks = Rc::new(RefCell::new(0i32));
        let mut model = DataModel::new("counter");
        model.bind_scalar("clicks", &clicks).unwrap();

        let mut document = Document::new();
        let template = ElementTemplate::element("button")
            .attribute("data-event-click", "clicks = clicks + 1")
            .child(ElementTemplate::text("Clicked {{clicks}} times"));
        let button = document.instantiate(&template);
        document.append_child(document.root(), button).unwrap();

        assert_eq!(model.bind_document(&mut document), 2);
        model.update(&mut document);
        assert_eq!(document.inner_text(button), "Clicked 0 times");

        let click = crate::dom::Event::new(EventKind::Click, button);
        assert!(model.process_event(&mut document, &click));
        assert!(model.is_variable_dirty("clicks"));
        assert!(model.update(&mut document));
        assert_eq!(document.inner_text(button), "Clicked 1 times");
        assert_eq!(*clicks.borrow(), 1);

        model.clear(&mut document);
        assert!(!model.process_event(&mut document, &click));
        assert_eq!(model.views().len(), 0);
    }
}
