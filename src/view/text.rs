use super::{evaluate, DataView, ViewBase, ViewContext};
use crate::dom::{Document, ElementId};
use crate::error::{BindingError, Result};
use crate::model::{BoundExpression, DataStore};

enum Fragment {
    Literal(String),
    Binding(usize),
}

struct Entry {
    expression: BoundExpression,
    value: Option<String>,
}

/// Interpolates `{{ expression }}` markers in a text element
pub struct TextView {
    base: ViewBase,
    fragments: Vec<Fragment>,
    entries: Vec<Entry>,
}

impl TextView {
    pub fn new(store: &DataStore, document: &Document, element: ElementId) -> Result<Self> {
        let base = ViewBase::new(document, element)?;
        let source = document
            .text(element)
            .ok_or_else(|| BindingError::binding(format!("element {} has no text to interpolate", element)))?;

        let mut fragments = Vec::new();
        let mut entries = Vec::new();
        let mut rest = source;

        while let Some(begin) = rest.find("{{") {
            if begin > 0 {
                fragments.push(Fragment::Literal(rest[..begin].to_string()));
            }
            let inner = &rest[begin + 2..];
            let end = inner
                .find("}}")
                .ok_or_else(|| BindingError::binding(format!("unterminated '{{{{' in text '{}'", source)))?;

            let expression = BoundExpression::new(inner[..end].trim(), element, store, document)?;
            fragments.push(Fragment::Binding(entries.len()));
            entries.push(Entry {
                expression,
                value: None,
            });

            rest = &inner[end + 2..];
        }

        if entries.is_empty() {
            return Err(BindingError::binding(format!("no '{{{{ }}}}' markers in text '{}'", source)));
        }
        if !rest.is_empty() {
            fragments.push(Fragment::Literal(rest.to_string()));
        }

        Ok(Self {
            base,
            fragments,
            entries,
        })
    }

    fn build_text(&self) -> String {
        let mut text = String::new();
        for fragment in &self.fragments {
            match fragment {
                Fragment::Literal(literal) => text.push_str(literal),
                Fragment::Binding(index) => {
                    if let Some(value) = self.entries.get(*index).and_then(|entry| entry.value.as_deref()) {
                        text.push_str(value);
                    }
                }
            }
        }
        text
    }
}

impl DataView for TextView {
    fn name(&self) -> &'static str {
        "text"
    }

    fn base(&self) -> &ViewBase {
        &self.base
    }

    fn update(&mut self, context: &mut ViewContext<'_>) -> bool {
        let mut modified = false;

        for entry in &mut self.entries {
            if let Some(value) = evaluate(&entry.expression, context.store) {
                let value = value.to_string();
                if entry.value.as_deref() != Some(value.as_str()) {
                    entry.value = Some(value);
                    modified = true;
                }
            }
        }

        if modified {
            let text = self.build_text();
            if context.document.set_text(self.base.element(), &text).is_err() {
                return false;
            }
        }

        modified
    }

    fn variable_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .entries
            .iter()
            .flat_map(|entry| entry.expression.dependencies())
            .collect();
        names.sort();
        names.dedup();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binder::Binder;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn text_element(document: &mut Document, text: &str) -> ElementId {
        let element = document.create_text(text);
        document.append_child(document.root(), element).unwrap();
        element
    }

    #[test]
    fn test_interpolation_and_change_detection() {
        let mut store = DataStore::default();
        let score = Rc::new(RefCell::new(42i32));
        store.bind_scalar("score", &score).unwrap();

        let mut document = Document::new();
        let element = text_element(&mut document, "Score: {{score}}");
        let mut view = TextView::new(&store, &document, element).unwrap();
        assert_eq!(view.variable_names(), vec!["score".to_string()]);

        let binder = Binder::new("it");
        let mut context = ViewContext::new(&mut store, &mut document, &binder);
        assert!(view.update(&mut context));
        assert_eq!(context.document.text(element), Some("Score: 42"));

        // Unchanged value: no change reported and the text is left untouched
        context.document.set_text(element, "sentinel").unwrap();
        assert!(!view.update(&mut context));
        assert_eq!(context.document.text(element), Some("sentinel"));
    }

    #[test]
    fn test_multiple_markers() {
        let mut store = DataStore::default();
        let a = Rc::new(RefCell::new(String::from("x")));
        let b = Rc::new(RefCell::new(2i32));
        store.bind_scalar("a", &a).unwrap();
        store.bind_scalar("b", &b).unwrap();

        let mut document = Document::new();
        let element = text_element(&mut document, "[{{ a }}|{{ b * 2 }}] {{a | to_upper}}");
        let mut view = TextView::new(&store, &document, element).unwrap();
        assert_eq!(view.variable_names(), vec!["a".to_string(), "b".to_string()]);

        let binder = Binder::new("it");
        let mut context = ViewContext::new(&mut store, &mut document, &binder);
        view.update(&mut context);
        assert_eq!(context.document.text(element), Some("[x|4] X"));
    }

    #[test]
    fn test_invalid_text_bindings() {
        let store = DataStore::default();
        let mut document = Document::new();
        for text in ["no markers", "open {{ score", "bad {{ 1 + }}"] {
            let element = text_element(&mut document, text);
            assert!(TextView::new(&store, &document, element).is_err(), "expected error for {:?}", text);
        }
    }
}
