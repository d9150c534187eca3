use super::{DataView, ViewBase, ViewContext};
use crate::dom::{Document, ElementId, ElementTemplate};
use crate::error::{BindingError, Result};
use crate::model::{AddressEntry, DataAddress, DataStore};
use std::collections::BTreeMap;

pub const FOR_ATTRIBUTE: &str = "data-for";

/// `data-for="[alias:]array"`: one clone of the element per array item
///
/// The bound element stays in the document as a hidden anchor. Clones are
/// inserted before it and matched to array items by position, so shrinking the
/// array always removes clones from the end.
pub struct ForView {
    base: ViewBase,
    alias: String,
    address: DataAddress,
    tag: String,
    attributes: BTreeMap<String, String>,
    contents: Vec<ElementTemplate>,
    elements: Vec<ElementId>,
}

impl ForView {
    /// Captures the element's children as the per-item template and removes them from the document
    pub fn new(
        store: &DataStore,
        document: &mut Document,
        element: ElementId,
        binding: &str,
        default_alias: &str,
    ) -> Result<Self> {
        let base = ViewBase::new(document, element)?;

        let parts: Vec<&str> = binding.split(':').map(str::trim).collect();
        let (alias, array) = match parts.as_slice() {
            [array] if !array.is_empty() => (default_alias, *array),
            [alias, array] if !alias.is_empty() && !array.is_empty() => (*alias, *array),
            _ => {
                return Err(BindingError::binding(format!("invalid syntax in {} '{}'", FOR_ATTRIBUTE, binding)));
            }
        };
        let address = store.resolve_address(array, element, document)?;

        let tag = document.tag(element).unwrap_or_default().to_string();
        let mut attributes = document.attributes(element).cloned().unwrap_or_default();
        attributes.remove(FOR_ATTRIBUTE);

        let children = document.children(element).to_vec();
        let contents = children.iter().filter_map(|child| document.snapshot(*child)).collect();
        for child in children {
            document.remove_child(element, child)?;
        }
        document.set_property(element, "display", "none")?;

        Ok(Self {
            base,
            alias: alias.to_string(),
            address,
            tag,
            attributes,
            contents,
            elements: Vec::new(),
        })
    }

    fn template(&self) -> ElementTemplate {
        ElementTemplate {
            tag: self.tag.clone(),
            attributes: self.attributes.clone(),
            text: None,
            children: self.contents.clone(),
        }
    }
}

impl DataView for ForView {
    fn name(&self) -> &'static str {
        "for"
    }

    fn base(&self) -> &ViewBase {
        &self.base
    }

    fn update(&mut self, context: &mut ViewContext<'_>) -> bool {
        let size = match context.store.get_variable(&self.address).and_then(|v| v.size()) {
            Ok(size) => size,
            Err(e) => {
                log::warn!("{}", e);
                return false;
            }
        };
        let anchor = self.base.element();
        let Some(parent) = context.document.parent(anchor) else {
            return false;
        };

        let num_elements = self.elements.len();
        let mut changed = false;

        if size > num_elements {
            let template = self.template();
            for index in num_elements..size {
                let clone = context.document.instantiate(&template);
                context
                    .store
                    .insert_alias(clone, &self.alias, self.address.child(AddressEntry::Index(index)));

                if let Err(e) = context.document.insert_before(parent, clone, anchor) {
                    log::warn!("Could not insert repeated element: {}", e);
                    context.store.erase_aliases(clone);
                    break;
                }
                self.elements.push(clone);
                context.bind_subtree(clone);
                changed = true;
            }
        }

        if size < num_elements {
            for element in self.elements.drain(size..) {
                context.store.erase_aliases(element);
                if let Some(parent) = context.document.parent(element) {
                    if context.document.remove_child(parent, element).is_ok() {
                        changed = true;
                    }
                }
            }
        }

        changed
    }

    fn variable_names(&self) -> Vec<String> {
        vec![self.address.root().to_string()]
    }
}

#[cfg(test)]
mod tests {
    use crate::dom::{Document, ElementTemplate};
    use crate::model::{parse_address, DataModel};
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Item {
        name: String,
    }

    fn setup(binding: &str, names: &[&str]) -> (DataModel, Document, Rc<RefCell<Vec<Item>>>) {
        let mut model = DataModel::new("test");
        model
            .types_mut()
            .register_struct::<Item>()
            .unwrap()
            .register_member("name", |i: &Item| &i.name, |i: &mut Item| &mut i.name)
            .unwrap();
        model.types_mut().register_array::<Vec<Item>>().unwrap();

        let list = Rc::new(RefCell::new(
            names.iter().map(|n| Item { name: n.to_string() }).collect::<Vec<_>>(),
        ));
        model.bind("list", &list).unwrap();

        let mut document = Document::new();
        let template = ElementTemplate::element("li")
            .attribute("data-for", binding)
            .attribute("class", "entry")
            .child(ElementTemplate::text("{{item.name}}"));
        let anchor = document.instantiate(&template);
        let ul = document.create_element("ul");
        document.append_child(document.root(), ul).unwrap();
        document.append_child(ul, anchor).unwrap();

        model.bind_document(&mut document);
        (model, document, list)
    }

    fn clones(document: &Document) -> Vec<crate::dom::ElementId> {
        let ul = document.children(document.root())[0];
        document
            .children(ul)
            .iter()
            .copied()
            .filter(|id| document.attribute(*id, "data-for").is_none())
            .collect()
    }

    #[test]
    fn test_grow_and_shrink_by_position() {
        let (mut model, mut document, list) = setup("item:list", &["a", "b", "c"]);
        model.update(&mut document);

        let initial = clones(&document);
        assert_eq!(initial.len(), 3);
        for (index, clone) in initial.iter().enumerate() {
            assert_eq!(document.attribute(*clone, "class"), Some("entry"));
            let expected = parse_address(&format!("list[{}]", index)).unwrap();
            assert_eq!(model.store().alias(*clone, "item"), Some(&expected));
        }
        let ul = document.children(document.root())[0];
        assert_eq!(document.inner_text(ul), "abc");

        list.borrow_mut().truncate(1);
        model.dirty_variable("list");
        model.update(&mut document);

        let remaining = clones(&document);
        assert_eq!(remaining, vec![initial[0]]);
        assert!(!document.contains(initial[1]) && !document.contains(initial[2]));
        assert!(model.store().alias(initial[1], "item").is_none());
        assert!(model.store().alias(initial[2], "item").is_none());

        list.borrow_mut().push(Item { name: "z".to_string() });
        model.dirty_variable("list");
        model.update(&mut document);

        let grown = clones(&document);
        assert_eq!(grown.len(), 2);
        assert_eq!(grown[0], initial[0]);
        assert_eq!(document.inner_text(ul), "az");
    }

    #[test]
    fn test_anchor_is_hidden_and_emptied() {
        let (mut model, mut document, _list) = setup("list", &["a"]);
        let ul = document.children(document.root())[0];
        let anchor = *document.children(ul).last().unwrap();
        assert_eq!(document.property(anchor, "display"), Some("none"));
        assert!(document.children(anchor).is_empty());

        // Default alias is "it", so "item" does not resolve to anything in the clones
        model.update(&mut document);
        let clone = clones(&document)[0];
        assert!(model.store().alias(clone, "it").is_some());
    }

    #[test]
    fn test_invalid_bindings() {
        for binding in ["", "a:b:c", ":list", "item:", "item:list[x]"] {
            let (model, _document, _list) = setup(binding, &[]);
            assert_eq!(model.views().pending(), 0, "expected no view for {:?}", binding);
        }
    }
}
