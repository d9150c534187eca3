//! Views that write a single expression result onto their element

use super::{evaluate, DataView, ViewBase, ViewContext};
use crate::dom::{Document, ElementId};
use crate::error::{BindingError, Result};
use crate::model::{BoundExpression, DataStore};

const DISPLAY_PROPERTY: &str = "display";

fn require_name(kind: &str, name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(BindingError::binding(format!("{} binding requires a name", kind)));
    }
    Ok(())
}

/// `data-attr-<name>`: sets an attribute to the stringified value
pub struct AttributeView {
    base: ViewBase,
    attribute: String,
    expression: BoundExpression,
}

impl AttributeView {
    pub fn new(store: &DataStore, document: &Document, element: ElementId, attribute: &str, binding: &str) -> Result<Self> {
        require_name("attribute", attribute)?;
        Ok(Self {
            base: ViewBase::new(document, element)?,
            attribute: attribute.to_string(),
            expression: BoundExpression::new(binding, element, store, document)?,
        })
    }
}

impl DataView for AttributeView {
    fn name(&self) -> &'static str {
        "attribute"
    }

    fn base(&self) -> &ViewBase {
        &self.base
    }

    fn update(&mut self, context: &mut ViewContext<'_>) -> bool {
        let Some(value) = evaluate(&self.expression, context.store) else {
            return false;
        };
        let value = value.to_string();
        let element = self.base.element();

        if context.document.attribute(element, &self.attribute) == Some(value.as_str()) {
            return false;
        }
        context.document.set_attribute(element, &self.attribute, &value).is_ok()
    }

    fn variable_names(&self) -> Vec<String> {
        self.expression.dependencies()
    }
}

/// `data-style-<property>`: sets a local style property
pub struct StyleView {
    base: ViewBase,
    property: String,
    expression: BoundExpression,
}

impl StyleView {
    pub fn new(store: &DataStore, document: &Document, element: ElementId, property: &str, binding: &str) -> Result<Self> {
        require_name("style", property)?;
        Ok(Self {
            base: ViewBase::new(document, element)?,
            property: property.to_string(),
            expression: BoundExpression::new(binding, element, store, document)?,
        })
    }
}

impl DataView for StyleView {
    fn name(&self) -> &'static str {
        "style"
    }

    fn base(&self) -> &ViewBase {
        &self.base
    }

    fn update(&mut self, context: &mut ViewContext<'_>) -> bool {
        let Some(value) = evaluate(&self.expression, context.store) else {
            return false;
        };
        let value = value.to_string();
        let element = self.base.element();

        if context.document.property(element, &self.property) == Some(value.as_str()) {
            return false;
        }
        context.document.set_property(element, &self.property, &value).is_ok()
    }

    fn variable_names(&self) -> Vec<String> {
        self.expression.dependencies()
    }
}

/// `data-class-<name>`: adds or removes a class depending on the value's truth
pub struct ClassView {
    base: ViewBase,
    class_name: String,
    expression: BoundExpression,
}

impl ClassView {
    pub fn new(store: &DataStore, document: &Document, element: ElementId, class_name: &str, binding: &str) -> Result<Self> {
        require_name("class", class_name)?;
        if class_name.contains(char::is_whitespace) {
            return Err(BindingError::binding(format!("'{}' is not a valid class name", class_name)));
        }
        Ok(Self {
            base: ViewBase::new(document, element)?,
            class_name: class_name.to_string(),
            expression: BoundExpression::new(binding, element, store, document)?,
        })
    }
}

impl DataView for ClassView {
    fn name(&self) -> &'static str {
        "class"
    }

    fn base(&self) -> &ViewBase {
        &self.base
    }

    fn update(&mut self, context: &mut ViewContext<'_>) -> bool {
        let Some(value) = evaluate(&self.expression, context.store) else {
            return false;
        };
        let activate = value.as_bool();
        let element = self.base.element();

        let mut classes: Vec<String> = context
            .document
            .attribute(element, "class")
            .unwrap_or_default()
            .split_whitespace()
            .map(str::to_string)
            .collect();
        let active = classes.iter().any(|c| *c == self.class_name);
        if active == activate {
            return false;
        }

        if activate {
            classes.push(self.class_name.clone());
        } else {
            classes.retain(|c| *c != self.class_name);
        }
        context.document.set_attribute(element, "class", &classes.join(" ")).is_ok()
    }

    fn variable_names(&self) -> Vec<String> {
        self.expression.dependencies()
    }
}

/// `data-rml`: replaces the element's content with the stringified value
pub struct RmlView {
    base: ViewBase,
    expression: BoundExpression,
}

impl RmlView {
    pub fn new(store: &DataStore, document: &Document, element: ElementId, binding: &str) -> Result<Self> {
        Ok(Self {
            base: ViewBase::new(document, element)?,
            expression: BoundExpression::new(binding, element, store, document)?,
        })
    }
}

impl DataView for RmlView {
    fn name(&self) -> &'static str {
        "rml"
    }

    fn base(&self) -> &ViewBase {
        &self.base
    }

    fn update(&mut self, context: &mut ViewContext<'_>) -> bool {
        let Some(value) = evaluate(&self.expression, context.store) else {
            return false;
        };
        let content = value.to_string();
        let element = self.base.element();

        if context.document.inner_text(element) == content {
            return false;
        }
        context.document.set_inner_rml(element, &content).is_ok()
    }

    fn variable_names(&self) -> Vec<String> {
        self.expression.dependencies()
    }
}

/// `data-if`: hides the element with `display: none` while the value is false
pub struct IfView {
    base: ViewBase,
    expression: BoundExpression,
}

impl IfView {
    pub fn new(store: &DataStore, document: &Document, element: ElementId, binding: &str) -> Result<Self> {
        Ok(Self {
            base: ViewBase::new(document, element)?,
            expression: BoundExpression::new(binding, element, store, document)?,
        })
    }
}

impl DataView for IfView {
    fn name(&self) -> &'static str {
        "if"
    }

    fn base(&self) -> &ViewBase {
        &self.base
    }

    fn update(&mut self, context: &mut ViewContext<'_>) -> bool {
        let Some(value) = evaluate(&self.expression, context.store) else {
            return false;
        };
        let visible = value.as_bool();
        let element = self.base.element();

        let is_visible = context.document.property(element, DISPLAY_PROPERTY).is_none();
        if is_visible == visible {
            return false;
        }

        if visible {
            context.document.remove_property(element, DISPLAY_PROPERTY).is_ok()
        } else {
            context.document.set_property(element, DISPLAY_PROPERTY, "none").is_ok()
        }
    }

    fn variable_names(&self) -> Vec<String> {
        self.expression.dependencies()
    }
}
