//! Views push data model values into the document
//!
//! Every view is attached to one element and declares the top-level variable
//! names it depends on. [`DataViews`] indexes views by those names and, on each
//! update, runs only the views whose dependencies were dirtied, parents before
//! children.

mod element;
mod repeat;
mod text;

pub use element::{AttributeView, ClassView, IfView, RmlView, StyleView};
pub use repeat::ForView;
pub use text::TextView;

use crate::binder::Binder;
use crate::controller::DataController;
use crate::dom::{Document, ElementId};
use crate::error::{BindingError, Result};
use crate::model::{BoundExpression, DataStore};
use crate::variant::Variant;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Element and tree depth captured when the view was constructed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewBase {
    element: ElementId,
    depth: usize,
}

impl ViewBase {
    pub fn new(document: &Document, element: ElementId) -> Result<Self> {
        let depth = document
            .depth(element)
            .ok_or_else(|| BindingError::binding(format!("cannot attach a view to missing element {}", element)))?;
        Ok(Self { element, depth })
    }

    pub fn element(&self) -> ElementId {
        self.element
    }

    pub fn depth(&self) -> usize {
        self.depth
    }
}

pub trait DataView {
    /// Short name of the view kind, for diagnostics
    fn name(&self) -> &'static str;

    fn base(&self) -> &ViewBase;

    /// Bring the element up to date. Returns true if the document was changed.
    fn update(&mut self, context: &mut ViewContext<'_>) -> bool;

    /// Top-level variable names this view reads
    fn variable_names(&self) -> Vec<String>;

    fn element(&self) -> ElementId {
        self.base().element()
    }

    fn element_depth(&self) -> usize {
        self.base().depth()
    }

    fn is_valid(&self, document: &Document) -> bool {
        document.contains(self.element())
    }
}

/// Everything a view may touch while updating
pub struct ViewContext<'a> {
    pub store: &'a mut DataStore,
    pub document: &'a mut Document,
    binder: &'a Binder,
    new_views: Vec<Box<dyn DataView>>,
    new_controllers: Vec<Box<dyn DataController>>,
}

impl<'a> ViewContext<'a> {
    pub fn new(store: &'a mut DataStore, document: &'a mut Document, binder: &'a Binder) -> Self {
        Self {
            store,
            document,
            binder,
            new_views: Vec::new(),
            new_controllers: Vec::new(),
        }
    }

    /// Create bindings for a freshly inserted subtree. New views run later in the same update.
    pub fn bind_subtree(&mut self, root: ElementId) {
        let bindings = self.binder.bind_subtree(self.store, self.document, root);
        self.new_views.extend(bindings.views);
        self.new_controllers.extend(bindings.controllers);
    }

    fn take_views(&mut self) -> Vec<Box<dyn DataView>> {
        std::mem::take(&mut self.new_views)
    }

    pub fn into_controllers(self) -> Vec<Box<dyn DataController>> {
        self.new_controllers
    }
}

/// Run an expression, treating failures (already reported) as "no value"
pub(crate) fn evaluate(expression: &BoundExpression, store: &DataStore) -> Option<Variant> {
    expression.run(store).ok()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewId(u64);

/// Live views, indexed by the variable names they depend on
#[derive(Default)]
pub struct DataViews {
    views: BTreeMap<ViewId, Box<dyn DataView>>,
    pending_inserts: Vec<Box<dyn DataView>>,
    name_index: HashMap<String, Vec<ViewId>>,
    next_id: u64,
}

impl DataViews {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a view; it is indexed and updated at the start of the next pass
    pub fn add(&mut self, view: Box<dyn DataView>) {
        self.pending_inserts.push(view);
    }

    /// Number of live views, not counting queued ones
    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty() && self.pending_inserts.is_empty()
    }

    pub fn pending(&self) -> usize {
        self.pending_inserts.len()
    }

    /// Number of live views indexed under `name`
    pub fn dependents(&self, name: &str) -> usize {
        self.name_index.get(name).map_or(0, Vec::len)
    }

    pub fn update(&mut self, context: &mut ViewContext<'_>, dirty: &HashSet<String>, max_iterations: usize) -> bool {
        let mut result = false;
        let mut iteration = 0;

        loop {
            let mut dirty_views = self.drain_inserts();
            let inserted = dirty_views.len();

            for name in dirty {
                if let Some(ids) = self.name_index.get(name) {
                    dirty_views.extend(ids.iter().copied());
                }
            }

            dirty_views.sort_unstable();
            dirty_views.dedup();

            // Parents first: a structural view may remove elements whose views are also dirty
            dirty_views.sort_by_key(|id| self.views.get(id).map_or(usize::MAX, |view| view.element_depth()));

            let mut updated = 0;
            for id in &dirty_views {
                let Some(view) = self.views.get_mut(id) else {
                    continue;
                };
                if view.is_valid(context.document) {
                    result |= view.update(context);
                    updated += 1;
                }
            }

            self.pending_inserts.extend(context.take_views());
            self.drain_removes(context.document);

            log::debug!(
                "Data view pass {}: {} inserted, {} dirty, {} updated, {} live",
                iteration,
                inserted,
                dirty_views.len(),
                updated,
                self.views.len()
            );

            iteration += 1;
            if self.pending_inserts.is_empty() || iteration >= max_iterations {
                break;
            }
        }

        if !self.pending_inserts.is_empty() {
            log::warn!(
                "{} data view(s) still pending after {} update iterations, they are deferred to the next update",
                self.pending_inserts.len(),
                iteration
            );
        }

        result
    }

    pub fn clear(&mut self) {
        self.views.clear();
        self.pending_inserts.clear();
        self.name_index.clear();
    }

    fn drain_inserts(&mut self) -> Vec<ViewId> {
        let mut inserted = Vec::with_capacity(self.pending_inserts.len());
        for view in std::mem::take(&mut self.pending_inserts) {
            let id = ViewId(self.next_id);
            self.next_id += 1;

            for name in view.variable_names() {
                self.name_index.entry(name).or_default().push(id);
            }
            log::trace!("Inserted {} view {:?} on element {}", view.name(), id, view.element());

            self.views.insert(id, view);
            inserted.push(id);
        }
        inserted
    }

    /// Purge views whose element no longer exists from the views and the name index
    fn drain_removes(&mut self, document: &Document) {
        let removed: HashSet<ViewId> = self
            .views
            .iter()
            .filter(|(_, view)| !view.is_valid(document))
            .map(|(id, _)| *id)
            .collect();
        if removed.is_empty() {
            return;
        }

        self.views.retain(|id, _| !removed.contains(id));
        self.name_index.retain(|_, ids| {
            ids.retain(|id| !removed.contains(id));
            !ids.is_empty()
        });
        log::trace!("Removed {} data view(s)", removed.len());
    }
}

impl std::fmt::Debug for DataViews {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataViews")
            .field("views", &self.views.len())
            .field("pending_inserts", &self.pending_inserts.len())
            .field("indexed_names", &self.name_index.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::ElementTemplate;
    use crate::model::DataModel;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    /// Counts its updates and depends on a fixed list of names
    struct ProbeView {
        base: ViewBase,
        names: Vec<String>,
        updates: Rc<Cell<usize>>,
    }

    impl DataView for ProbeView {
        fn name(&self) -> &'static str {
            "probe"
        }

        fn base(&self) -> &ViewBase {
            &self.base
        }

        fn update(&mut self, _context: &mut ViewContext<'_>) -> bool {
            self.updates.set(self.updates.get() + 1);
            false
        }

        fn variable_names(&self) -> Vec<String> {
            self.names.clone()
        }
    }

    fn probe(document: &Document, element: ElementId, names: &[&str]) -> (Box<dyn DataView>, Rc<Cell<usize>>) {
        let updates = Rc::new(Cell::new(0));
        let view = ProbeView {
            base: ViewBase::new(document, element).unwrap(),
            names: names.iter().map(|n| n.to_string()).collect(),
            updates: updates.clone(),
        };
        (Box::new(view), updates)
    }

    #[test]
    fn test_dependency_indexing() {
        let mut document = Document::new();
        let element = document.create_element("div");
        document.append_child(document.root(), element).unwrap();

        let mut model = DataModel::new("test");
        let (view, updates) = probe(&document, element, &["a", "b"]);
        model.add_view(view);

        // Newly inserted views always run once
        model.update(&mut document);
        assert_eq!(updates.get(), 1);

        model.dirty_variable("a");
        model.update(&mut document);
        assert_eq!(updates.get(), 2);

        model.dirty_variable("b");
        model.update(&mut document);
        assert_eq!(updates.get(), 3);

        model.dirty_variable("a");
        model.dirty_variable("b");
        model.update(&mut document);
        assert_eq!(updates.get(), 4);

        model.dirty_variable("c");
        model.update(&mut document);
        assert_eq!(updates.get(), 4);

        model.update(&mut document);
        assert_eq!(updates.get(), 4);
    }

    #[test]
    fn test_destroyed_elements_purge_views() {
        let mut document = Document::new();
        let element = document.create_element("div");
        document.append_child(document.root(), element).unwrap();

        let mut model = DataModel::new("test");
        let (view, updates) = probe(&document, element, &["a", "b"]);
        model.add_view(view);
        model.update(&mut document);
        assert_eq!(model.views().len(), 1);
        assert_eq!(model.views().dependents("a"), 1);
        assert_eq!(model.views().dependents("b"), 1);

        document.remove_child(document.root(), element).unwrap();
        model.dirty_variable("a");
        model.update(&mut document);

        assert_eq!(updates.get(), 1);
        assert_eq!(model.views().len(), 0);
        assert_eq!(model.views().dependents("a"), 0);
        assert_eq!(model.views().dependents("b"), 0);
    }

    #[test]
    fn test_repetition_runs_before_descendants() {
        let list = Rc::new(RefCell::new(vec![1i32, 2, 3]));
        let mut model = DataModel::new("test");
        model.types_mut().register_scalar_array::<Vec<i32>>().unwrap();
        model.bind("list", &list).unwrap();

        let mut document = Document::new();
        let template = ElementTemplate::element("div")
            .attribute("data-for", "item:list")
            .child(ElementTemplate::text("value {{item}}"));
        let anchor = document.instantiate(&template);
        document.append_child(document.root(), anchor).unwrap();

        model.bind_document(&mut document);
        model.update(&mut document);
        assert_eq!(document.inner_text(document.root()), "value 1value 2value 3");
        // One repetition view plus one text view per clone
        assert_eq!(model.views().len(), 4);

        // Both the repetition view (depth 1) and the text views in clones (depth 2) depend on
        // "list"; the trailing clones are removed first and their text views skipped.
        list.borrow_mut().truncate(1);
        list.borrow_mut()[0] = 7;
        model.dirty_variable("list");
        model.update(&mut document);

        assert_eq!(document.inner_text(document.root()), "value 7");
        assert_eq!(model.views().len(), 2);
        assert_eq!(model.views().dependents("list"), 2);
    }

    #[test]
    fn test_removed_clone_views_are_skipped_in_the_same_pass() {
        let list = Rc::new(RefCell::new(vec![1i32, 2, 3]));
        let mut model = DataModel::new("test");
        model.types_mut().register_scalar_array::<Vec<i32>>().unwrap();
        model.bind("list", &list).unwrap();

        let mut document = Document::new();
        let template = ElementTemplate::element("div")
            .attribute("data-for", "item:list")
            .child(ElementTemplate::text("{{item}}"));
        let anchor = document.instantiate(&template);
        document.append_child(document.root(), anchor).unwrap();
        model.bind_document(&mut document);
        model.update(&mut document);

        let clones: Vec<ElementId> = document
            .children(document.root())
            .iter()
            .copied()
            .filter(|id| *id != anchor)
            .collect();
        assert_eq!(clones.len(), 3);

        // Depth 2, below the repetition view at depth 1
        let kept_text = document.children(clones[0])[0];
        let removed_text = document.children(clones[2])[0];
        assert_eq!(document.depth(removed_text), Some(2));
        let (kept_view, kept_updates) = probe(&document, kept_text, &["list"]);
        let (removed_view, removed_updates) = probe(&document, removed_text, &["list"]);
        model.add_view(kept_view);
        model.add_view(removed_view);

        list.borrow_mut().truncate(1);
        model.dirty_variable("list");
        model.update(&mut document);

        assert!(!document.contains(removed_text));
        assert_eq!(kept_updates.get(), 1);
        assert_eq!(removed_updates.get(), 0);
    }

    #[test]
    fn test_iteration_cap_defers_views() {
        let mut document = Document::new();
        let element = document.create_element("div");
        document.append_child(document.root(), element).unwrap();

        // Keeps spawning a copy of itself on every update
        struct Spawner {
            base: ViewBase,
        }

        impl DataView for Spawner {
            fn name(&self) -> &'static str {
                "spawner"
            }

            fn base(&self) -> &ViewBase {
                &self.base
            }

            fn update(&mut self, context: &mut ViewContext<'_>) -> bool {
                context.new_views.push(Box::new(Spawner { base: self.base }));
                true
            }

            fn variable_names(&self) -> Vec<String> {
                Vec::new()
            }
        }

        let mut model = DataModel::with_options(
            "test",
            crate::DataBindingOptions {
                max_update_iterations: 3,
                ..Default::default()
            },
        );
        model.add_view(Box::new(Spawner {
            base: ViewBase::new(&document, element).unwrap(),
        }));
        assert!(model.update(&mut document));
        assert_eq!(model.views().len(), 3);
        assert_eq!(model.views().pending(), 1);
    }
}
