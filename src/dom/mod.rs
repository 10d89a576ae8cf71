//! Headless document model.
//!
//! A small element arena standing in for the browser DOM: just enough to let
//! the page controllers look elements up by id or class, flip styles and
//! classes, read form values and mount view trees. Nodes are addressed by
//! [`NodeId`]; removed nodes leave a hole so stale ids read as detached
//! instead of aliasing a newer node.

pub mod parse;

use crate::error::{Error, Result};
use crate::view::{self, View};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// Handle to a node inside a [`Document`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub tag: String,
    pub id: Option<String>,
    pub classes: Vec<String>,
    /// Everything except `id`, `class` and `style`
    pub attributes: BTreeMap<String, String>,
    /// Inline style declarations, in insertion order
    pub style: Vec<(String, String)>,
}

impl Element {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            id: None,
            classes: Vec::new(),
            attributes: BTreeMap::new(),
            style: Vec::new(),
        }
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(|s| s.as_str())
    }

    pub fn style(&self, property: &str) -> Option<&str> {
        self.style
            .iter()
            .find(|(k, _)| k == property)
            .map(|(_, v)| v.as_str())
    }

    fn set_style(&mut self, property: &str, value: &str) {
        match self.style.iter_mut().find(|(k, _)| k == property) {
            Some(slot) => slot.1 = value.to_string(),
            None => self.style.push((property.to_string(), value.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeData {
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone)]
struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    data: NodeData,
}

/// Events a host feeds into the page controllers
#[derive(Debug, Clone, PartialEq)]
pub enum PageEvent {
    Click { target: NodeId },
    /// `key` uses DOM key names, e.g. "Escape"
    KeyDown { key: String },
    Submit { form: NodeId },
    PointerEnter { target: NodeId },
    PointerLeave { target: NodeId },
    /// Vertical page offset in CSS pixels
    Scroll { offset_y: f64 },
}

/// A textual snapshot of a page
#[derive(Debug, Clone)]
pub struct TextSnapshot {
    /// Page title
    pub title: String,
    /// Extracted text content of `<body>`
    pub text: String,
    /// Where the page came from, empty for bundled markup
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Option<Node>>,
    root: NodeId,
    body: NodeId,
    title: String,
    url: String,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// An empty `<html><head></head><body></body></html>` document
    pub fn new() -> Self {
        let mut doc = Document {
            nodes: Vec::new(),
            root: NodeId(0),
            body: NodeId(0),
            title: String::new(),
            url: String::new(),
        };
        let root = doc.alloc(None, NodeData::Element(Element::new("html")));
        doc.root = root;
        doc.create_element(root, Element::new("head"));
        doc.body = doc.create_element(root, Element::new("body"));
        doc
    }

    /// Parse HTML markup, see [`parse::parse_document`]
    pub fn parse(html: &str) -> Result<Self> {
        parse::parse_document(html)
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn body(&self) -> NodeId {
        self.body
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn set_url(&mut self, url: impl Into<String>) {
        self.url = url.into();
    }

    fn alloc(&mut self, parent: Option<NodeId>, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Some(Node {
            parent,
            children: Vec::new(),
            data,
        }));
        if let Some(p) = parent {
            if let Some(Some(pn)) = self.nodes.get_mut(p.0) {
                pn.children.push(id);
            }
        }
        id
    }

    fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0).and_then(|n| n.as_ref())
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0).and_then(|n| n.as_mut())
    }

    /// Append an element under `parent`
    pub fn create_element(&mut self, parent: NodeId, element: Element) -> NodeId {
        self.alloc(Some(parent), NodeData::Element(element))
    }

    /// Append a text node under `parent`
    pub fn create_text(&mut self, parent: NodeId, text: impl Into<String>) -> NodeId {
        self.alloc(Some(parent), NodeData::Text(text.into()))
    }

    /// Mount a view tree as the last child of `parent` and return its root
    pub fn append(&mut self, parent: NodeId, view: &View) -> NodeId {
        match view {
            View::Text(t) => self.create_text(parent, t.clone()),
            View::Element(e) => {
                let mut element = Element::new(&e.tag);
                element.id = e.id.clone();
                element.classes = e.classes.clone();
                element.attributes = e.attributes.iter().cloned().collect();
                element.style = e.style.clone();
                let id = self.create_element(parent, element);
                for child in &e.children {
                    self.append(id, child);
                }
                id
            }
        }
    }

    /// Whether the node still exists
    pub fn contains(&self, id: NodeId) -> bool {
        self.node(id).is_some()
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match self.node(id).map(|n| &n.data) {
            Some(NodeData::Element(e)) => Some(e),
            _ => None,
        }
    }

    pub fn element_mut(&mut self, id: NodeId) -> Option<&mut Element> {
        match self.node_mut(id).map(|n| &mut n.data) {
            Some(NodeData::Element(e)) => Some(e),
            _ => None,
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(|n| n.parent)
    }

    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.node(id).map(|n| n.children.clone()).unwrap_or_default()
    }

    /// Child nodes that are elements
    pub fn child_elements(&self, id: NodeId) -> Vec<NodeId> {
        self.children(id)
            .into_iter()
            .filter(|c| self.element(*c).is_some())
            .collect()
    }

    /// Detach and free `id` together with its subtree. Returns false when the
    /// node was already gone.
    pub fn remove(&mut self, id: NodeId) -> bool {
        if id == self.root || !self.contains(id) {
            return false;
        }
        if let Some(parent) = self.parent(id) {
            if let Some(pn) = self.node_mut(parent) {
                pn.children.retain(|c| *c != id);
            }
        }
        self.free(id);
        true
    }

    fn free(&mut self, id: NodeId) {
        let children = self.children(id);
        for c in children {
            self.free(c);
        }
        if let Some(slot) = self.nodes.get_mut(id.0) {
            *slot = None;
        }
    }

    /// Remove every child of `id`
    pub fn clear_children(&mut self, id: NodeId) {
        for c in self.children(id) {
            self.remove(c);
        }
    }

    /// Replace the children of `id` with a single text node
    pub fn set_text(&mut self, id: NodeId, text: impl Into<String>) {
        self.clear_children(id);
        let text = text.into();
        if !text.is_empty() {
            self.create_text(id, text);
        }
    }

    /// Concatenated text of the subtree
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        match self.node(id) {
            Some(Node {
                data: NodeData::Text(t),
                ..
            }) => out.push_str(t),
            Some(n) => {
                for c in &n.children {
                    self.collect_text(*c, out);
                }
            }
            None => {}
        }
    }

    /// Pre-order walk of the elements under `from` (inclusive)
    pub fn descendants(&self, from: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![from];
        while let Some(id) = stack.pop() {
            if self.element(id).is_none() {
                continue;
            }
            out.push(id);
            if let Some(n) = self.node(id) {
                for c in n.children.iter().rev() {
                    stack.push(*c);
                }
            }
        }
        out
    }

    pub fn get_element_by_id(&self, id: &str) -> Option<NodeId> {
        self.descendants(self.root)
            .into_iter()
            .find(|n| self.element(*n).and_then(|e| e.id.as_deref()) == Some(id))
    }

    /// Like [`Document::get_element_by_id`] but missing ids are an error
    pub fn require(&self, id: &str) -> Result<NodeId> {
        self.get_element_by_id(id)
            .ok_or_else(|| Error::MissingElement(id.to_string()))
    }

    /// All elements carrying `class`, in document order
    pub fn get_elements_by_class(&self, class: &str) -> Vec<NodeId> {
        self.descendants(self.root)
            .into_iter()
            .filter(|n| self.has_class(*n, class))
            .collect()
    }

    pub fn first_by_class(&self, class: &str) -> Option<NodeId> {
        self.get_elements_by_class(class).into_iter().next()
    }

    /// Nearest inclusive ancestor carrying `class`
    pub fn closest(&self, from: NodeId, class: &str) -> Option<NodeId> {
        let mut cur = Some(from);
        while let Some(id) = cur {
            if self.has_class(id, class) {
                return Some(id);
            }
            cur = self.parent(id);
        }
        None
    }

    /// Whether `node` is `ancestor` or lives under it
    pub fn is_inclusive_descendant(&self, node: NodeId, ancestor: NodeId) -> bool {
        let mut cur = Some(node);
        while let Some(id) = cur {
            if id == ancestor {
                return true;
            }
            cur = self.parent(id);
        }
        false
    }

    // --- classes / attributes / styles ---

    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.element(id).map(|e| e.has_class(class)).unwrap_or(false)
    }

    pub fn add_class(&mut self, id: NodeId, class: &str) {
        if let Some(e) = self.element_mut(id) {
            if !e.has_class(class) {
                e.classes.push(class.to_string());
            }
        }
    }

    pub fn remove_class(&mut self, id: NodeId, class: &str) {
        if let Some(e) = self.element_mut(id) {
            e.classes.retain(|c| c != class);
        }
    }

    /// Returns whether the class is present afterwards
    pub fn toggle_class(&mut self, id: NodeId, class: &str) -> bool {
        if self.has_class(id, class) {
            self.remove_class(id, class);
            false
        } else {
            self.add_class(id, class);
            true
        }
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<String> {
        self.element(id).and_then(|e| e.attr(name)).map(String::from)
    }

    pub fn set_attr(&mut self, id: NodeId, name: &str, value: impl Into<String>) {
        if let Some(e) = self.element_mut(id) {
            e.attributes.insert(name.to_string(), value.into());
        }
    }

    pub fn remove_attr(&mut self, id: NodeId, name: &str) {
        if let Some(e) = self.element_mut(id) {
            e.attributes.remove(name);
        }
    }

    pub fn style(&self, id: NodeId, property: &str) -> Option<String> {
        self.element(id).and_then(|e| e.style(property)).map(String::from)
    }

    pub fn set_style(&mut self, id: NodeId, property: &str, value: &str) {
        if let Some(e) = self.element_mut(id) {
            e.set_style(property, value);
        }
    }

    pub fn set_disabled(&mut self, id: NodeId, disabled: bool) {
        if disabled {
            self.set_attr(id, "disabled", "");
        } else {
            self.remove_attr(id, "disabled");
        }
    }

    pub fn is_disabled(&self, id: NodeId) -> bool {
        self.element(id)
            .map(|e| e.attributes.contains_key("disabled"))
            .unwrap_or(false)
    }

    // --- form controls ---

    /// Current value of an `input`, `textarea` or `select`.
    ///
    /// A select reports its selected option, falling back to the first
    /// option the way browsers do, and `""` when it has no options.
    pub fn value(&self, id: NodeId) -> String {
        let Some(e) = self.element(id) else {
            return String::new();
        };
        match e.tag.as_str() {
            "textarea" => self.text_content(id),
            "select" => {
                let options = self.options(id);
                let chosen = options
                    .iter()
                    .find(|o| self.element(**o).map(|e| e.attributes.contains_key("selected")).unwrap_or(false))
                    .or_else(|| options.first());
                chosen.map(|o| self.option_value(*o)).unwrap_or_default()
            }
            _ => e.attr("value").unwrap_or_default().to_string(),
        }
    }

    /// Set a control's value. On a select this selects the first option with
    /// that value; an unknown value leaves the select with nothing chosen
    /// explicitly.
    pub fn set_value(&mut self, id: NodeId, value: &str) {
        let tag = match self.element(id) {
            Some(e) => e.tag.clone(),
            None => return,
        };
        match tag.as_str() {
            "textarea" => self.set_text(id, value),
            "select" => {
                let options = self.options(id);
                let mut picked = false;
                for o in options {
                    if !picked && self.option_value(o) == value {
                        self.set_attr(o, "selected", "");
                        picked = true;
                    } else {
                        self.remove_attr(o, "selected");
                    }
                }
            }
            _ => self.set_attr(id, "value", value),
        }
    }

    /// `<option>` children of a select, in order
    pub fn options(&self, select: NodeId) -> Vec<NodeId> {
        self.descendants(select)
            .into_iter()
            .filter(|n| self.element(*n).map(|e| e.tag == "option").unwrap_or(false))
            .collect()
    }

    fn option_value(&self, option: NodeId) -> String {
        match self.attr(option, "value") {
            Some(v) => v,
            None => self.text_content(option).trim().to_string(),
        }
    }

    // --- output ---

    /// Serialize a subtree back to HTML. Text and attribute values are escaped.
    pub fn outer_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_html(id, &mut out);
        out
    }

    pub fn inner_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        for c in self.children(id) {
            self.write_html(c, &mut out);
        }
        out
    }

    fn write_html(&self, id: NodeId, out: &mut String) {
        let Some(node) = self.node(id) else {
            return;
        };
        match &node.data {
            NodeData::Text(t) => out.push_str(&view::escape_text(t)),
            NodeData::Element(e) => {
                let mut attrs: Vec<(String, String)> = Vec::new();
                if let Some(i) = &e.id {
                    attrs.push(("id".into(), i.clone()));
                }
                if !e.classes.is_empty() {
                    attrs.push(("class".into(), e.classes.join(" ")));
                }
                attrs.extend(e.attributes.iter().map(|(k, v)| (k.clone(), v.clone())));
                if !e.style.is_empty() {
                    attrs.push(("style".into(), view::style_string(e.style.iter())));
                }
                view::open_tag(out, &e.tag, &attrs);
                if view::is_void(&e.tag) {
                    return;
                }
                for c in &node.children {
                    self.write_html(*c, out);
                }
                out.push_str("</");
                out.push_str(&e.tag);
                out.push('>');
            }
        }
    }

    pub fn text_snapshot(&self) -> TextSnapshot {
        TextSnapshot {
            title: self.title.clone(),
            text: self.text_content(self.body),
            url: self.url.clone(),
        }
    }
}

/// Shared handle to a document.
///
/// Every controller, toast timer and download trigger on a page holds a clone.
/// Access goes through [`Page::with`], which keeps the lock scoped to a
/// closure so it can never be held across an await point.
#[derive(Clone)]
pub struct Page {
    doc: Arc<Mutex<Document>>,
}

impl Page {
    pub fn new(doc: Document) -> Self {
        Self {
            doc: Arc::new(Mutex::new(doc)),
        }
    }

    pub fn from_html(html: &str) -> Result<Self> {
        Ok(Self::new(Document::parse(html)?))
    }

    /// Run `f` against the document
    pub fn with<R>(&self, f: impl FnOnce(&mut Document) -> R) -> R {
        // Poisoning is ignored; every mutation is a single arena write.
        let mut guard = self.doc.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut guard)
    }

    pub fn require(&self, id: &str) -> Result<NodeId> {
        self.with(|doc| doc.require(id))
    }

    pub fn text_snapshot(&self) -> TextSnapshot {
        self.with(|doc| doc.text_snapshot())
    }
}

impl std::fmt::Debug for Page {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Page").finish_non_exhaustive()
    }
}
