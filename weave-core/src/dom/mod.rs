//! In-memory Document
//!
//! A small retained document the client renderer mounts into. It models
//! exactly what the reconciler needs: elements with attributes, inline style
//! and event listeners; text, comment and raw-markup leaves; and fragments
//! whose children move into the parent they are inserted into.
//!
//! Nodes are reference counted handles. Cloning a [`DomNode`] yields another
//! handle to the same node; use [`DomNode::ptr_eq`] to compare identity.

pub mod unmount;

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;

use crate::error::RenderError;
use crate::html::{escape_attr, escape_text, is_void_element, parse_style, serialize_style};
use crate::view::Handler;

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a document node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    fn new() -> Self {
        Self(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// The kind of a document node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomKind {
    Element(Rc<str>),
    Text,
    Comment,
    /// Markup inserted verbatim through `x-html`.
    Raw,
    Fragment,
}

struct NodeData {
    id: NodeId,
    kind: DomKind,
    parent: RefCell<Weak<NodeData>>,
    children: RefCell<Vec<DomNode>>,
    attributes: RefCell<IndexMap<String, String>>,
    style: RefCell<IndexMap<String, String>>,
    listeners: RefCell<IndexMap<String, Handler>>,
    /// Content of text, comment and raw nodes.
    data: RefCell<String>,
}

impl Drop for NodeData {
    fn drop(&mut self) {
        unmount::forget(self.id);
    }
}

/// An event delivered to a listener.
#[derive(Debug, Clone)]
pub struct Event {
    pub name: String,
    pub target: DomNode,
    /// Payload such as the new value of an input.
    pub value: Option<String>,
}

/// A handle to a document node.
#[derive(Clone)]
pub struct DomNode(Rc<NodeData>);

impl DomNode {
    fn new(kind: DomKind, data: String) -> Self {
        Self(Rc::new(NodeData {
            id: NodeId::new(),
            kind,
            parent: RefCell::new(Weak::new()),
            children: RefCell::new(Vec::new()),
            attributes: RefCell::new(IndexMap::new()),
            style: RefCell::new(IndexMap::new()),
            listeners: RefCell::new(IndexMap::new()),
            data: RefCell::new(data),
        }))
    }

    pub fn element(tag: &str) -> Self {
        Self::new(DomKind::Element(tag.into()), String::new())
    }

    pub fn text(text: &str) -> Self {
        Self::new(DomKind::Text, text.to_string())
    }

    pub fn comment(text: &str) -> Self {
        Self::new(DomKind::Comment, text.to_string())
    }

    pub fn raw(markup: &str) -> Self {
        Self::new(DomKind::Raw, markup.to_string())
    }

    pub fn fragment() -> Self {
        Self::new(DomKind::Fragment, String::new())
    }

    pub fn id(&self) -> NodeId {
        self.0.id
    }

    pub fn kind(&self) -> &DomKind {
        &self.0.kind
    }

    /// The tag name, for elements.
    pub fn tag(&self) -> Option<&str> {
        match &self.0.kind {
            DomKind::Element(tag) => Some(tag),
            _ => None,
        }
    }

    pub fn is_element(&self) -> bool {
        matches!(self.0.kind, DomKind::Element(_))
    }

    pub fn is_text(&self) -> bool {
        self.0.kind == DomKind::Text
    }

    fn is_container(&self) -> bool {
        matches!(self.0.kind, DomKind::Element(_) | DomKind::Fragment)
    }

    /// Whether both handles refer to the same node.
    pub fn ptr_eq(&self, other: &DomNode) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    // ------------------------------------------------------------------
    // Tree
    // ------------------------------------------------------------------

    pub fn parent(&self) -> Option<DomNode> {
        self.0.parent.borrow().upgrade().map(DomNode)
    }

    /// A snapshot of the children.
    pub fn children(&self) -> Vec<DomNode> {
        self.0.children.borrow().clone()
    }

    pub fn child(&self, index: usize) -> Option<DomNode> {
        self.0.children.borrow().get(index).cloned()
    }

    pub fn child_count(&self) -> usize {
        self.0.children.borrow().len()
    }

    fn index_of(&self, child: &DomNode) -> Option<usize> {
        self.0
            .children
            .borrow()
            .iter()
            .position(|candidate| candidate.ptr_eq(child))
    }

    /// Remove this node from its parent, if it has one.
    pub fn remove(&self) {
        if let Some(parent) = self.parent() {
            if let Some(index) = parent.index_of(self) {
                parent.0.children.borrow_mut().remove(index);
            }
        }
        *self.0.parent.borrow_mut() = Weak::new();
    }

    /// Nodes to insert for `child`: a fragment contributes its children.
    fn take_inserted(child: &DomNode) -> Vec<DomNode> {
        if child.0.kind == DomKind::Fragment {
            child.clear_children()
        } else {
            child.remove();
            vec![child.clone()]
        }
    }

    fn ensure_container(&self, operation: &str) -> Result<(), RenderError> {
        if self.is_container() {
            Ok(())
        } else {
            Err(RenderError::Dom(format!(
                "{operation} on a {:?} node",
                self.0.kind
            )))
        }
    }

    /// Append a node. A fragment moves its children instead.
    pub fn append_child(&self, child: &DomNode) -> Result<(), RenderError> {
        self.ensure_container("append_child")?;
        for node in Self::take_inserted(child) {
            *node.0.parent.borrow_mut() = Rc::downgrade(&self.0);
            self.0.children.borrow_mut().push(node);
        }
        Ok(())
    }

    /// Insert a node before `reference`, or at the end when `reference` is
    /// `None`.
    pub fn insert_before(
        &self,
        child: &DomNode,
        reference: Option<&DomNode>,
    ) -> Result<(), RenderError> {
        let Some(reference) = reference else {
            return self.append_child(child);
        };
        self.ensure_container("insert_before")?;
        if child.ptr_eq(reference) {
            return Ok(());
        }
        if self.index_of(reference).is_none() {
            return Err(RenderError::Dom(
                "insert_before reference is not a child".into(),
            ));
        }
        for node in Self::take_inserted(child) {
            let index = self.index_of(reference).ok_or_else(|| {
                RenderError::Dom("insert_before reference moved during insertion".into())
            })?;
            *node.0.parent.borrow_mut() = Rc::downgrade(&self.0);
            self.0.children.borrow_mut().insert(index, node);
        }
        Ok(())
    }

    pub fn remove_child(&self, child: &DomNode) -> Result<(), RenderError> {
        if self.index_of(child).is_none() {
            return Err(RenderError::Dom("remove_child target is not a child".into()));
        }
        child.remove();
        Ok(())
    }

    /// Put `replacement` where this node is.
    pub fn replace_with(&self, replacement: &DomNode) -> Result<(), RenderError> {
        if self.ptr_eq(replacement) {
            return Ok(());
        }
        let parent = self
            .parent()
            .ok_or_else(|| RenderError::Dom("replace_with on a detached node".into()))?;
        parent.insert_before(replacement, Some(self))?;
        parent.remove_child(self)
    }

    /// Detach and return every child.
    pub fn clear_children(&self) -> Vec<DomNode> {
        let children = std::mem::take(&mut *self.0.children.borrow_mut());
        for child in &children {
            *child.0.parent.borrow_mut() = Weak::new();
        }
        children
    }

    /// The first node in depth-first order (including this one) matching
    /// `predicate`.
    pub fn find(&self, predicate: &dyn Fn(&DomNode) -> bool) -> Option<DomNode> {
        if predicate(self) {
            return Some(self.clone());
        }
        self.children()
            .iter()
            .find_map(|child| child.find(predicate))
    }

    /// Every node in depth-first order (including this one) matching
    /// `predicate`.
    pub fn find_all(&self, predicate: &dyn Fn(&DomNode) -> bool) -> Vec<DomNode> {
        let mut found = Vec::new();
        self.collect(predicate, &mut found);
        found
    }

    fn collect(&self, predicate: &dyn Fn(&DomNode) -> bool, found: &mut Vec<DomNode>) {
        if predicate(self) {
            found.push(self.clone());
        }
        for child in self.children() {
            child.collect(predicate, found);
        }
    }

    /// The first element with the given tag.
    pub fn query(&self, tag: &str) -> Option<DomNode> {
        self.find(&|node| node.tag() == Some(tag))
    }

    /// Every element with the given tag, in document order.
    pub fn query_all(&self, tag: &str) -> Vec<DomNode> {
        self.find_all(&|node| node.tag() == Some(tag))
    }

    // ------------------------------------------------------------------
    // Attributes and style
    // ------------------------------------------------------------------

    /// Set an attribute. `style` is parsed into the inline style map.
    pub fn set_attribute(&self, name: &str, value: &str) {
        if name == "style" {
            *self.0.style.borrow_mut() = parse_style(value);
        } else {
            self.0
                .attributes
                .borrow_mut()
                .insert(name.to_string(), value.to_string());
        }
    }

    pub fn get_attribute(&self, name: &str) -> Option<String> {
        if name == "style" {
            let style = self.0.style.borrow();
            return (!style.is_empty()).then(|| serialize_style(&style));
        }
        self.0.attributes.borrow().get(name).cloned()
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.get_attribute(name).is_some()
    }

    pub fn remove_attribute(&self, name: &str) {
        if name == "style" {
            self.0.style.borrow_mut().clear();
        } else {
            self.0.attributes.borrow_mut().shift_remove(name);
        }
    }

    /// Attribute names in insertion order, without `style`.
    pub fn attribute_names(&self) -> Vec<String> {
        self.0.attributes.borrow().keys().cloned().collect()
    }

    pub fn set_style(&self, property: &str, value: &str) {
        self.0
            .style
            .borrow_mut()
            .insert(property.to_string(), value.to_string());
    }

    pub fn remove_style(&self, property: &str) {
        self.0.style.borrow_mut().shift_remove(property);
    }

    pub fn style(&self, property: &str) -> Option<String> {
        self.0.style.borrow().get(property).cloned()
    }

    // ------------------------------------------------------------------
    // Content
    // ------------------------------------------------------------------

    /// Data of a text, comment or raw node.
    pub fn data(&self) -> String {
        self.0.data.borrow().clone()
    }

    /// Replace the data of a text, comment or raw node.
    pub fn set_data(&self, data: &str) {
        let mut current = self.0.data.borrow_mut();
        if *current != data {
            *current = data.to_string();
        }
    }

    /// Concatenated text of this subtree.
    pub fn text_content(&self) -> String {
        match &self.0.kind {
            DomKind::Text | DomKind::Raw => self.data(),
            DomKind::Comment => String::new(),
            DomKind::Element(_) | DomKind::Fragment => self
                .0
                .children
                .borrow()
                .iter()
                .map(DomNode::text_content)
                .collect(),
        }
    }

    /// Replace the content with a single text node.
    pub fn set_text_content(&self, text: &str) -> Result<(), RenderError> {
        if !self.is_container() {
            self.set_data(text);
            return Ok(());
        }
        self.clear_children();
        if !text.is_empty() {
            self.append_child(&DomNode::text(text))?;
        }
        Ok(())
    }

    /// Replace the content with raw markup.
    pub fn set_inner_html(&self, markup: &str) -> Result<(), RenderError> {
        self.ensure_container("set_inner_html")?;
        self.clear_children();
        self.append_child(&DomNode::raw(markup))
    }

    /// Serialized children.
    pub fn inner_html(&self) -> String {
        let mut out = String::new();
        for child in self.0.children.borrow().iter() {
            child.write_html(&mut out);
        }
        out
    }

    /// Serialized node.
    pub fn outer_html(&self) -> String {
        let mut out = String::new();
        self.write_html(&mut out);
        out
    }

    fn write_html(&self, out: &mut String) {
        match &self.0.kind {
            DomKind::Text => out.push_str(&escape_text(&self.0.data.borrow())),
            DomKind::Raw => out.push_str(&self.0.data.borrow()),
            DomKind::Comment => {
                out.push_str("<!--");
                out.push_str(&self.0.data.borrow());
                out.push_str("-->");
            }
            DomKind::Fragment => out.push_str(&self.inner_html()),
            DomKind::Element(tag) => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in self.0.attributes.borrow().iter() {
                    out.push_str(&format!(" {name}=\"{}\"", escape_attr(value)));
                }
                if let Some(style) = self.get_attribute("style") {
                    out.push_str(&format!(" style=\"{}\"", escape_attr(&style)));
                }
                out.push('>');
                if is_void_element(tag) {
                    return;
                }
                out.push_str(&self.inner_html());
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
        }
    }

    // ------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------

    /// Attach a listener, replacing any previous one for the same event.
    pub fn add_event_listener(&self, event: &str, handler: Handler) {
        self.0
            .listeners
            .borrow_mut()
            .insert(event.to_string(), handler);
    }

    pub fn remove_event_listener(&self, event: &str) {
        self.0.listeners.borrow_mut().shift_remove(event);
    }

    pub fn clear_event_listeners(&self) {
        self.0.listeners.borrow_mut().clear();
    }

    pub fn has_listener(&self, event: &str) -> bool {
        self.0.listeners.borrow().contains_key(event)
    }

    /// Fire `event` at this node. Returns whether a listener ran.
    pub fn dispatch(&self, event: &str, value: Option<&str>) -> bool {
        let handler = self.0.listeners.borrow().get(event).cloned();
        match handler {
            Some(handler) => {
                handler.call(&Event {
                    name: event.to_string(),
                    target: self.clone(),
                    value: value.map(str::to_string),
                });
                true
            }
            None => false,
        }
    }
}

impl fmt::Debug for DomNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DomNode")
            .field("id", &self.0.id)
            .field("kind", &self.0.kind)
            .field("children", &self.child_count())
            .finish()
    }
}

impl PartialEq for DomNode {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

/// Receives the element a `ref` property is attached to.
#[derive(Clone, Default)]
pub struct NodeRef(Rc<RefCell<Option<DomNode>>>);

impl NodeRef {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<DomNode> {
        self.0.borrow().clone()
    }

    pub(crate) fn set(&self, node: &DomNode) {
        *self.0.borrow_mut() = Some(node.clone());
    }
}

impl fmt::Debug for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("NodeRef").field(&self.get()).finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
