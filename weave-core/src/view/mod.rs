//! View Trees
//!
//! A view is a tree of [`VNode`]s. Each node has a type (a tag name, a
//! component, a fragment or a text leaf), a property map and an optional
//! children list. Reactive leaves ([`Dynamic`]) may appear among children.
//!
//! Trees are immutable descriptions: renderers read them and never modify
//! them. Components are invoked by [`expand`], which flattens fragments so
//! every element's children form one list.

mod component;
pub mod expand;
mod value;

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::directive;

pub use component::{error_boundary, Component, Output, CHILDREN_PROP, FALLBACK_PROP, VALUE_PROP};
pub use expand::{expand, expand_output, flatten_children, Expanded};
pub use value::{Dynamic, Each, Fallback, Getter, Handler, IntoProp, ItemFactory, PropValue, Value};

/// Property map of a node, in declaration order.
pub type Props = IndexMap<String, PropValue>;

/// Prefix of event listener properties.
pub const EVENT_PREFIX: &str = "on:";

/// The type of a node.
#[derive(Clone)]
pub enum NodeType {
    /// An element with the given tag name.
    Tag(Rc<str>),
    Component(Component),
    /// A list of siblings without an element of its own.
    Fragment,
    Text(Rc<str>),
}

impl fmt::Debug for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeType::Tag(tag) => write!(f, "<{tag}>"),
            NodeType::Component(component) => write!(f, "{}()", component.name()),
            NodeType::Fragment => f.write_str("<>"),
            NodeType::Text(text) => write!(f, "{text:?}"),
        }
    }
}

/// One entry of a children list.
#[derive(Debug, Clone)]
pub enum Child {
    Node(VNode),
    /// A reactive leaf, re-rendered in place when its reads change.
    Dynamic(Dynamic),
}

impl Child {
    /// The node, if this is not a reactive leaf.
    pub fn as_node(&self) -> Option<&VNode> {
        match self {
            Child::Node(node) => Some(node),
            Child::Dynamic(_) => None,
        }
    }
}

impl From<VNode> for Child {
    fn from(node: VNode) -> Self {
        Child::Node(node)
    }
}

impl From<Dynamic> for Child {
    fn from(dynamic: Dynamic) -> Self {
        Child::Dynamic(dynamic)
    }
}

impl From<Getter> for Child {
    fn from(getter: Getter) -> Self {
        Child::Dynamic(getter.into())
    }
}

impl From<&str> for Child {
    fn from(text: &str) -> Self {
        Child::Node(VNode::text(text))
    }
}

impl From<String> for Child {
    fn from(text: String) -> Self {
        Child::Node(VNode::text(text))
    }
}

impl<T> From<crate::reactive::Memo<T>> for Child
where
    T: Clone + PartialEq + Into<Value> + 'static,
{
    fn from(memo: crate::reactive::Memo<T>) -> Self {
        Child::Dynamic(Getter::from(memo).into())
    }
}

impl<T> From<crate::reactive::ReadSignal<T>> for Child
where
    T: Clone + PartialEq + Into<Value> + 'static,
{
    fn from(signal: crate::reactive::ReadSignal<T>) -> Self {
        Child::Dynamic(Getter::from(signal).into())
    }
}

/// A node of a view tree.
#[derive(Debug, Clone)]
pub struct VNode {
    pub kind: NodeType,
    pub props: Props,
    pub children: Option<Vec<Child>>,
    /// Identity among keyed siblings.
    pub key: Option<Rc<str>>,
}

impl VNode {
    fn new(kind: NodeType) -> Self {
        Self {
            kind,
            props: Props::new(),
            children: None,
            key: None,
        }
    }

    /// An element node.
    pub fn element(tag: &str) -> Self {
        Self::new(NodeType::Tag(tag.into()))
    }

    /// A text leaf.
    pub fn text(text: impl Into<Rc<str>>) -> Self {
        Self::new(NodeType::Text(text.into()))
    }

    /// A fragment of siblings.
    pub fn fragment(children: Vec<Child>) -> Self {
        Self {
            children: Some(children),
            ..Self::new(NodeType::Fragment)
        }
    }

    /// A component invocation.
    pub fn component(component: Component) -> Self {
        Self::new(NodeType::Component(component))
    }

    /// A list directive: renders `render(item, index)` for each item of `source`.
    pub fn each<F>(source: impl IntoProp, render: F) -> Self
    where
        F: Fn(&Value, usize) -> VNode + 'static,
    {
        Self::new(NodeType::Fragment).prop(
            directive::EACH,
            PropValue::Each(Each {
                source: Box::new(source.into_prop()),
                render: Rc::new(render),
            }),
        )
    }

    /// Set a property.
    pub fn prop(mut self, name: &str, value: impl IntoProp) -> Self {
        self.props.insert(name.to_string(), value.into_prop());
        self
    }

    /// Alias of [`VNode::prop`] reading better for plain attributes.
    pub fn attr(self, name: &str, value: impl IntoProp) -> Self {
        self.prop(name, value)
    }

    /// Attach an event listener.
    pub fn on<F>(self, event: &str, handler: F) -> Self
    where
        F: Fn(&crate::dom::Event) + 'static,
    {
        self.prop(&format!("{EVENT_PREFIX}{event}"), Handler::new(handler))
    }

    /// Append one child.
    pub fn child(mut self, child: impl Into<Child>) -> Self {
        self.children.get_or_insert_with(Vec::new).push(child.into());
        self
    }

    /// Append several children.
    pub fn children<I>(mut self, children: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Child>,
    {
        self.children
            .get_or_insert_with(Vec::new)
            .extend(children.into_iter().map(Into::into));
        self
    }

    /// Give the node an identity among its siblings.
    pub fn key(mut self, key: impl Into<Value>) -> Self {
        self.key = Some(key.into().to_text().into());
        self
    }

    /// Render only if `condition` is truthy.
    pub fn when(self, condition: impl IntoProp) -> Self {
        self.prop(directive::IF, condition)
    }

    /// Render if no earlier branch of the group won and `condition` is truthy.
    pub fn else_when(self, condition: impl IntoProp) -> Self {
        self.prop(directive::ELSE_IF, condition)
    }

    /// Render if no earlier branch of the group won.
    pub fn otherwise(self) -> Self {
        self.prop(directive::ELSE, true)
    }

    /// Toggle visibility without removing the node.
    pub fn show(self, visible: impl IntoProp) -> Self {
        self.prop(directive::SHOW, visible)
    }

    /// Replace the content with text.
    pub fn text_binding(self, text: impl IntoProp) -> Self {
        self.prop(directive::TEXT, text)
    }

    /// Replace the content with raw markup.
    pub fn html(self, markup: impl IntoProp) -> Self {
        self.prop(directive::HTML, markup)
    }

    /// Render a frozen snapshot that never updates.
    pub fn once(self) -> Self {
        self.prop(directive::ONCE, true)
    }

    /// The children of this node. Children passed through the property map
    /// take precedence over the node's own list.
    pub fn child_list(&self) -> &[Child] {
        match self.props.get(CHILDREN_PROP) {
            Some(PropValue::Children(children)) => children,
            _ => self.children.as_deref().unwrap_or(&[]),
        }
    }

    /// The tag name, for element nodes.
    pub fn tag(&self) -> Option<&str> {
        match &self.kind {
            NodeType::Tag(tag) => Some(tag),
            _ => None,
        }
    }

    /// The text, for text leaves.
    pub fn text_content(&self) -> Option<&str> {
        match &self.kind {
            NodeType::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn has_prop(&self, name: &str) -> bool {
        self.props.contains_key(name)
    }

    /// A copy of this node without the named properties.
    pub fn without_props(&self, names: &[&str]) -> VNode {
        let mut node = self.clone();
        node.props.retain(|name, _| !names.contains(&name.as_str()));
        node
    }

    /// Properties handed to a component: the node's own map, plus its
    /// children under [`CHILDREN_PROP`] when not already present.
    pub fn component_props(&self) -> Props {
        let mut props = self.props.clone();
        if let Some(children) = &self.children {
            props
                .entry(CHILDREN_PROP.to_string())
                .or_insert_with(|| PropValue::Children(children.clone()));
        }
        props
    }
}

/// Shorthand for [`VNode::element`].
pub fn el(tag: &str) -> VNode {
    VNode::element(tag)
}

/// Shorthand for [`VNode::text`].
pub fn text(text: impl Into<Rc<str>>) -> VNode {
    VNode::text(text)
}

/// Shorthand for [`VNode::fragment`].
pub fn fragment<I>(children: I) -> VNode
where
    I: IntoIterator,
    I::Item: Into<Child>,
{
    VNode::fragment(children.into_iter().map(Into::into).collect())
}

/// A reactive leaf re-rendered whenever the reads of `f` change.
pub fn dynamic<F>(f: F) -> Child
where
    F: Fn() -> VNode + 'static,
{
    Child::Dynamic(Dynamic::new(f))
}
