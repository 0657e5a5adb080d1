//! Components: named functions from properties to output.

use std::fmt;
use std::rc::Rc;

use crate::error::RenderError;
use crate::inject::ContextKey;

use super::{Child, Fallback, PropValue, Props, VNode};

/// Property carrying an error boundary's fallback producer.
pub const FALLBACK_PROP: &str = "fallback";
/// Property carrying a provider's value.
pub const VALUE_PROP: &str = "value";
/// Property carrying children passed through the property map.
pub const CHILDREN_PROP: &str = "children";

/// What a component produced.
#[derive(Debug, Clone)]
pub enum Output {
    Node(VNode),
    Many(Vec<Child>),
    /// Rendered as an empty text item.
    Nothing,
}

impl From<VNode> for Output {
    fn from(node: VNode) -> Self {
        Output::Node(node)
    }
}

impl From<Option<VNode>> for Output {
    fn from(node: Option<VNode>) -> Self {
        node.map_or(Output::Nothing, Output::Node)
    }
}

impl From<Vec<VNode>> for Output {
    fn from(nodes: Vec<VNode>) -> Self {
        Output::Many(nodes.into_iter().map(Child::Node).collect())
    }
}

impl From<Vec<Child>> for Output {
    fn from(children: Vec<Child>) -> Self {
        Output::Many(children)
    }
}

impl From<()> for Output {
    fn from(_: ()) -> Self {
        Output::Nothing
    }
}

type RenderFn = Rc<dyn Fn(&Props) -> Result<Output, RenderError>>;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Kind {
    Plain,
    ErrorBoundary,
    Provider(ContextKey),
}

/// A renderable component.
#[derive(Clone)]
pub struct Component {
    name: Rc<str>,
    render: RenderFn,
    kind: Kind,
}

impl Component {
    /// Create a component from a render function.
    pub fn new<F, O>(name: &str, render: F) -> Self
    where
        F: Fn(&Props) -> Result<O, RenderError> + 'static,
        O: Into<Output>,
    {
        Self {
            name: name.into(),
            render: Rc::new(move |props| render(props).map(Into::into)),
            kind: Kind::Plain,
        }
    }

    /// The error-catching wrapper.
    ///
    /// Renders its children; if rendering them fails, renders the node its
    /// `fallback` property produces from the error instead.
    pub fn error_boundary() -> Self {
        Self {
            name: "ErrorBoundary".into(),
            render: Rc::new(passthrough),
            kind: Kind::ErrorBoundary,
        }
    }

    /// A provider binding `key` to its `value` property for its descendants.
    pub fn provider(key: ContextKey) -> Self {
        Self {
            name: "Provider".into(),
            render: Rc::new(passthrough),
            kind: Kind::Provider(key),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invoke the render function.
    pub fn call(&self, props: &Props) -> Result<Output, RenderError> {
        tracing::trace!(component = %self.name, "rendering component");
        (self.render)(props)
    }

    /// Whether this is the error-catching wrapper.
    pub fn is_error_boundary(&self) -> bool {
        self.kind == Kind::ErrorBoundary
    }

    /// The context key this component provides, if it is a provider.
    pub fn provided_key(&self) -> Option<ContextKey> {
        match self.kind {
            Kind::Provider(key) => Some(key),
            _ => None,
        }
    }

    /// The fallback producer of an error boundary, from its properties.
    pub fn fallback(&self, props: &Props) -> Option<Fallback> {
        if !self.is_error_boundary() {
            return None;
        }
        match props.get(FALLBACK_PROP) {
            Some(PropValue::Fallback(fallback)) => Some(fallback.clone()),
            _ => None,
        }
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component").field("name", &self.name).finish()
    }
}

fn passthrough(props: &Props) -> Result<Output, RenderError> {
    match props.get(CHILDREN_PROP) {
        Some(PropValue::Children(children)) => Ok(Output::Many(children.clone())),
        _ => Ok(Output::Nothing),
    }
}

/// Build an error boundary node around `children`.
pub fn error_boundary<F>(fallback: F, children: Vec<Child>) -> VNode
where
    F: Fn(&RenderError) -> VNode + 'static,
{
    VNode::component(Component::error_boundary())
        .prop(FALLBACK_PROP, PropValue::Fallback(Rc::new(fallback)))
        .children(children)
}
