//! Tree expansion.
//!
//! Expansion invokes components and flattens fragments so that every
//! element's children form a single list. Provider components bind their
//! value for the duration of their subtree's expansion; error boundaries
//! swap a failing subtree for their fallback.
//!
//! Nodes carrying a structural directive (branch, list or snapshot) are kept
//! as they are, components included: their content is only expanded when a
//! renderer decides to render it. An error boundary whose output holds such
//! content wraps it in a fragment carrying its fallback, so the renderers
//! can still substitute it.

use std::borrow::Cow;

use crate::directive;
use crate::error::RenderError;
use crate::inject;

use super::{Child, Component, NodeType, Output, PropValue, VNode, CHILDREN_PROP};

/// The result of expanding a node.
#[derive(Debug, Clone)]
pub enum Expanded {
    /// Exactly one node.
    Single(VNode),
    /// A flattened list of items, from a fragment or a multi-item component.
    Items(Vec<Child>),
}

impl Expanded {
    /// The items as a children list.
    pub fn items(&self) -> Cow<'_, [Child]> {
        match self {
            Expanded::Single(node) => Cow::Owned(vec![Child::Node(node.clone())]),
            Expanded::Items(items) => Cow::Borrowed(items),
        }
    }

    pub fn into_items(self) -> Vec<Child> {
        match self {
            Expanded::Single(node) => vec![Child::Node(node)],
            Expanded::Items(items) => items,
        }
    }
}

/// Expand a node: invoke components, flatten fragments.
pub fn expand(node: &VNode) -> Result<Expanded, RenderError> {
    match &node.kind {
        NodeType::Text(_) => Ok(Expanded::Single(node.clone())),
        NodeType::Tag(_) if directive::is_structural(node) => Ok(Expanded::Single(node.clone())),
        NodeType::Tag(_) => {
            let mut children = Vec::new();
            flatten(node.child_list(), &mut children)?;
            let mut expanded = node.without_props(&[CHILDREN_PROP]);
            expanded.children = Some(children);
            Ok(Expanded::Single(expanded))
        }
        NodeType::Fragment if directive::is_structural(node) => Ok(Expanded::Single(node.clone())),
        NodeType::Fragment => {
            let mut items = Vec::new();
            flatten(node.child_list(), &mut items)?;
            Ok(Expanded::Items(items))
        }
        NodeType::Component(_) if directive::is_structural(node) => Ok(Expanded::Single(node.clone())),
        NodeType::Component(component) => invoke(component, node),
    }
}

/// Expand a children list, splicing fragments and component output in
/// place.
pub fn flatten_children(children: &[Child]) -> Result<Vec<Child>, RenderError> {
    let mut out = Vec::with_capacity(children.len());
    flatten(children, &mut out)?;
    Ok(out)
}

/// Expand every child into `out`, splicing fragments in place.
fn flatten(children: &[Child], out: &mut Vec<Child>) -> Result<(), RenderError> {
    for child in children {
        match child {
            Child::Dynamic(_) => out.push(child.clone()),
            Child::Node(node) => match expand(node)? {
                Expanded::Single(node) => out.push(Child::Node(node)),
                Expanded::Items(items) => out.extend(items),
            },
        }
    }
    Ok(())
}

fn invoke(component: &Component, node: &VNode) -> Result<Expanded, RenderError> {
    let props = node.component_props();
    let _binding = inject::binding_for(component, &props).map(inject::provide);

    let result = component.call(&props).and_then(expand_output);
    match (result, component.fallback(&props)) {
        // Content rendered later still falls back to this boundary.
        (Ok(expanded), Some(fallback)) if directive::has_deferred(&expanded.items()) => Ok(Expanded::Single(
            VNode::fragment(expanded.into_items()).prop(directive::CATCH, PropValue::Fallback(fallback)),
        )),
        (Ok(expanded), _) => Ok(expanded),
        (Err(err), Some(fallback)) => {
            tracing::warn!(component = component.name(), error = %err, "rendering fallback");
            expand(&fallback(&err))
        }
        (Err(err), None) => Err(err),
    }
}

/// Expand whatever a component returned.
pub fn expand_output(output: Output) -> Result<Expanded, RenderError> {
    match output {
        Output::Node(node) => expand(&node),
        Output::Many(children) => {
            let mut items = Vec::new();
            flatten(&children, &mut items)?;
            Ok(Expanded::Items(items))
        }
        Output::Nothing => Ok(Expanded::Single(VNode::text(""))),
    }
}
